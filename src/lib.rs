//! Sayml: Materialize Nested Documents into Record Graphs
//!
//! Walks a nested YAML/JSON document against a declared entity schema and
//! turns every mapping into a record, wiring relationships between them.
//! Occurrences that agree on a uniqueness constraint become one record,
//! whether the match is already in storage or appeared earlier in the same
//! document.

pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod logging;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod tooling;
pub mod types;

pub use builder::{build, BuildOptions, BuildReport, Materialized, TreeBuilder};
pub use document::{Node, Scalar};
pub use error::{ApiError, BuildError, ErrorKind, MalformedReason, SchemaError, StorageError};
pub use identity::{CanonicalKey, IdentityCache};
pub use resolver::{ConflictPolicy, Resolution, Resolver};
pub use schema::{EntityDescriptor, EntityType, SchemaIndex, SchemaOptions};
pub use store::{Backend, MemoryBackend, Record, Session, SledBackend, StorageSession};
