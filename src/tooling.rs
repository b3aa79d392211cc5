//! Tooling & Integration Layer
//!
//! Command-line front-end over the materialization engine: schema checks,
//! document imports into an on-disk store, and record listings.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
