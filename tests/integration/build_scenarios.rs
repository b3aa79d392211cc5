use sayml::error::{BuildError, ErrorKind, MalformedReason, StorageError};
use sayml::store::WriteBatch;
use sayml::types::RecordId;
use sayml::{
    build, Backend, BuildOptions, ConflictPolicy, Materialized, Record, Scalar, Session,
    StorageSession, TreeBuilder,
};

use crate::support::{memory_session, ticket_schema, yaml, CUSTOMER_DOCUMENT};

fn text(value: &str) -> Scalar {
    Scalar::Text(value.to_string())
}

#[test]
fn customer_document_builds_a_wired_graph() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let customer = build(&mut session, &schema, &yaml(CUSTOMER_DOCUMENT)).unwrap();

    let record = session.get(customer).unwrap().clone();
    assert_eq!(record.entity, "Customer");
    assert_eq!(record.get("name"), Some(&text("Mr Customer")));

    let tickets = record.many("purchases").to_vec();
    assert_eq!(tickets.len(), 2);
    for ticket in &tickets {
        assert_eq!(session.get(*ticket).unwrap().one("customer"), Some(customer));
    }

    let first_lines = session.get(tickets[0]).unwrap().many("lines").to_vec();
    let second_lines = session.get(tickets[1]).unwrap().many("lines").to_vec();
    assert_eq!(first_lines.len(), 2);
    assert_eq!(second_lines.len(), 1);

    let widget_a = session.get(first_lines[0]).unwrap().one("product").unwrap();
    let gadget = session.get(first_lines[1]).unwrap().one("product").unwrap();
    let widget_b = session.get(second_lines[0]).unwrap().one("product").unwrap();
    assert_eq!(widget_a, widget_b);
    assert_ne!(widget_a, gadget);
    assert_eq!(session.get(first_lines[0]).unwrap().one("ticket"), Some(tickets[0]));
    assert_eq!(session.get(first_lines[0]).unwrap().get("quantity"), Some(&Scalar::Int(2)));
    assert_eq!(session.get(first_lines[1]).unwrap().get("quantity"), None);

    // customer, two tickets, three lines, two products
    assert_eq!(session.pending().len(), 8);
    session.commit().unwrap();
    assert_eq!(session.scan("Product").unwrap().len(), 2);
    assert_eq!(session.scan("Customer").unwrap().len(), 1);
}

#[test]
fn purchases_attach_to_the_customer() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let customer = build(
        &mut session,
        &schema,
        &yaml("Customer:\n  name: Alice\n  purchases:\n    - id: 1\n    - id: 2\n"),
    )
    .unwrap();

    let record = session.get(customer).unwrap();
    assert_eq!(record.get("name"), Some(&text("Alice")));
    // surrogate ids in the document are ignored
    let tickets = record.many("purchases");
    assert_eq!(tickets.len(), 2);
    assert_ne!(tickets[0], tickets[1]);
}

#[test]
fn build_does_not_commit() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    build(&mut session, &schema, &yaml(CUSTOMER_DOCUMENT)).unwrap();
    assert!(session.backend().is_empty());
    assert_eq!(session.backend().persisted(), 0);
    assert!(session.autoflush());
}

#[test]
fn repeated_products_in_one_ticket_share_a_record() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let ticket = build(
        &mut session,
        &schema,
        &yaml(
            r#"
Ticket:
  customer: { name: Ms Buyer }
  lines:
    - product: { name: Widget }
    - product: { name: Widget }
"#,
        ),
    )
    .unwrap();

    let lines = session.get(ticket).unwrap().many("lines").to_vec();
    assert_eq!(lines.len(), 2);
    let first = session.get(lines[0]).unwrap().one("product");
    let second = session.get(lines[1]).unwrap().one("product");
    assert_eq!(first, second);

    // (ticket_id, product_id) is enforced by storage, not by resolution
    let err = session.commit().unwrap_err();
    assert!(
        matches!(err, StorageError::UniqueViolation { ref entity, .. } if entity == "TicketLine"),
        "{err}"
    );
}

#[test]
fn committed_records_are_reused_across_builds() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let builder = TreeBuilder::new(&schema, BuildOptions::default());

    let product = build(&mut session, &schema, &yaml("Product:\n  name: Widget\n")).unwrap();
    session.commit().unwrap();

    let report = builder
        .build_with_report(
            &mut session,
            &yaml("Ticket:\n  customer: { name: Ann }\n  lines:\n    - product: { name: Widget }\n"),
        )
        .unwrap();
    assert_eq!(report.reused_committed, 1);
    assert_eq!(report.created, 3);

    let ticket = match report.root {
        Materialized::One(id) => id,
        other => panic!("unexpected root {:?}", other),
    };
    let line = session.get(ticket).unwrap().many("lines")[0];
    assert_eq!(session.get(line).unwrap().one("product"), Some(product));
}

#[test]
fn importing_the_same_document_twice_reuses_keyed_records() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let first = build(&mut session, &schema, &yaml(CUSTOMER_DOCUMENT)).unwrap();
    session.commit().unwrap();
    let second = build(&mut session, &schema, &yaml(CUSTOMER_DOCUMENT)).unwrap();
    session.commit().unwrap();

    assert_eq!(first, second);
    assert_eq!(session.scan("Customer").unwrap().len(), 1);
    assert_eq!(session.scan("Product").unwrap().len(), 2);
    // tickets carry no key of their own
    assert_eq!(session.scan("Ticket").unwrap().len(), 4);
    assert_eq!(session.get(first).unwrap().many("purchases").len(), 4);
}

#[test]
fn collection_order_follows_the_document() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let report = TreeBuilder::new(&schema, BuildOptions::default())
        .build_with_report(
            &mut session,
            &yaml("Product:\n  - name: C\n  - name: A\n  - name: C\n  - name: B\n"),
        )
        .unwrap();

    let ids = report.root.ids();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids[0], ids[2]);
    let names: Vec<Scalar> = ids
        .iter()
        .map(|id| session.get(*id).unwrap().get("name").cloned().unwrap())
        .collect();
    assert_eq!(names, vec![text("C"), text("A"), text("C"), text("B")]);
    assert_eq!(report.created, 3);
    assert_eq!(report.reused_in_flight, 1);
}

#[test]
fn build_rejects_a_sequence_root() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let err = build(
        &mut session,
        &schema,
        &yaml("Product:\n  - name: A\n  - name: B\n"),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    assert!(matches!(
        err,
        BuildError::Malformed {
            reason: MalformedReason::InvalidRoot,
            ref field,
            ..
        } if field.is_none()
    ));
    assert!(!err.to_string().contains("single-valued relationship"), "{}", err);
    assert!(session.pending().is_empty());
    assert!(!session.has_pending_changes());
}

#[test]
fn unknown_root_fails_before_staging() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let err = build(&mut session, &schema, &yaml("Invoice:\n  number: 7\n")).unwrap_err();
    assert!(matches!(err, BuildError::UnknownEntity { ref name, .. } if name == "Invoice"));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(session.pending().is_empty());
    assert!(!session.has_pending_changes());
}

#[test]
fn root_must_be_a_single_key_mapping() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    for document in ["- Product: {}\n", "Product: {}\nCustomer: {}\n", "42\n"] {
        let err = build(&mut session, &schema, &yaml(document)).unwrap_err();
        assert!(
            matches!(
                err,
                BuildError::Malformed {
                    reason: MalformedReason::InvalidRoot,
                    ..
                }
            ),
            "{document}: {err}"
        );
    }
}

#[test]
fn multiplicity_mismatches_are_malformed() {
    let mut session = memory_session();
    let schema = session.schema().clone();

    let err = build(
        &mut session,
        &schema,
        &yaml("Ticket:\n  customer:\n    - name: Ann\n"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Malformed {
            reason: MalformedReason::SequenceForSingle,
            ref field,
            ..
        } if field.as_deref() == Some("customer")
    ));

    let err = build(
        &mut session,
        &schema,
        &yaml("Customer:\n  name: Ann\n  purchases:\n    lines: []\n"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Malformed {
            reason: MalformedReason::ExpectedSequence,
            ..
        }
    ));
}

#[test]
fn null_children_are_malformed() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let err = build(&mut session, &schema, &yaml("Ticket:\n  customer: ~\n")).unwrap_err();
    match err {
        BuildError::Malformed {
            entity,
            field,
            reason,
        } => {
            assert_eq!(entity, "Customer");
            assert_eq!(field.as_deref(), Some("customer"));
            assert_eq!(reason, MalformedReason::NullNode);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn null_scalars_are_absent_and_unknown_keys_ignored() {
    let mut session = memory_session();
    let schema = session.schema().clone();
    let id = build(
        &mut session,
        &schema,
        &yaml("Product:\n  name: Widget\n  price: ~\n  colour: red\n"),
    )
    .unwrap();
    let record = session.get(id).unwrap();
    assert_eq!(record.get("price"), None);
    assert_eq!(record.get("colour"), None);
}

#[test]
fn conflict_policy_applies_to_in_flight_matches() {
    let document = yaml(
        "Ticket:\n  lines:\n    - product: { name: Widget, price: 2 }\n    - product: { name: Widget, price: 3.5 }\n",
    );
    let schema = ticket_schema();

    let mut session = Session::new(sayml::MemoryBackend::new(), schema.clone());
    let ticket = TreeBuilder::new(&schema, BuildOptions::default())
        .build(&mut session, &document)
        .unwrap();
    let line = session.get(ticket).unwrap().many("lines")[0];
    let product = session.get(line).unwrap().one("product").unwrap();
    // integers coerce to the declared float kind
    assert_eq!(session.get(product).unwrap().get("price"), Some(&Scalar::Float(2.0)));

    let mut session = Session::new(sayml::MemoryBackend::new(), schema.clone());
    let options = BuildOptions {
        conflict_policy: ConflictPolicy::LastWins,
    };
    let ticket = TreeBuilder::new(&schema, options).build(&mut session, &document).unwrap();
    let line = session.get(ticket).unwrap().many("lines")[0];
    let product = session.get(line).unwrap().one("product").unwrap();
    assert_eq!(session.get(product).unwrap().get("price"), Some(&Scalar::Float(3.5)));

    let mut session = Session::new(sayml::MemoryBackend::new(), schema.clone());
    let options = BuildOptions {
        conflict_policy: ConflictPolicy::Reject,
    };
    let err = TreeBuilder::new(&schema, options)
        .build(&mut session, &document)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

/// Backend whose unique index is unreachable.
struct UnavailableBackend;

impl Backend for UnavailableBackend {
    fn load(&self, _id: RecordId) -> Result<Option<Record>, StorageError> {
        Ok(None)
    }

    fn lookup_unique(&self, _digest: &[u8; 32]) -> Result<Option<RecordId>, StorageError> {
        Err(StorageError::InvalidState("unique index unavailable".to_string()))
    }

    fn next_id(&mut self) -> Result<RecordId, StorageError> {
        Ok(1)
    }

    fn apply(&mut self, _batch: WriteBatch) -> Result<(), StorageError> {
        Ok(())
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn scan(&self, _entity: &str) -> Result<Vec<Record>, StorageError> {
        Ok(Vec::new())
    }
}

#[test]
fn storage_failures_propagate_unchanged() {
    let schema = ticket_schema();
    let mut session = Session::new(UnavailableBackend, schema.clone());
    let err = build(&mut session, &schema, &yaml("Product:\n  name: Widget\n")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(err.to_string().contains("unique index unavailable"));
    assert!(session.autoflush());
}
