use sayml::{build, BuildOptions, Session, SledBackend, StorageSession, TreeBuilder};
use tempfile::TempDir;

use crate::support::{ticket_schema, yaml, CUSTOMER_DOCUMENT};

#[test]
fn committed_records_survive_reopening_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");
    let schema = ticket_schema();

    let customer = {
        let backend = SledBackend::open(&store).unwrap();
        let mut session = Session::new(backend, schema.clone());
        let customer = build(&mut session, &schema, &yaml(CUSTOMER_DOCUMENT)).unwrap();
        session.commit().unwrap();
        customer
    };

    let backend = SledBackend::open(&store).unwrap();
    assert_eq!(backend.len(), 8);
    let mut session = Session::new(backend, schema.clone());
    let report = TreeBuilder::new(&schema, BuildOptions::default())
        .build_with_report(
            &mut session,
            &yaml("Customer:\n  name: Mr Customer\n  purchases:\n    - lines:\n        - product: { name: Gadget }\n"),
        )
        .unwrap();
    assert_eq!(report.root.ids(), vec![customer]);
    // customer and Gadget come from disk; ticket and line are new
    assert_eq!(report.reused_committed, 2);
    assert_eq!(report.created, 2);
    session.commit().unwrap();

    let stored = session.record(customer).unwrap();
    assert_eq!(stored.many("purchases").len(), 3);
    assert_eq!(session.scan("Ticket").unwrap().len(), 3);
}

#[test]
fn ids_stay_unique_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("store");
    let schema = ticket_schema();

    let first = {
        let mut session = Session::new(SledBackend::open(&store).unwrap(), schema.clone());
        let id = build(&mut session, &schema, &yaml("Product:\n  name: Widget\n")).unwrap();
        session.commit().unwrap();
        id
    };
    let mut session = Session::new(SledBackend::open(&store).unwrap(), schema.clone());
    let second = build(&mut session, &schema, &yaml("Product:\n  name: Gadget\n")).unwrap();
    session.commit().unwrap();

    assert_ne!(first, second);
    assert_eq!(session.scan("Product").unwrap().len(), 2);
}

#[test]
fn rollback_leaves_the_store_untouched() {
    let schema = ticket_schema();
    let mut session = Session::new(SledBackend::temporary().unwrap(), schema.clone());
    build(&mut session, &schema, &yaml(CUSTOMER_DOCUMENT)).unwrap();
    session.rollback();
    session.commit().unwrap();
    assert!(session.backend().is_empty());
}
