use std::sync::Arc;

use sayml::schema::FieldKind;
use sayml::{EntityDescriptor, MemoryBackend, Node, SchemaIndex, SchemaOptions, Session};

/// Customers buy tickets; tickets hold lines; lines reference products.
pub fn ticket_descriptors() -> Vec<EntityDescriptor> {
    vec![
        EntityDescriptor::new("Product")
            .surrogate("id")
            .field("name")
            .typed_field("price", FieldKind::Float)
            .unique(&["name"]),
        EntityDescriptor::new("Customer")
            .surrogate("id")
            .field("name")
            .unique(&["name"])
            .many_via("purchases", "Ticket", "customer_id"),
        EntityDescriptor::new("Ticket")
            .surrogate("id")
            .field("customer_id")
            .one_via("customer", "Customer", "customer_id")
            .many_via("lines", "ticket_line", "ticket_id"),
        EntityDescriptor::new("TicketLine")
            .surrogate("id")
            .field("ticket_id")
            .field("product_id")
            .typed_field("quantity", FieldKind::Integer)
            .unique(&["ticket_id", "product_id"])
            .one_via("ticket", "Ticket", "ticket_id")
            .one_via("product", "Product", "product_id"),
    ]
}

pub fn ticket_schema() -> Arc<SchemaIndex> {
    Arc::new(SchemaIndex::new(ticket_descriptors(), SchemaOptions::default()).unwrap())
}

pub fn memory_session() -> Session<MemoryBackend> {
    Session::new(MemoryBackend::new(), ticket_schema())
}

pub fn yaml(text: &str) -> Node {
    Node::from_yaml_str(text).unwrap()
}

pub const SCHEMA_YAML: &str = r#"
entities:
  - name: Product
    fields:
      - { name: id, surrogate: true }
      - { name: name, kind: text }
    unique: [[name]]
  - name: Customer
    fields:
      - { name: id, surrogate: true }
      - { name: name, kind: text }
    unique: [[name]]
    relationships:
      - { name: purchases, target: Ticket, many: true, foreign_key: customer_id }
  - name: Ticket
    fields:
      - { name: id, surrogate: true }
      - { name: customer_id, kind: integer }
    relationships:
      - { name: customer, target: Customer, foreign_key: customer_id }
      - { name: lines, target: ticket_line, many: true, foreign_key: ticket_id }
  - name: TicketLine
    fields:
      - { name: id, surrogate: true }
      - { name: ticket_id, kind: integer }
      - { name: product_id, kind: integer }
      - { name: quantity, kind: integer }
    unique: [[ticket_id, product_id]]
    relationships:
      - { name: ticket, target: Ticket, foreign_key: ticket_id }
      - { name: product, target: Product, foreign_key: product_id }
"#;

pub const CUSTOMER_DOCUMENT: &str = r#"
Customer:
  name: Mr Customer
  purchases:
    - lines:
        - product: { name: Widget }
          quantity: 2
        - product: { name: Gadget }
    - lines:
        - product: { name: Widget }
          quantity: 1
"#;
