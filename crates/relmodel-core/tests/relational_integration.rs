//! Integration tests for the relational overlay, built through conventions.

use pretty_assertions::assert_eq;
use relmodel_core::annotations::{AnnotationResolver, AnnotationValue, Annotations};
use relmodel_core::metadata::{Declaration, MemberInfo, ModelSnapshot, RecordShape};
use relmodel_core::{
    ConfigurationSource, Error, Model, RelationalEntityType, RelationalForeignKey, RelationalIndex,
    RelationalKey, RelationalModel, ScalarType, Sequence, SequenceType, ValueType,
};

const EXPLICIT: ConfigurationSource = ConfigurationSource::Explicit;

fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relmodel_core=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

fn int() -> ValueType {
    ValueType::required(ScalarType::Int32)
}

fn shop_model() -> Model {
    let customer = RecordShape::new("Shop.Customer")
        .with_member(MemberInfo::scalar("Id", int()))
        .with_member(MemberInfo::scalar("Name", ValueType::optional(ScalarType::String)))
        .with_member(MemberInfo::collection("Orders", "Shop.Order"));
    let order = RecordShape::new("Shop.Order")
        .with_member(MemberInfo::scalar("Id", int()))
        .with_member(MemberInfo::scalar("CustomerId", ValueType::optional(ScalarType::Int32)))
        .with_member(MemberInfo::scalar("Total", ValueType::required(ScalarType::Decimal)))
        .with_member(
            MemberInfo::scalar("Notes", ValueType::optional(ScalarType::String))
                .with_declaration(Declaration::NotMapped),
        )
        .with_member(MemberInfo::reference("Customer", "Shop.Customer"));

    let mut model = Model::new();
    model.add_entity_type_with_shape(customer, EXPLICIT).unwrap();
    model.add_entity_type_with_shape(order, EXPLICIT).unwrap();
    model.finalize().unwrap();
    model
}

#[test]
fn test_conventions_build_shop_model() {
    init_test_logging();
    let model = shop_model();
    let customer = model.entity_type_by_name("Shop.Customer").unwrap();
    let order = model.entity_type_by_name("Shop.Order").unwrap();

    let customer_id = model.find_property(order, "CustomerId").unwrap().unwrap();
    assert!(!model.property(customer_id).unwrap().is_shadow());
    assert!(model.find_property(order, "Notes").unwrap().is_none());

    let fks = model.foreign_keys(order).unwrap();
    assert_eq!(fks.len(), 1);
    let fk = fks[0];
    assert_eq!(model.foreign_key(fk).unwrap().properties(), &[customer_id]);
    assert_eq!(model.foreign_key(fk).unwrap().principal_type(), customer);
    assert!(!model.foreign_key_is_unique(fk).unwrap());
    assert!(!model.foreign_key_is_required(fk).unwrap());

    let orders = model.find_navigation(customer, "Orders").unwrap().unwrap();
    assert!(model.navigation_is_collection(orders).unwrap());
    let inverse = model.inverse_navigation(orders).unwrap().unwrap();
    assert_eq!(model.navigation(inverse).unwrap().name(), "Customer");

    assert_eq!(
        RelationalForeignKey::default().name(&model, fk).unwrap(),
        "FK_Order_Customer_CustomerId"
    );
    let pk = model.primary_key(customer).unwrap().unwrap();
    assert_eq!(RelationalKey::default().name(&model, pk).unwrap(), "PK_Customer");
    let indexes = model.indexes(order).unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(
        RelationalIndex::default().name(&model, indexes[0]).unwrap(),
        "IX_Order_CustomerId"
    );
    model.validate().unwrap();
}

#[test]
fn test_declared_inverse_and_foreign_key() {
    init_test_logging();
    let customer = RecordShape::new("Customer")
        .with_member(MemberInfo::scalar("Id", int()))
        .with_member(
            MemberInfo::collection("Purchases", "Order")
                .with_declaration(Declaration::InverseProperty("Buyer".into())),
        );
    let order = RecordShape::new("Order")
        .with_member(MemberInfo::scalar("Id", int()))
        .with_member(MemberInfo::scalar("BuyerRef", ValueType::optional(ScalarType::Int32)))
        .with_member(
            MemberInfo::reference("Buyer", "Customer")
                .with_declaration(Declaration::ForeignKey(vec!["BuyerRef".into()])),
        );

    let mut model = Model::new();
    let customer = model.add_entity_type_with_shape(customer, EXPLICIT).unwrap();
    let order = model.add_entity_type_with_shape(order, EXPLICIT).unwrap();
    model.finalize().unwrap();

    let fks = model.foreign_keys(order).unwrap();
    assert_eq!(fks.len(), 1);
    let foreign_key = model.foreign_key(fks[0]).unwrap();
    assert_eq!(foreign_key.principal_type(), customer);
    assert_eq!(
        foreign_key.configuration_source(),
        ConfigurationSource::DataAnnotation
    );
    let buyer_ref = model.find_property(order, "BuyerRef").unwrap().unwrap();
    assert_eq!(foreign_key.properties(), &[buyer_ref]);
    let purchases = model.find_navigation(customer, "Purchases").unwrap().unwrap();
    assert_eq!(model.navigation(purchases).unwrap().foreign_key(), fks[0]);
    model.validate().unwrap();
}

#[test]
fn test_snapshot_json_round_trip() {
    init_test_logging();
    let mut model = shop_model();
    let customer = model.entity_type_by_name("Shop.Customer").unwrap();
    RelationalEntityType::default()
        .set_table_name(&mut model, customer, Some("Customers"))
        .unwrap();
    RelationalModel::default()
        .get_or_add_sequence(&mut model, "OrderNumbers", Some("dbo"))
        .unwrap();

    let snapshot = model.snapshot().unwrap();
    let json = snapshot.to_json().unwrap();
    let parsed: ModelSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);
    assert_eq!(parsed.entity_types.len(), 2);
}

#[test]
fn test_provider_annotation_wins() {
    let mut annotations = Annotations::new();
    let generic = AnnotationResolver::relational();
    let provider = AnnotationResolver::for_provider("SqlServer:");

    generic.set(&mut annotations, "TableName", Some("generic_orders".into()));
    provider.set(&mut annotations, "TableName", Some("Orders".into()));

    assert_eq!(provider.get_str(&annotations, "TableName"), Some("Orders"));
    assert_eq!(generic.get_str(&annotations, "TableName"), Some("generic_orders"));
    assert_eq!(
        annotations.get("Relational:TableName"),
        Some(&AnnotationValue::String("generic_orders".into()))
    );

    provider.set(&mut annotations, "TableName", None);
    assert_eq!(provider.get_str(&annotations, "TableName"), Some("generic_orders"));
}

#[test]
fn test_provider_table_name_on_model() {
    init_test_logging();
    let mut model = shop_model();
    let order = model.entity_type_by_name("Shop.Order").unwrap();
    let fk = model.foreign_keys(order).unwrap()[0];
    let provider = RelationalEntityType::new(AnnotationResolver::for_provider("SqlServer:"));
    provider.set_table_name(&mut model, order, Some("SalesOrders")).unwrap();

    let provider_fk = RelationalForeignKey::new(AnnotationResolver::for_provider("SqlServer:"));
    assert_eq!(
        provider_fk.name(&model, fk).unwrap(),
        "FK_SalesOrders_Customer_CustomerId"
    );
    assert_eq!(
        RelationalForeignKey::default().name(&model, fk).unwrap(),
        "FK_Order_Customer_CustomerId"
    );
}

#[test]
fn test_get_or_add_sequence_is_idempotent() {
    init_test_logging();
    let mut model = Model::new();
    let relational = RelationalModel::default();

    let first = relational
        .get_or_add_sequence(&mut model, "OrderNumbers", Some("dbo"))
        .unwrap();
    let second = relational
        .get_or_add_sequence(&mut model, "OrderNumbers", Some("dbo"))
        .unwrap();
    assert_eq!(first.serialize(), second.serialize());
    assert_eq!(
        first.serialize(),
        "'OrderNumbers', 'dbo', '1', '1', '', '', 'Int64', 'False'"
    );
}

#[test]
fn test_sequence_round_trip() {
    let sequence = Sequence::new("Invoice'Numbers", Some("billing"))
        .unwrap()
        .with_start_value(-5)
        .with_increment_by(3)
        .with_min_value(Some(-100))
        .with_max_value(Some(30_000))
        .with_sequence_type(SequenceType::Int16)
        .with_cyclic(true);

    let text = sequence.serialize();
    assert!(text.starts_with("'Invoice''Numbers', 'billing'"));
    let parsed = Sequence::deserialize(&text).unwrap();
    assert_eq!(parsed, sequence);
    assert_eq!(parsed.name(), "Invoice'Numbers");
    assert_eq!(parsed.schema(), Some("billing"));
    assert_eq!(parsed.min_value(), Some(-100));
    assert_eq!(parsed.max_value(), Some(30_000));
    assert!(parsed.is_cyclic());
}

#[test]
fn test_sequence_decoding_errors() {
    for text in [
        "'Ids', '', '1', '1', '', '', 'Int64'",
        "'Ids', '', 'one', '1', '', '', 'Int64', 'False'",
        "'Ids', '', '1', '1', '', '', 'Int64', 'Maybe'",
        "'Ids, '', '1', '1', '', '', 'Int64', 'False'",
        "'', '', '1', '1', '', '', 'Int64', 'False'",
    ] {
        let err = Sequence::deserialize(text).unwrap_err();
        assert!(matches!(err, Error::BadSequenceString { .. }), "{text}: {err}");
    }

    // Unknown type names decode as the narrowest type.
    let parsed = Sequence::deserialize("'Ids', '', '1', '1', '', '', 'Int128', 'true'").unwrap();
    assert_eq!(parsed.sequence_type(), SequenceType::Byte);
    assert!(parsed.is_cyclic());

    let err = Sequence::new("Ids", None)
        .unwrap()
        .with_value_type(ValueType::required(ScalarType::Decimal))
        .unwrap_err();
    assert!(matches!(err, Error::BadSequenceType { .. }));
}

#[test]
fn test_sequence_builder_rejects_bad_type() {
    let mut model = Model::new();
    let relational = RelationalModel::default();
    let builder = relational
        .sequence_builder(&mut model, "Ids", None)
        .unwrap()
        .increments_by(5);
    let err = builder
        .of_type(ValueType::required(ScalarType::String))
        .err()
        .unwrap();
    assert!(matches!(err, Error::BadSequenceType { .. }));

    let stored = relational.find_sequence(&model, "Ids", None).unwrap().unwrap();
    assert_eq!(stored.increment_by(), 5);
    assert_eq!(stored.sequence_type(), SequenceType::Int64);
}
