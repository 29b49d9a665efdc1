//! Integration tests for hierarchy reconfiguration and relationships.

use pretty_assertions::assert_eq;
use relmodel_core::{
    ConfigurationSource, EntityTypeId, Error, Model, ModelConfig, RelationalEntityType,
    RelationshipConfig, ScalarType, ValueType,
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

fn bare_model() -> Model {
    Model::with_config(ModelConfig::without_conventions())
}

fn keyed(model: &mut Model, name: &str) -> EntityTypeId {
    let id = model.add_entity_type(name, EXPLICIT).unwrap();
    let key = model.add_property(id, "Id", int(), EXPLICIT).unwrap();
    model.set_primary_key(id, &[key], EXPLICIT).unwrap();
    id
}

fn primary_keys_in_hierarchy(model: &Model, root: EntityTypeId) -> usize {
    let mut count = 0;
    for member in model.derived_types_inclusive(root).unwrap() {
        for &key in model.declared_keys(member).unwrap() {
            if model.is_primary_key(key).unwrap() {
                count += 1;
            }
        }
    }
    count
}

#[test]
fn test_attach_then_detach_restores_declared_members() {
    init_test_logging();
    let mut model = Model::new();
    let customer = keyed(&mut model, "Customer");
    let special = model.add_entity_type("SpecialCustomer", EXPLICIT).unwrap();
    model.add_property(special, "Id", int(), EXPLICIT).unwrap();
    let rating = model
        .add_property(special, "Rating", ValueType::optional(ScalarType::Int32), EXPLICIT)
        .unwrap();
    model.add_index(special, &[rating], EXPLICIT).unwrap();
    let before = model.snapshot_entity_type(special).unwrap();
    assert_eq!(before.keys.len(), 1);
    assert!(before.keys[0].is_primary);

    model.set_base_type(special, Some(customer), EXPLICIT).unwrap();
    model.validate().unwrap();
    assert_eq!(model.root_of(special).unwrap(), customer);

    model.set_base_type(special, None, EXPLICIT).unwrap();
    model.validate().unwrap();
    assert_eq!(model.snapshot_entity_type(special).unwrap(), before);
}

#[test]
fn test_single_primary_key_per_hierarchy() {
    init_test_logging();
    let mut model = Model::new();
    let customer = keyed(&mut model, "Customer");
    let special = model.add_entity_type("SpecialCustomer", EXPLICIT).unwrap();
    let special_id = model.add_property(special, "SpecialCustomerId", int(), EXPLICIT).unwrap();
    assert!(model.primary_key(special).unwrap().is_some());

    model.set_base_type(special, Some(customer), EXPLICIT).unwrap();
    assert_eq!(primary_keys_in_hierarchy(&model, customer), 1);
    assert_eq!(model.primary_key(special).unwrap(), model.primary_key(customer).unwrap());

    let err = model
        .set_primary_key(special, &[special_id], EXPLICIT)
        .unwrap_err();
    assert!(matches!(err, Error::DerivedTypeCannotHaveKeys { .. }));
    assert_eq!(primary_keys_in_hierarchy(&model, customer), 1);
}

#[test]
fn test_foreign_key_arity_matches_principal_key() {
    init_test_logging();
    let mut model = bare_model();
    let line = model.add_entity_type("OrderLine", EXPLICIT).unwrap();
    let order_no = model.add_property(line, "OrderNo", int(), EXPLICIT).unwrap();
    let line_no = model.add_property(line, "LineNo", int(), EXPLICIT).unwrap();
    model
        .set_primary_key(line, &[order_no, line_no], EXPLICIT)
        .unwrap();

    let shipment = keyed(&mut model, "Shipment");
    let order_ref = model.add_property(shipment, "OrderNo", int(), EXPLICIT).unwrap();
    let err = model
        .add_foreign_key(shipment, &[order_ref], line, None, EXPLICIT)
        .unwrap_err();
    assert!(matches!(err, Error::ForeignKeyTypeMismatch { .. }));

    let text = model
        .add_property(shipment, "LineNo", ValueType::required(ScalarType::String), EXPLICIT)
        .unwrap();
    let err = model
        .add_foreign_key(shipment, &[order_ref, text], line, None, EXPLICIT)
        .unwrap_err();
    assert!(matches!(err, Error::ForeignKeyTypeMismatch { .. }));

    let fk = model
        .relationship(
            RelationshipConfig::new(shipment, line).with_navigation_to_principal("Line"),
            EXPLICIT,
        )
        .unwrap();
    let foreign_key = model.foreign_key(fk).unwrap();
    let principal_key = model.key(foreign_key.principal_key()).unwrap();
    assert_eq!(foreign_key.properties().len(), principal_key.properties().len());
    for (d, p) in foreign_key.properties().iter().zip(principal_key.properties()) {
        let dependent = model.property(*d).unwrap().value_type();
        let principal = model.property(*p).unwrap().value_type();
        assert!(dependent.is_compatible_with(&principal));
    }
    let names: Vec<&str> = foreign_key
        .properties()
        .iter()
        .map(|p| model.property(*p).unwrap().name())
        .collect();
    assert_eq!(names, vec!["LineOrderNo", "LineLineNo"]);
    model.validate().unwrap();
}

#[test]
fn test_discriminator_on_derived_order_is_rejected() {
    init_test_logging();
    let mut model = Model::new();
    let customer = keyed(&mut model, "Customer");
    let document = keyed(&mut model, "Document");
    let order = model.add_entity_type("Order", EXPLICIT).unwrap();
    model.set_base_type(order, Some(document), EXPLICIT).unwrap();
    let customer_id = model
        .add_property(order, "CustomerId", ValueType::optional(ScalarType::Int32), EXPLICIT)
        .unwrap();
    model
        .add_foreign_key(order, &[customer_id], customer, None, EXPLICIT)
        .unwrap();
    let before = model.snapshot().unwrap();

    let err = RelationalEntityType::default()
        .set_discriminator_property(&mut model, order, Some(customer_id), EXPLICIT)
        .unwrap_err();
    assert!(matches!(err, Error::DiscriminatorPropertyMustBeOnRoot { .. }));
    assert_eq!(model.snapshot().unwrap(), before);
}

/// Customer <- SpecialCustomer and Order <- SpecialOrder, with
/// Order -> Customer configured on the base types.
fn order_hierarchies(
    model: &mut Model) -> (EntityTypeId,
    EntityTypeId,
    EntityTypeId,
    EntityTypeId,
) {
    let customer = keyed(model, "Customer");
    let order = keyed(model, "Order");
    model
        .relationship(
            RelationshipConfig::new(order, customer)
                .with_navigation_to_principal("Customer")
                .with_navigation_to_dependents("Orders"),
            EXPLICIT,
        )
        .unwrap();
    let special_customer = model.add_entity_type("SpecialCustomer", EXPLICIT).unwrap();
    model
        .set_base_type(special_customer, Some(customer), EXPLICIT)
        .unwrap();
    let special_order = model.add_entity_type("SpecialOrder", EXPLICIT).unwrap();
    model.set_base_type(special_order, Some(order), EXPLICIT).unwrap();
    (customer, order, special_customer, special_order)
}

#[test]
fn test_detach_keeps_only_configured_relationship() {
    init_test_logging();
    let mut model = bare_model();
    let (customer, order, special_customer, special_order) = order_hierarchies(&mut model);
    let special_fk = model
        .relationship(
            RelationshipConfig::new(special_order, special_customer)
                .with_navigation_to_principal("SpecialCustomer")
                .with_navigation_to_dependents("SpecialOrders"),
            EXPLICIT,
        )
        .unwrap();
    assert_eq!(model.foreign_keys(special_order).unwrap().len(), 2);
    let customer_before = model.snapshot_entity_type(customer).unwrap();
    let order_before = model.snapshot_entity_type(order).unwrap();

    model.set_base_type(special_order, None, EXPLICIT).unwrap();

    assert_eq!(model.foreign_keys(special_order).unwrap(), vec![special_fk]);
    assert!(model.find_navigation(special_order, "Customer").unwrap().is_none());
    assert!(model.find_property(special_order, "CustomerId").unwrap().is_none());
    assert!(model.find_navigation(special_order, "SpecialCustomer").unwrap().is_some());
    assert_eq!(model.snapshot_entity_type(customer).unwrap(), customer_before);
    assert_eq!(model.snapshot_entity_type(order).unwrap(), order_before);
    model.validate().unwrap();
}

#[test]
fn test_detach_replays_relationship_satisfied_by_base() {
    init_test_logging();
    let mut model = bare_model();
    let (customer, order, _, special_order) = order_hierarchies(&mut model);
    let inherited = model
        .relationship(
            RelationshipConfig::new(special_order, customer)
                .with_navigation_to_principal("Customer"),
            EXPLICIT,
        )
        .unwrap();
    assert_eq!(model.foreign_key(inherited).unwrap().declaring_type(), order);
    let order_before = model.snapshot_entity_type(order).unwrap();

    model.set_base_type(special_order, None, EXPLICIT).unwrap();

    let fks = model.foreign_keys(special_order).unwrap();
    assert_eq!(fks.len(), 1);
    let recreated = model.foreign_key(fks[0]).unwrap();
    assert_eq!(recreated.declaring_type(), special_order);
    assert_eq!(recreated.principal_type(), customer);
    assert!(recreated.dependent_to_principal().is_some());
    assert!(recreated.principal_to_dependent().is_none());
    let customer_id = model.find_property(special_order, "CustomerId").unwrap().unwrap();
    assert_eq!(model.property(customer_id).unwrap().declaring_type(), special_order);

    assert_eq!(model.snapshot_entity_type(order).unwrap(), order_before);
    let orders = model.find_navigation(customer, "Orders").unwrap().unwrap();
    assert_eq!(model.navigation(orders).unwrap().foreign_key(), inherited);
    model.validate().unwrap();
}

#[test]
fn test_principal_side_relationship_extended_to_siblings() {
    init_test_logging();
    let mut model = bare_model();
    let customer = keyed(&mut model, "Customer");
    let order = keyed(&mut model, "Order");
    let gold = model.add_entity_type("GoldCustomer", EXPLICIT).unwrap();
    let gold_id = model.add_property(gold, "Id", int(), EXPLICIT).unwrap();
    model
        .set_primary_key(gold, &[gold_id], ConfigurationSource::Convention)
        .unwrap();
    let silver = model.add_entity_type("SilverCustomer", EXPLICIT).unwrap();
    model.set_base_type(silver, Some(customer), EXPLICIT).unwrap();
    model
        .relationship(
            RelationshipConfig::new(order, gold).with_navigation_to_dependents("Orders"),
            EXPLICIT,
        )
        .unwrap();

    model.set_base_type(gold, Some(customer), EXPLICIT).unwrap();
    assert_eq!(model.primary_key(gold).unwrap(), model.primary_key(customer).unwrap());

    let orders = model.find_navigation(silver, "Orders").unwrap().unwrap();
    let fk = model.navigation(orders).unwrap().foreign_key();
    assert_eq!(model.foreign_key(fk).unwrap().declaring_type(), order);
    assert_eq!(
        model.foreign_key(fk).unwrap().configuration_source(),
        ConfigurationSource::Convention
    );
    model.validate().unwrap();
}

#[test]
fn test_failed_mutation_leaves_model_unchanged() {
    init_test_logging();
    let mut model = Model::new();
    let customer = keyed(&mut model, "Customer");
    let special = model.add_entity_type("SpecialCustomer", EXPLICIT).unwrap();
    model
        .add_property(special, "Id", ValueType::required(ScalarType::String), EXPLICIT)
        .unwrap();
    let before = model.snapshot().unwrap();

    let err = model
        .set_base_type(special, Some(customer), EXPLICIT)
        .unwrap_err();
    assert!(matches!(err, Error::DuplicatePropertyOnBaseType { .. }));
    assert_eq!(model.snapshot().unwrap(), before);
    model.validate().unwrap();
}

#[test]
fn test_removed_nodes_leave_stale_handles() {
    init_test_logging();
    let mut model = bare_model();
    let customer = keyed(&mut model, "Customer");
    let name = model
        .add_property(customer, "Name", ValueType::optional(ScalarType::String), EXPLICIT)
        .unwrap();

    model.remove_property(name, EXPLICIT).unwrap();
    assert_eq!(
        model.property(name).unwrap_err(),
        Error::StaleHandle { kind: "property" }
    );

    model.remove_entity_type(customer, EXPLICIT).unwrap();
    assert_eq!(
        model.entity_type(customer).unwrap_err(),
        Error::StaleHandle { kind: "entity type" }
    );
    let again = model.add_entity_type("Customer", EXPLICIT).unwrap();
    assert_ne!(again, customer);
    assert!(model.entity_type(customer).is_err());
}

#[test]
fn test_round_trip_keeps_keys_indexes_and_discriminator() {
    init_test_logging();
    let mut model = Model::new();
    let customer = keyed(&mut model, "Customer");
    let special = model.add_entity_type("SpecialCustomer", EXPLICIT).unwrap();
    let code = model.add_property(special, "Code", int(), EXPLICIT).unwrap();
    let email = model
        .add_property(special, "Email", ValueType::required(ScalarType::String), EXPLICIT)
        .unwrap();
    let rating = model
        .add_property(special, "Rating", ValueType::optional(ScalarType::Int32), EXPLICIT)
        .unwrap();
    let tier = model.add_property(special, "Tier", int(), EXPLICIT).unwrap();
    model.set_primary_key(special, &[code], EXPLICIT).unwrap();
    model.add_key(special, &[email], EXPLICIT).unwrap();
    model.add_index(special, &[rating, tier], EXPLICIT).unwrap();

    let vip = model.add_entity_type("VipCustomer", EXPLICIT).unwrap();
    model.set_base_type(vip, Some(special), EXPLICIT).unwrap();
    let perks = model
        .add_property(vip, "Perks", ValueType::optional(ScalarType::String), EXPLICIT)
        .unwrap();
    model.add_index(vip, &[perks], EXPLICIT).unwrap();

    let relational = RelationalEntityType::default();
    let discriminator = relational.discriminator_property(&model, special).unwrap().unwrap();
    assert_eq!(model.property(discriminator).unwrap().declaring_type(), special);
    let special_before = model.snapshot_entity_type(special).unwrap();
    let vip_before = model.snapshot_entity_type(vip).unwrap();
    assert_eq!(special_before.keys.len(), 2);
    assert_eq!(special_before.indexes[0].properties, vec!["Rating", "Tier"]);

    model.set_base_type(special, Some(customer), EXPLICIT).unwrap();
    model.validate().unwrap();
    assert_eq!(primary_keys_in_hierarchy(&model, customer), 1);
    let discriminator = relational.discriminator_property(&model, vip).unwrap().unwrap();
    assert_eq!(model.property(discriminator).unwrap().declaring_type(), customer);

    model.set_base_type(special, None, EXPLICIT).unwrap();
    model.validate().unwrap();
    assert_eq!(model.snapshot_entity_type(special).unwrap(), special_before);
    assert_eq!(model.snapshot_entity_type(vip).unwrap(), vip_before);
    assert!(model.find_property(customer, "Discriminator").unwrap().is_none());
}

#[test]
fn test_round_trip_of_principal_with_sibling_fix_up() {
    init_test_logging();
    let mut model = bare_model();
    let customer = keyed(&mut model, "Customer");
    let order = keyed(&mut model, "Order");
    let silver = model.add_entity_type("SilverCustomer", EXPLICIT).unwrap();
    model.set_base_type(silver, Some(customer), EXPLICIT).unwrap();
    let gold = keyed(&mut model, "GoldCustomer");
    let gold_fk = model
        .relationship(
            RelationshipConfig::new(order, gold).with_navigation_to_dependents("Orders"),
            EXPLICIT,
        )
        .unwrap();
    let gold_before = model.snapshot_entity_type(gold).unwrap();

    model.set_base_type(gold, Some(customer), EXPLICIT).unwrap();
    model.validate().unwrap();
    let silver_orders = model.find_navigation(silver, "Orders").unwrap().unwrap();
    let silver_fk = model.navigation(silver_orders).unwrap().foreign_key();
    assert_eq!(model.foreign_key(silver_fk).unwrap().principal_type(), silver);

    model.set_base_type(gold, None, EXPLICIT).unwrap();
    model.validate().unwrap();
    assert_eq!(model.snapshot_entity_type(gold).unwrap(), gold_before);
    let orders = model.find_navigation(gold, "Orders").unwrap().unwrap();
    assert_eq!(model.navigation(orders).unwrap().foreign_key(), gold_fk);
    assert!(model.find_navigation(silver, "Orders").unwrap().is_some());
}

#[test]
fn test_round_trip_below_keyless_base() {
    init_test_logging();
    let mut model = bare_model();
    let party = model.add_entity_type("Party", EXPLICIT).unwrap();
    let person = model.add_entity_type("Person", EXPLICIT).unwrap();
    let email = model
        .add_property(person, "Email", ValueType::required(ScalarType::String), EXPLICIT)
        .unwrap();
    let rating = model
        .add_property(person, "Rating", ValueType::optional(ScalarType::Int32), EXPLICIT)
        .unwrap();
    let tier = model.add_property(person, "Tier", int(), EXPLICIT).unwrap();
    model.add_key(person, &[email], EXPLICIT).unwrap();
    model.add_index(person, &[rating, tier], EXPLICIT).unwrap();
    let before = model.snapshot_entity_type(person).unwrap();

    model.set_base_type(person, Some(party), EXPLICIT).unwrap();
    model.validate().unwrap();
    assert!(model.primary_key(person).unwrap().is_none());

    model.set_base_type(person, None, EXPLICIT).unwrap();
    model.validate().unwrap();
    assert_eq!(model.snapshot_entity_type(person).unwrap(), before);

    let company = keyed(&mut model, "Company");
    let err = model.set_base_type(company, Some(party), EXPLICIT).unwrap_err();
    assert!(matches!(err, Error::DerivedTypeCannotHaveKeys { .. }));
    assert!(model.is_root(company).unwrap());
}
