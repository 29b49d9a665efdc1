//! Model-level relational settings: default schema and sequences.

use super::names::{DEFAULT_SCHEMA, SEQUENCE_PREFIX};
use super::sequence::{Sequence, SequenceBuilder};
use crate::annotations::{AnnotationResolver, AnnotationValue};
use crate::error::{Error, Result};
use crate::metadata::Model;
use tracing::debug;

/// Resolved model-level mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMapping {
    pub default_schema: Option<String>,
    pub sequences: Vec<Sequence>,
}

/// Relational view of the model.
#[derive(Debug, Clone, Default)]
pub struct RelationalModel {
    resolver: AnnotationResolver,
}

impl RelationalModel {
    pub fn new(resolver: AnnotationResolver) -> Self {
        Self { resolver }
    }

    /// Schema callers fall back to when an entity type has none.
    pub fn default_schema(&self, model: &Model) -> Option<String> {
        self.resolver
            .get_str(model.model_annotations(), DEFAULT_SCHEMA)
            .map(str::to_string)
    }

    pub fn set_default_schema(&self, model: &mut Model, schema: Option<&str>) {
        self.resolver.set(
            model.model_annotations_mut(),
            DEFAULT_SCHEMA,
            schema.map(AnnotationValue::from),
        );
    }

    /// Find a stored sequence. The provider's value wins over the generic
    /// one.
    pub fn find_sequence(
        &self,
        model: &Model,
        name: &str,
        schema: Option<&str>,
    ) -> Result<Option<Sequence>> {
        let key = Sequence::annotation_name_for(name, schema.filter(|s| !s.is_empty()));
        self.resolver
            .get(model.model_annotations(), &key)
            .map(decode)
            .transpose()
    }

    /// Return the stored sequence, creating it with default settings if it
    /// does not exist.
    pub fn get_or_add_sequence(
        &self,
        model: &mut Model,
        name: &str,
        schema: Option<&str>,
    ) -> Result<Sequence> {
        if let Some(sequence) = self.find_sequence(model, name, schema)? {
            return Ok(sequence);
        }
        let sequence = Sequence::new(name, schema)?;
        self.set_sequence(model, &sequence);
        debug!(sequence = %sequence, "sequence added");
        Ok(sequence)
    }

    /// Store a sequence, replacing any with the same name and schema.
    pub fn set_sequence(&self, model: &mut Model, sequence: &Sequence) {
        self.resolver.set(
            model.model_annotations_mut(),
            &sequence.annotation_name(),
            Some(AnnotationValue::String(sequence.serialize())),
        );
    }

    /// Remove the sequence from this resolver's layer and return what was
    /// visible before.
    pub fn remove_sequence(
        &self,
        model: &mut Model,
        name: &str,
        schema: Option<&str>,
    ) -> Result<Option<Sequence>> {
        let removed = self.find_sequence(model, name, schema)?;
        let key = Sequence::annotation_name_for(name, schema.filter(|s| !s.is_empty()));
        self.resolver.set(model.model_annotations_mut(), &key, None);
        Ok(removed)
    }

    /// Every visible sequence, ordered by annotation name.
    pub fn sequences(&self, model: &Model) -> Result<Vec<Sequence>> {
        self.resolver
            .collect_with_prefix(model.model_annotations(), SEQUENCE_PREFIX)
            .into_iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    /// A builder over the named sequence, created if missing.
    pub fn sequence_builder<'m>(
        &self,
        model: &'m mut Model,
        name: &str,
        schema: Option<&str>,
    ) -> Result<SequenceBuilder<'m>> {
        let sequence = self.get_or_add_sequence(model, name, schema)?;
        Ok(SequenceBuilder::new(model, self.resolver.clone(), sequence))
    }

    pub fn read(&self, model: &Model) -> Result<ModelMapping> {
        Ok(ModelMapping {
            default_schema: self.default_schema(model),
            sequences: self.sequences(model)?,
        })
    }

    /// Store the default schema and every listed sequence.
    pub fn write(&self, model: &mut Model, mapping: &ModelMapping) -> Result<()> {
        self.set_default_schema(model, mapping.default_schema.as_deref());
        for sequence in &mapping.sequences {
            self.set_sequence(model, sequence);
        }
        Ok(())
    }
}

fn decode(value: &AnnotationValue) -> Result<Sequence> {
    match value.as_str() {
        Some(text) => Sequence::deserialize(text),
        None => Err(Error::bad_sequence(format!(
            "sequence annotation holds a {} value",
            value.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::SequenceType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_or_add_is_idempotent() {
        let mut model = Model::new();
        let relational = RelationalModel::default();

        let first = relational
            .get_or_add_sequence(&mut model, "OrderNumbers", Some("dbo"))
            .unwrap();
        let second = relational
            .get_or_add_sequence(&mut model, "OrderNumbers", Some("dbo"))
            .unwrap();
        assert_eq!(first.serialize(), second.serialize());
        assert_eq!(relational.sequences(&model).unwrap().len(), 1);
        assert!(model
            .model_annotations()
            .contains("Relational:Sequence:dbo.OrderNumbers"));
    }

    #[test]
    fn test_builder_persists_each_facet() {
        let mut model = Model::new();
        let relational = RelationalModel::default();

        let _ = relational
            .sequence_builder(&mut model, "Ids", None)
            .unwrap()
            .starts_at(100)
            .increments_by(10);
        let stored = relational.find_sequence(&model, "Ids", None).unwrap().unwrap();
        assert_eq!(stored.start_value(), 100);
        assert_eq!(stored.increment_by(), 10);
        assert_eq!(stored.sequence_type(), SequenceType::Int64);
    }

    #[test]
    fn test_provider_sequence_shadows_generic() {
        let mut model = Model::new();
        let generic = RelationalModel::default();
        let provider = RelationalModel::new(AnnotationResolver::for_provider("SqlServer:"));

        generic
            .set_sequence(&mut model, &Sequence::new("Ids", None).unwrap().with_start_value(1));
        provider
            .set_sequence(&mut model, &Sequence::new("Ids", None).unwrap().with_start_value(50));

        assert_eq!(generic.sequences(&model).unwrap()[0].start_value(), 1);
        let visible = provider.sequences(&model).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].start_value(), 50);

        provider.remove_sequence(&mut model, "Ids", None).unwrap();
        assert_eq!(
            provider.find_sequence(&model, "Ids", None).unwrap().unwrap().start_value(),
            1
        );
    }

    #[test]
    fn test_non_string_sequence_annotation() {
        let mut model = Model::new();
        model
            .model_annotations_mut()
            .set("Relational:Sequence:.Ids", Some(AnnotationValue::Integer(3)));
        let err = RelationalModel::default()
            .find_sequence(&model, "Ids", None)
            .unwrap_err();
        assert!(matches!(err, Error::BadSequenceString { .. }));
    }
}
