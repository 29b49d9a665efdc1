//! Convention pipeline.
//!
//! Conventions are rules that react to model changes by making further
//! changes with [`ConfigurationSource::Convention`](crate::metadata::ConfigurationSource)
//! or `DataAnnotation` source. Every mutating model operation dispatches a
//! [`ConventionEvent`] to each registered rule, synchronously and in
//! registration order. A rule's mutations dispatch their own events, so
//! dispatch nests; an error from any rule vetoes the triggering operation.

mod declarative;
mod discriminator;
mod event;
mod foreign_key_index;
mod key_discovery;
mod property_discovery;
mod relationship_discovery;

pub use declarative::DeclarativeAnnotationConvention;
pub use discriminator::DiscriminatorConvention;
pub use event::ConventionEvent;
pub use foreign_key_index::ForeignKeyIndexConvention;
pub use key_discovery::KeyDiscoveryConvention;
pub use property_discovery::PropertyDiscoveryConvention;
pub use relationship_discovery::RelationshipDiscoveryConvention;

use crate::error::{Error, ErrorCategory, Result};
use crate::metadata::Model;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A model-building rule.
pub trait Convention: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// React to `event`. Returning an error vetoes the change that caused
    /// the event.
    fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()>;
}

/// Ordered collection of conventions.
#[derive(Clone, Default)]
pub struct ConventionSet {
    conventions: Vec<Arc<dyn Convention>>,
}

impl ConventionSet {
    /// A set with no conventions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in conventions in their standard order.
    pub fn default_set() -> Self {
        Self::empty()
            .with(DeclarativeAnnotationConvention)
            .with(PropertyDiscoveryConvention)
            .with(KeyDiscoveryConvention)
            .with(RelationshipDiscoveryConvention)
            .with(DiscriminatorConvention)
            .with(ForeignKeyIndexConvention)
    }

    /// Append a convention.
    pub fn with(mut self, convention: impl Convention + 'static) -> Self {
        self.push(Arc::new(convention));
        self
    }

    /// Append a shared convention.
    pub fn push(&mut self, convention: Arc<dyn Convention>) {
        self.conventions.push(convention);
    }

    pub fn len(&self) -> usize {
        self.conventions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conventions.is_empty()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.conventions.iter().map(|c| c.name()).collect()
    }

    pub(crate) fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
        for convention in &self.conventions {
            trace!(convention = convention.name(), event = event.kind(), "applying convention");
            convention.apply(model, event).map_err(|err| {
                debug!(
                    convention = convention.name(),
                    event = event.kind(),
                    error = %err,
                    "convention vetoed change"
                );
                err
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConventionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConventionSet")
            .field("conventions", &self.names())
            .finish()
    }
}

/// Run a best-effort convention step. Failures other than internal ones
/// mean the convention does not apply here and are logged and dropped.
pub(crate) fn tolerate<T>(convention: &'static str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.category() == ErrorCategory::Internal => Err(err),
        Err(err @ Error::ConfigurationConflict { .. }) => {
            warn!(
                convention,
                error = %err,
                "convention skipped: configuration from a stronger source wins"
            );
            Ok(None)
        }
        Err(err) => {
            debug!(convention, error = %err, "convention skipped");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::metadata::{ConfigurationSource, EntityTypeId};
    use std::sync::Mutex;

    struct Recorder {
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Convention for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn apply(&self, _model: &mut Model, event: &ConventionEvent) -> Result<()> {
            self.seen.lock().unwrap().push(event.kind());
            Ok(())
        }
    }

    struct Veto;

    impl Convention for Veto {
        fn name(&self) -> &'static str {
            "veto"
        }

        fn apply(&self, _model: &mut Model, event: &ConventionEvent) -> Result<()> {
            match event {
                ConventionEvent::PropertyAdded(_) => Err(Error::invariant("no properties allowed")),
                _ => Ok(()),
            }
        }
    }

    /// Adds an entity type for every entity type added, forever.
    struct Runaway;

    impl Convention for Runaway {
        fn name(&self) -> &'static str {
            "runaway"
        }

        fn apply(&self, model: &mut Model, event: &ConventionEvent) -> Result<()> {
            if let ConventionEvent::EntityTypeAdded(id) = event {
                let next = format!("{}X", model.entity_type(*id)?.name());
                model.add_entity_type(&next, ConfigurationSource::Convention)?;
            }
            Ok(())
        }
    }

    fn add(model: &mut Model, name: &str) -> Result<EntityTypeId> {
        model.add_entity_type(name, ConfigurationSource::Explicit)
    }

    #[test]
    fn test_default_set_order() {
        assert_eq!(
            ConventionSet::default_set().names(),
            vec![
                "declarative_annotations",
                "property_discovery",
                "key_discovery",
                "relationship_discovery",
                "discriminator",
                "foreign_key_index",
            ]
        );
    }

    #[test]
    fn test_events_reach_conventions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = ConventionSet::empty().with(Recorder { seen: seen.clone() });
        let mut model = Model::with_conventions(ModelConfig::default(), set);

        add(&mut model, "Customer").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["entity_type_added"]);
    }

    #[test]
    fn test_veto_rolls_back() {
        let set = ConventionSet::empty().with(Veto);
        let mut model = Model::with_conventions(ModelConfig::default(), set);
        let customer = add(&mut model, "Customer").unwrap();
        let before = model.snapshot().unwrap();

        let err = model
            .add_property(
                customer,
                "Name",
                crate::metadata::ValueType::optional(crate::metadata::ScalarType::String),
                ConfigurationSource::Explicit,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
        assert_eq!(model.snapshot().unwrap(), before);
    }

    #[test]
    fn test_depth_limit() {
        let set = ConventionSet::empty().with(Runaway);
        let config = ModelConfig::default().with_max_convention_depth(8);
        let mut model = Model::with_conventions(config, set);

        let err = add(&mut model, "A").unwrap_err();
        assert_eq!(err, Error::ConventionDepthExceeded { depth: 8 });
        assert!(model.entity_types().is_empty());
    }
}
