//! Model configuration.

/// Default bound on nested convention dispatch.
pub const DEFAULT_MAX_CONVENTION_DEPTH: usize = 64;

/// Default name of the shadow discriminator property added by convention.
pub const DEFAULT_DISCRIMINATOR_PROPERTY: &str = "Discriminator";

/// Configuration for a [`Model`](crate::Model).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Maximum depth of nested convention dispatch before the triggering
    /// mutation is rejected.
    pub max_convention_depth: usize,

    /// Name used when the discriminator convention creates a shadow property.
    pub discriminator_property_name: String,

    /// Whether the built-in conventions run at all.
    pub run_conventions: bool,
}

impl ModelConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            max_convention_depth: DEFAULT_MAX_CONVENTION_DEPTH,
            discriminator_property_name: DEFAULT_DISCRIMINATOR_PROPERTY.to_string(),
            run_conventions: true,
        }
    }

    /// A configuration for hand-built models with no conventions.
    pub fn without_conventions() -> Self {
        Self::new().with_run_conventions(false)
    }

    /// Set the maximum convention dispatch depth.
    pub fn with_max_convention_depth(mut self, depth: usize) -> Self {
        self.max_convention_depth = depth;
        self
    }

    /// Set the discriminator property name used by convention.
    pub fn with_discriminator_property_name(mut self, name: impl Into<String>) -> Self {
        self.discriminator_property_name = name.into();
        self
    }

    /// Enable or disable the built-in conventions.
    pub fn with_run_conventions(mut self, run: bool) -> Self {
        self.run_conventions = run;
        self
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.max_convention_depth, DEFAULT_MAX_CONVENTION_DEPTH);
        assert_eq!(config.discriminator_property_name, "Discriminator");
        assert!(config.run_conventions);
    }

    #[test]
    fn test_builder() {
        let config = ModelConfig::new()
            .with_max_convention_depth(8)
            .with_discriminator_property_name("Kind");
        assert_eq!(config.max_convention_depth, 8);
        assert_eq!(config.discriminator_property_name, "Kind");
        assert!(!ModelConfig::without_conventions().run_conventions);
    }
}
