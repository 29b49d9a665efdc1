//! Provider-prefix annotation resolution.
//!
//! Relational annotations live under the generic `Relational:` prefix. A
//! database provider may store its own values under its own prefix (for
//! example `SqlServer:`); when a resolver is configured with that prefix the
//! provider value wins on read and all writes go to the provider key. The
//! generic value is never touched by a provider-scoped write.

use super::store::Annotations;
use super::value::AnnotationValue;

/// Prefix of the generic relational annotation layer.
pub const RELATIONAL_PREFIX: &str = "Relational:";

/// Resolves annotation names against an optional provider prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationResolver {
    provider_prefix: Option<String>,
}

impl AnnotationResolver {
    /// A resolver for the generic relational layer only.
    pub fn relational() -> Self {
        Self {
            provider_prefix: None,
        }
    }

    /// A resolver preferring the given provider prefix, e.g. `"SqlServer:"`.
    pub fn for_provider(prefix: impl Into<String>) -> Self {
        Self {
            provider_prefix: Some(prefix.into()),
        }
    }

    /// The configured provider prefix.
    pub fn provider_prefix(&self) -> Option<&str> {
        self.provider_prefix.as_deref()
    }

    /// Whether a provider prefix is configured.
    pub fn enabled(&self) -> bool {
        self.provider_prefix.is_some()
    }

    /// Full key under the generic layer.
    pub fn relational_key(name: &str) -> String {
        format!("{RELATIONAL_PREFIX}{name}")
    }

    /// Full key writes go to.
    pub fn write_key(&self, name: &str) -> String {
        match &self.provider_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => Self::relational_key(name),
        }
    }

    /// Resolve a value: provider key first, then the generic key.
    pub fn get<'a>(&self, annotations: &'a Annotations, name: &str) -> Option<&'a AnnotationValue> {
        if let Some(prefix) = &self.provider_prefix {
            if let Some(value) = annotations.get(&format!("{prefix}{name}")) {
                return Some(value);
            }
        }
        annotations.get(&Self::relational_key(name))
    }

    /// Resolve a string value.
    pub fn get_str<'a>(&self, annotations: &'a Annotations, name: &str) -> Option<&'a str> {
        self.get(annotations, name).and_then(AnnotationValue::as_str)
    }

    /// Write a value; `None` clears the key.
    pub fn set(&self, annotations: &mut Annotations, name: &str, value: Option<AnnotationValue>) {
        annotations.set(self.write_key(name), value);
    }

    /// Every value whose name starts with `name_prefix`, keyed by the name
    /// without layer prefix. Provider values shadow generic ones.
    pub fn collect_with_prefix<'a>(
        &self,
        annotations: &'a Annotations,
        name_prefix: &str,
    ) -> Vec<(String, &'a AnnotationValue)> {
        let mut found: std::collections::BTreeMap<String, &'a AnnotationValue> =
            std::collections::BTreeMap::new();

        let generic = Self::relational_key(name_prefix);
        for (key, value) in annotations.with_prefix(&generic) {
            found.insert(key[RELATIONAL_PREFIX.len()..].to_string(), value);
        }
        if let Some(prefix) = &self.provider_prefix {
            let scoped = format!("{prefix}{name_prefix}");
            for (key, value) in annotations.with_prefix(&scoped) {
                found.insert(key[prefix.len()..].to_string(), value);
            }
        }

        found.into_iter().collect()
    }
}
