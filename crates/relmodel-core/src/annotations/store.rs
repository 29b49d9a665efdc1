//! Per-node annotation store.

use super::value::AnnotationValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name/value annotations attached to a metadata node.
///
/// Keys are kept sorted so iteration and serialized snapshots are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations {
    entries: BTreeMap<String, AnnotationValue>,
}

impl Annotations {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an annotation by its full key.
    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.entries.get(key)
    }

    /// Set or, with `None`, remove an annotation. Returns the previous value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: Option<AnnotationValue>,
    ) -> Option<AnnotationValue> {
        let key = key.into();
        match value {
            Some(value) => self.entries.insert(key, value),
            None => self.entries.remove(&key),
        }
    }

    /// Remove an annotation.
    pub fn remove(&mut self, key: &str) -> Option<AnnotationValue> {
        self.entries.remove(key)
    }

    /// Check if an annotation exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over all annotations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnnotationValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Annotations whose key starts with `prefix`.
    /// The returned items borrow only from the store, not from `prefix`.
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &str,
    ) -> impl Iterator<Item = (&'a str, &'a AnnotationValue)> + 'a {
        let prefix = prefix.to_string();
        self.entries
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(prefix.as_str()))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Remove every annotation whose key ends with `suffix`.
    pub(crate) fn remove_with_suffix(&mut self, suffix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.ends_with(suffix));
        before - self.entries.len()
    }

    /// Number of annotations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no annotations are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let mut annotations = Annotations::new();
        assert!(annotations.set("Relational:TableName", Some("Orders".into())).is_none());
        assert_eq!(
            annotations.get("Relational:TableName"),
            Some(&AnnotationValue::from("Orders"))
        );

        let previous = annotations.set("Relational:TableName", None);
        assert_eq!(previous, Some(AnnotationValue::from("Orders")));
        assert!(annotations.is_empty());
    }

    #[test]
    fn test_prefix_scan() {
        let mut annotations = Annotations::new();
        annotations.set("Relational:Sequence:.A", Some("a".into()));
        annotations.set("Relational:Sequence:dbo.B", Some("b".into()));
        annotations.set("Relational:TableName", Some("T".into()));
        annotations.set("SqlServer:Sequence:.A", Some("c".into()));

        let keys: Vec<&str> = annotations
            .with_prefix("Relational:Sequence:")
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["Relational:Sequence:.A", "Relational:Sequence:dbo.B"]);
    }

    #[test]
    fn test_prefix_scan_with_temporary_prefix() {
        let mut annotations = Annotations::new();
        annotations.set("SqlServer:Sequence:.A", Some("a".into()));
        annotations.set("SqlServer:TableName", Some("T".into()));

        let found: Vec<(&str, &AnnotationValue)> = {
            let provider = String::from("SqlServer:");
            let key = format!("{provider}Sequence:");
            annotations.with_prefix(&key).collect()
        };
        assert_eq!(found, vec![("SqlServer:Sequence:.A", &AnnotationValue::from("a"))]);
    }

    #[test]
    fn test_remove_with_suffix() {
        let mut annotations = Annotations::new();
        annotations.set("Relational:DiscriminatorProperty", Some("Kind".into()));
        annotations.set("SqlServer:DiscriminatorProperty", Some("Kind".into()));
        annotations.set("Relational:TableName", Some("T".into()));

        assert_eq!(annotations.remove_with_suffix(":DiscriminatorProperty"), 2);
        assert_eq!(annotations.len(), 1);
    }
}
