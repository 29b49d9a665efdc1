//! Configuration sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who configured a metadata element.
///
/// Sources are totally ordered: `Convention < Explicit < DataAnnotation`.
/// A configuration may only be replaced by a request whose source is at
/// least as strong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfigurationSource {
    /// Inferred by a convention rule.
    Convention,
    /// Configured through the builder API.
    Explicit,
    /// Declared on the record shape.
    DataAnnotation,
}

impl ConfigurationSource {
    /// Whether a request with this source may replace `existing`.
    pub fn overrides(self, existing: Option<ConfigurationSource>) -> bool {
        match existing {
            Some(existing) => self >= existing,
            None => true,
        }
    }

    /// The stronger of `self` and `other`.
    pub fn max_with(self, other: Option<ConfigurationSource>) -> Self {
        match other {
            Some(other) => self.max(other),
            None => self,
        }
    }
}

impl fmt::Display for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConfigurationSource::Convention => "convention",
            ConfigurationSource::Explicit => "explicit configuration",
            ConfigurationSource::DataAnnotation => "data annotation",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigurationSource::*;

    #[test]
    fn test_total_order() {
        assert!(Convention < Explicit);
        assert!(Explicit < DataAnnotation);
    }

    #[test]
    fn test_overrides() {
        assert!(Convention.overrides(None));
        assert!(Convention.overrides(Some(Convention)));
        assert!(!Convention.overrides(Some(Explicit)));
        assert!(DataAnnotation.overrides(Some(Explicit)));
        assert_eq!(Convention.max_with(Some(Explicit)), Explicit);
        assert_eq!(DataAnnotation.max_with(None), DataAnnotation);
    }
}
