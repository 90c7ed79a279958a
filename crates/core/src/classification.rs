//! Classification result types produced by the semantic analyzer.
//!
//! A [`ClassificationResult`] is derived from message text and never
//! persisted. It answers three questions: is the thought finished
//! ([`Completeness`]), what does the user want ([`Intent`]), and how long is
//! the engine willing to wait for more text ([`UrgencyClass`]).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Whether a message stands on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Completeness {
    /// Linguistically incomplete; more text is expected.
    Fragment,
    /// Ready for downstream processing.
    Complete,
}

impl Completeness {
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Coarse category selecting the timing profile entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyClass {
    Urgent,
    Simple,
    #[default]
    Complex,
}

impl std::fmt::Display for UrgencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Urgent => "urgent",
            Self::Simple => "simple",
            Self::Complex => "complex",
        };
        f.write_str(s)
    }
}

/// An intent label from the configured closed set, or `unknown`.
///
/// Intent names are data (they come from the industry preset), so this is a
/// string newtype rather than an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intent(String);

impl Intent {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for Intent {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Extracted entities: entity kind → deduplicated set of values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entities(BTreeMap<String, BTreeSet<String>>);

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value under `kind`. Returns `false` if it was already present.
    pub fn insert(&mut self, kind: impl Into<String>, value: impl Into<String>) -> bool {
        self.0.entry(kind.into()).or_default().insert(value.into())
    }

    /// Union another entity set into this one.
    pub fn merge(&mut self, other: &Entities) {
        for (kind, values) in &other.0 {
            self.0
                .entry(kind.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    pub fn get(&self, kind: &str) -> Option<&BTreeSet<String>> {
        self.0.get(kind)
    }

    pub fn contains(&self, kind: &str, value: &str) -> bool {
        self.0.get(kind).is_some_and(|v| v.contains(value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    /// Total number of values across all kinds.
    pub fn value_count(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Entities {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entities = Self::new();
        for (kind, value) in iter {
            entities.insert(kind, value);
        }
        entities
    }
}

/// Where a classification came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    #[default]
    Regex,
    Ml,
}

/// The outcome of classifying one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub completeness: Completeness,
    pub intent: Intent,
    #[serde(default)]
    pub entities: Entities,
    pub urgency: UrgencyClass,
    #[serde(default)]
    pub source: ClassificationSource,
    /// 1.0 for pattern matches; the service score for ML results.
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_deduplicate_values() {
        let mut entities = Entities::new();
        assert!(entities.insert("date", "mañana"));
        assert!(!entities.insert("date", "mañana"));
        assert!(entities.insert("date", "hoy"));
        assert_eq!(entities.value_count(), 2);
        assert!(entities.contains("date", "mañana"));
    }

    #[test]
    fn entities_merge_unions_kinds() {
        let mut a: Entities = [("date", "hoy")].into_iter().collect();
        let b: Entities = [("date", "mañana"), ("time", "10hs")].into_iter().collect();
        a.merge(&b);
        assert_eq!(a.get("date").map(|s| s.len()), Some(2));
        assert!(a.contains("time", "10hs"));
    }

    #[test]
    fn entities_serialize_as_plain_map() {
        let entities: Entities = [("date", "hoy")].into_iter().collect();
        let json = serde_json::to_string(&entities).unwrap();
        assert_eq!(json, r#"{"date":["hoy"]}"#);
    }

    #[test]
    fn unknown_intent_is_default() {
        assert!(Intent::default().is_unknown());
        assert_eq!(Intent::new("appointment"), "appointment");
    }

    #[test]
    fn completeness_wire_format() {
        let json = serde_json::to_string(&Completeness::Fragment).unwrap();
        assert_eq!(json, "\"FRAGMENT\"");
    }
}
