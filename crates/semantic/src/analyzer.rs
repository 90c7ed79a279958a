//! The regex-driven semantic analyzer.

use crate::patterns::{PatternError, PatternSet};
use chatbuffer_config::SemanticConfig;
use chatbuffer_core::{
    ClassificationResult, ClassificationSource, Completeness, Entities, Intent, UrgencyClass,
};
use std::collections::BTreeMap;
use tracing::trace;

/// Classifies text against compiled pattern tables.
///
/// Construction compiles every configured pattern, so a malformed regex is
/// reported once at startup. After that, [`classify`](Self::classify) is a
/// pure function of its input and never fails.
#[derive(Debug, Clone)]
pub struct SemanticAnalyzer {
    complete: PatternSet,
    fragments: PatternSet,
    intents: Vec<(Intent, PatternSet)>,
    entities: Vec<(String, PatternSet)>,
    urgency: BTreeMap<String, UrgencyClass>,
}

impl SemanticAnalyzer {
    pub fn new(config: &SemanticConfig) -> Result<Self, PatternError> {
        let patterns = &config.patterns;

        let intents = patterns
            .intents
            .iter()
            .map(|i| {
                PatternSet::compile(&format!("intents.{}", i.name), &i.patterns)
                    .map(|set| (Intent::new(&i.name), set))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let entities = patterns
            .entities
            .iter()
            .map(|e| {
                PatternSet::compile(&format!("entities.{}", e.kind), &e.patterns)
                    .map(|set| (e.kind.clone(), set))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            complete: PatternSet::compile("complete", &patterns.complete)?,
            fragments: PatternSet::compile("fragments", &patterns.fragments)?,
            intents,
            entities,
            urgency: config.urgency.clone(),
        })
    }

    /// Classify one message. `prior` entities are carried into the result.
    pub fn classify(&self, text: &str, prior: Option<&Entities>) -> ClassificationResult {
        let normalized = normalize(text);

        let completeness = self.completeness(&normalized);
        let intent = self.intent(&normalized);
        let mut entities = self.entities(&normalized);
        if let Some(prior) = prior {
            entities.merge(prior);
        }
        let urgency = self.urgency_for(&intent);

        trace!(
            completeness = ?completeness,
            intent = %intent,
            urgency = %urgency,
            entities = entities.value_count(),
            "Classified message"
        );

        ClassificationResult {
            completeness,
            intent,
            entities,
            urgency,
            source: ClassificationSource::Regex,
            confidence: 1.0,
        }
    }

    /// First `complete` match wins; then `fragments`; unmatched text is complete.
    pub fn completeness(&self, normalized: &str) -> Completeness {
        if self.complete.is_match(normalized) {
            Completeness::Complete
        } else if self.fragments.is_match(normalized) {
            Completeness::Fragment
        } else {
            Completeness::Complete
        }
    }

    /// First intent (in priority order) with a matching pattern.
    pub fn intent(&self, normalized: &str) -> Intent {
        self.intents
            .iter()
            .find(|(_, set)| set.is_match(normalized))
            .map(|(intent, _)| intent.clone())
            .unwrap_or_else(Intent::unknown)
    }

    pub fn entities(&self, normalized: &str) -> Entities {
        let mut entities = Entities::new();
        for (kind, set) in &self.entities {
            for value in set.extract(normalized) {
                entities.insert(kind.as_str(), value);
            }
        }
        entities
    }

    /// Urgency from the configured table; unlisted intents use the `unknown` entry.
    pub fn urgency_for(&self, intent: &Intent) -> UrgencyClass {
        self.urgency
            .get(intent.as_str())
            .or_else(|| self.urgency.get(Intent::UNKNOWN))
            .copied()
            .unwrap_or_default()
    }

    /// Whether `name` is one of the configured intents.
    pub fn knows_intent(&self, name: &str) -> bool {
        self.intents.iter().any(|(intent, _)| intent.as_str() == name)
    }
}

/// Trim and lowercase for matching. The caller keeps the original text.
fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
