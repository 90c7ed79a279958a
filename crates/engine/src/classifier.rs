//! Regex classification with an optional ML override.
//!
//! The regex analyzer always runs. When an ML service is configured its
//! prediction is requested through the ML circuit breaker and merged only
//! when the confidence gate allows it; any failure keeps the regex result.

use crate::circuit_breaker::{CircuitBreaker, CircuitError, CircuitSnapshot};
use chatbuffer_config::{BreakerConfig, ConfidenceConfig};
use chatbuffer_core::{
    ClassificationResult, ClassificationSource, ClassifierError, Entities, EventBus, Intent,
    MlClassifier, MlPrediction,
};
use chatbuffer_semantic::SemanticAnalyzer;
use std::sync::Arc;
use tracing::{debug, warn};

struct MlGuard {
    service: Arc<dyn MlClassifier>,
    breaker: CircuitBreaker,
}

pub struct HybridClassifier {
    analyzer: SemanticAnalyzer,
    ml: Option<MlGuard>,
    confidence: ConfidenceConfig,
}

impl HybridClassifier {
    /// Pure regex classification.
    pub fn regex_only(analyzer: SemanticAnalyzer) -> Self {
        Self {
            analyzer,
            ml: None,
            confidence: ConfidenceConfig::default(),
        }
    }

    pub fn with_ml(
        analyzer: SemanticAnalyzer,
        service: Arc<dyn MlClassifier>,
        breaker: BreakerConfig,
        confidence: ConfidenceConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            analyzer,
            ml: Some(MlGuard {
                service,
                breaker: CircuitBreaker::new("ml", breaker).with_events(events),
            }),
            confidence,
        }
    }

    pub fn analyzer(&self) -> &SemanticAnalyzer {
        &self.analyzer
    }

    pub fn ml_enabled(&self) -> bool {
        self.ml.is_some()
    }

    pub fn ml_circuit(&self) -> Option<CircuitSnapshot> {
        self.ml.as_ref().map(|ml| ml.breaker.snapshot())
    }

    /// Classify `text`. Never fails: every ML problem falls back to regex.
    pub async fn classify(&self, text: &str, prior: Option<&Entities>) -> ClassificationResult {
        let regex = self.analyzer.classify(text, prior);

        let Some(ml) = &self.ml else {
            return regex;
        };

        let outcome = ml.breaker.call(|| ml.service.predict(text)).await;
        match outcome {
            Ok(prediction) => self.merge(regex, prediction),
            Err(CircuitError::Open { .. }) => {
                debug!(service = ml.service.name(), "ML circuit open, using regex result");
                regex
            }
            Err(CircuitError::Timeout { timeout_ms }) => {
                warn!(
                    error = %ClassifierError::Timeout { timeout_ms },
                    "ML classification failed, using regex result"
                );
                regex
            }
            Err(CircuitError::Inner(e)) => {
                warn!(error = %e, "ML classification failed, using regex result");
                regex
            }
        }
    }

    /// Apply the confidence gate.
    ///
    /// At or above `min_threshold` the ML intent wins. Between the two
    /// thresholds it only fills in an unknown regex intent. Below
    /// `fallback_threshold` the prediction is ignored.
    fn merge(&self, regex: ClassificationResult, prediction: MlPrediction) -> ClassificationResult {
        let confidence = prediction.confidence;
        let predicted = Intent::new(prediction.intent.trim().to_lowercase());

        let trusted = confidence >= self.confidence.min_threshold
            || (confidence >= self.confidence.fallback_threshold && regex.intent.is_unknown());
        if !trusted || predicted.is_unknown() {
            debug!(
                intent = %predicted,
                confidence,
                "ML prediction below confidence gate, using regex result"
            );
            return regex;
        }

        let mut entities = regex.entities;
        entities.merge(&prediction.entities);
        let urgency = self.analyzer.urgency_for(&predicted);

        ClassificationResult {
            completeness: regex.completeness,
            intent: predicted,
            entities,
            urgency,
            source: ClassificationSource::Ml,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatbuffer_config::EngineConfig;
    use chatbuffer_core::{Completeness, UrgencyClass};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedMl {
        reply: Result<MlPrediction, ClassifierError>,
        calls: AtomicUsize,
    }

    impl ScriptedMl {
        fn predicting(intent: &str, confidence: f32) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(MlPrediction {
                    intent: intent.into(),
                    confidence,
                    entities: Entities::new(),
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(ClassifierError::Unavailable("connection refused".into())),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MlClassifier for ScriptedMl {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn predict(&self, _text: &str) -> Result<MlPrediction, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn analyzer() -> SemanticAnalyzer {
        SemanticAnalyzer::new(&EngineConfig::default().semantic).unwrap()
    }

    fn hybrid(ml: Arc<ScriptedMl>) -> HybridClassifier {
        let config = EngineConfig::default();
        HybridClassifier::with_ml(
            analyzer(),
            ml,
            config.circuit_breaker.ml,
            config.ml.confidence,
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn regex_only_matches_analyzer() {
        let classifier = HybridClassifier::regex_only(analyzer());
        let result = classifier.classify("Hola doctor", None).await;
        assert_eq!(result, analyzer().classify("Hola doctor", None));
        assert!(classifier.ml_circuit().is_none());
    }

    #[tokio::test]
    async fn confident_prediction_overrides_regex_intent() {
        let classifier = hybrid(ScriptedMl::predicting("cancellation", 0.92));
        let result = classifier.classify("quiero un turno", None).await;
        assert_eq!(result.intent, "cancellation");
        assert_eq!(result.source, ClassificationSource::Ml);
        assert_eq!(result.urgency, UrgencyClass::Urgent);
        assert_eq!(result.completeness, Completeness::Fragment);
    }

    #[tokio::test]
    async fn mid_confidence_only_fills_unknown_intent() {
        let classifier = hybrid(ScriptedMl::predicting("information", 0.6));

        let known = classifier.classify("quiero un turno", None).await;
        assert_eq!(known.intent, "appointment");
        assert_eq!(known.source, ClassificationSource::Regex);

        let unknown = classifier.classify("zzz qwerty", None).await;
        assert_eq!(unknown.intent, "information");
        assert_eq!(unknown.source, ClassificationSource::Ml);
    }

    #[tokio::test]
    async fn low_confidence_is_discarded() {
        let classifier = hybrid(ScriptedMl::predicting("information", 0.2));
        let result = classifier.classify("zzz qwerty", None).await;
        assert!(result.intent.is_unknown());
        assert_eq!(result.source, ClassificationSource::Regex);
    }

    #[tokio::test]
    async fn failures_fall_back_and_open_the_circuit() {
        let ml = ScriptedMl::failing();
        let classifier = hybrid(ml.clone());
        let threshold = EngineConfig::default().circuit_breaker.ml.threshold as usize;

        for _ in 0..threshold + 2 {
            let result = classifier.classify("Hola doctor", None).await;
            assert_eq!(result.intent, "greeting");
        }
        assert_eq!(ml.calls.load(Ordering::SeqCst), threshold);
        assert_eq!(
            classifier.ml_circuit().unwrap().status,
            crate::circuit_breaker::CircuitStatus::Open
        );
    }
}
