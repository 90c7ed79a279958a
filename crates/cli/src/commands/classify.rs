//! `chatbuffer classify`: Run the classifier on one message.

use chatbuffer_config::EngineConfig;
use chatbuffer_engine::HybridClassifier;
use chatbuffer_semantic::{HttpMlClassifier, SemanticAnalyzer};
use std::sync::Arc;
use std::time::Duration;

pub async fn run(config: &EngineConfig, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let analyzer = SemanticAnalyzer::new(&config.semantic)?;
    let classifier = match (config.ml.enabled, &config.ml.endpoint) {
        (true, Some(endpoint)) => {
            let ml = HttpMlClassifier::new(
                endpoint.clone(),
                Duration::from_millis(config.ml.timeout_ms),
            )?;
            HybridClassifier::with_ml(
                analyzer,
                Arc::new(ml),
                config.circuit_breaker.ml,
                config.ml.confidence,
                Arc::new(chatbuffer_core::EventBus::default()),
            )
        }
        _ => HybridClassifier::regex_only(analyzer),
    };

    let result = classifier.classify(text, None).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
