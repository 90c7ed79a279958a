//! HTTP client for the optional ML intent service.
//!
//! Request: `POST <endpoint>` with `{"text": "..."}`.
//! Response: `{"intent": "...", "confidence": 0.0-1.0, "entities": {...}}`.
//!
//! The client only reports failures; confidence gating and the regex
//! fallback are applied by the engine.

use async_trait::async_trait;
use chatbuffer_core::error::ClassifierError;
use chatbuffer_core::ml::{MlClassifier, MlPrediction};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// An ML classifier reached over HTTP.
pub struct HttpMlClassifier {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

impl HttpMlClassifier {
    /// Create a client with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MlClassifier for HttpMlClassifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn predict(&self, text: &str) -> Result<MlPrediction, ClassifierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&PredictRequest { text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    ClassifierError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Unavailable(format!(
                "status {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;
        let prediction = parse_prediction(&body)?;

        debug!(
            intent = %prediction.intent,
            confidence = prediction.confidence,
            "ML prediction received"
        );
        Ok(prediction)
    }
}

/// Decode and sanity-check a prediction body.
fn parse_prediction(body: &str) -> Result<MlPrediction, ClassifierError> {
    let prediction: MlPrediction = serde_json::from_str(body)
        .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

    if !(0.0..=1.0).contains(&prediction.confidence) {
        return Err(ClassifierError::InvalidResponse(format!(
            "confidence out of range: {}",
            prediction.confidence
        )));
    }
    if prediction.intent.trim().is_empty() {
        return Err(ClassifierError::InvalidResponse("empty intent".into()));
    }
    Ok(prediction)
}
