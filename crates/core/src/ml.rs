//! ML classifier trait: the optional external intent service.

use crate::classification::Entities;
use crate::error::ClassifierError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Response of the ML service for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlPrediction {
    pub intent: String,
    pub confidence: f32,
    #[serde(default)]
    pub entities: Entities,
}

#[async_trait]
pub trait MlClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Predict intent and entities for `text`.
    async fn predict(&self, text: &str) -> Result<MlPrediction, ClassifierError>;
}
