//! The classification model collaborator.
//!
//! The gateway treats the model as a black box behind the [`Classifier`]
//! trait: four floats in, one class out. [`ThresholdClassifier`] is the
//! built-in implementation; tests substitute counting and failing mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 4-dimensional iris feature vector.
///
/// Field names double as the JSON wire format for `POST /predict`.
/// Immutable once constructed; the cache derives its key from the exact bit
/// patterns of the four fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl FeatureVector {
    pub fn new(sepal_length: f64, sepal_width: f64, petal_length: f64, petal_width: f64) -> Self {
        Self {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
        }
    }
}

/// Model invocation failure.
///
/// Request-fatal: mapped to HTTP 500, never silently replaced with a
/// default class, and never allowed to populate the cache or the ledger.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model inference failed: {0}")]
    Inference(String),
}

/// Black-box classification function: `classify(features) -> class`.
///
/// Implementations must be deterministic for a given input — the cache
/// stores the first result per distinct vector forever.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, features: &FeatureVector) -> Result<i64, ModelError>;
}

/// Built-in deterministic classifier using the classic petal-measure
/// decision thresholds for the iris dataset.
///
/// Classes: 0 = setosa, 1 = versicolor, 2 = virginica.
pub struct ThresholdClassifier;

#[async_trait]
impl Classifier for ThresholdClassifier {
    async fn classify(&self, features: &FeatureVector) -> Result<i64, ModelError> {
        let class = if features.petal_length < 2.45 {
            0
        } else if features.petal_width < 1.75 {
            1
        } else {
            2
        };
        Ok(class)
    }
}
