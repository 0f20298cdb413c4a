//! Crop Yield Prediction
//!
//! Predicts yield (kg/m²) for rectangular crop areas of a farm layout from
//! geometry, soil metrics and farming practices, and aggregates per-area
//! values into layout totals.
//!
//! Module structure:
//! - `types`: crop area / soil context / result records
//! - `encoding/`: canonical casing rule, vocabulary, feature vector
//! - `predictors/`: trained-model predictor + heuristic fallback
//! - `service`: batch orchestration with per-item fallback
//! - `aggregator`: layout totals
//! - `config`: environment / JSON configuration

pub mod types;
pub mod error;
pub mod config;
pub mod encoding;
pub mod predictors;
pub mod service;
pub mod aggregator;

#[cfg(feature = "async")]
pub mod async_service;

// Re-export commonly used types
pub use types::{
    BatchPredictionResult, CropAreaInput, CropId, LayoutContext, LayoutTotals, NumericInput,
    PredictBatchRequest, PredictBatchResponse, PredictionResult, PredictionSource,
};
pub use error::{PredictorError, ValidationError, VocabularyError};
pub use config::{PredictionMode, ServiceConfig};
pub use encoding::{EncodedFeatureVector, FeatureEncoder, Vocabulary};
pub use predictors::{HeuristicPredictor, ModelArtifact, ModelHandle, ModelPredictor, ModelStatus, Predictor};
pub use service::PredictionService;
pub use aggregator::{compute_layout_totals, YieldAggregator};

#[cfg(feature = "async")]
pub use async_service::AsyncPredictionService;
