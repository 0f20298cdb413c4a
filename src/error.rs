//! Error kinds for yield prediction
//!
//! Two families:
//! - `PredictorError`: recoverable inside a batch (the item is re-served by the heuristic)
//! - `ValidationError`: structurally invalid geometry, rejects the whole batch
//! - `VocabularyError`: malformed vocabulary in a model artifact

use crate::types::CropId;
use std::time::Duration;
use thiserror::Error;

/// Failure of the model path for one crop area (or for the whole batch when
/// the model cannot be loaded at all)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictorError {
    #[error("Encoding failed for field '{field}': {reason}")]
    Encoding { field: &'static str, reason: String },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Prediction(String),

    #[error("Prediction exceeded time budget of {0:?}")]
    Timeout(Duration),
}

impl PredictorError {
    pub(crate) fn encoding(field: &'static str, reason: impl Into<String>) -> Self {
        PredictorError::Encoding {
            field,
            reason: reason.into(),
        }
    }

    /// Short machine-friendly tag used in logs and `fallbackReason`
    pub fn kind(&self) -> &'static str {
        match self {
            PredictorError::Encoding { .. } => "encoding",
            PredictorError::ModelUnavailable(_) => "model_unavailable",
            PredictorError::Prediction(_) => "prediction",
            PredictorError::Timeout(_) => "timeout",
        }
    }
}

/// Invalid crop-area geometry. Never recovered by fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Crop area #{index} (id {crop_id:?}) is missing '{field}'")]
    MissingDimension {
        index: usize,
        crop_id: Option<CropId>,
        field: &'static str,
    },

    #[error("Crop area #{index} (id {crop_id:?}) has non-positive {field}: {value}")]
    NonPositiveDimension {
        index: usize,
        crop_id: Option<CropId>,
        field: &'static str,
        value: f64,
    },

    #[error("Crop area #{index} (id {crop_id:?}) has non-finite {field}")]
    NonFiniteDimension {
        index: usize,
        crop_id: Option<CropId>,
        field: &'static str,
    },
}

impl ValidationError {
    /// Position of the offending crop area in the submitted batch
    pub fn index(&self) -> usize {
        match self {
            ValidationError::MissingDimension { index, .. }
            | ValidationError::NonPositiveDimension { index, .. }
            | ValidationError::NonFiniteDimension { index, .. } => *index,
        }
    }
}

/// Vocabulary list rejected while loading a model artifact
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("vocabulary for '{field}' is empty")]
    Empty { field: &'static str },

    #[error("vocabulary entry '{label}' for '{field}' is not canonical (expected '{canonical}')")]
    NotCanonical {
        field: &'static str,
        label: String,
        canonical: String,
    },

    #[error("duplicate vocabulary entry '{label}' for '{field}'")]
    Duplicate { field: &'static str, label: String },
}
