//! Yield predictors
//!
//! Two strategies behind one `Predictor` capability:
//! - `ModelPredictor`: trained network loaded from a versioned artifact
//! - `HeuristicPredictor`: formula fallback, always available
//!
//! `PredictionService` picks the primary strategy once at construction and
//! uses the heuristic for any item the primary cannot serve.

pub mod heuristic;
pub mod model;
pub mod network;

pub use heuristic::HeuristicPredictor;
pub use model::{ArtifactSource, FileArtifact, ModelPredictor, ModelStatus};
pub use network::{Activation, DenseLayer, ModelArtifact, ModelHandle, Scaler};

use crate::error::PredictorError;
use crate::types::{CropAreaInput, LayoutContext, PredictionSource};

/// Produces a yield value (kg/m²) for one crop area
pub trait Predictor: Send + Sync {
    /// Label recorded on results served by this predictor
    fn source(&self) -> PredictionSource;

    /// Make the predictor usable for a batch (e.g. load the model)
    ///
    /// Called once per batch before any `predict`. An error means every item
    /// of the batch falls back.
    fn ready(&self) -> Result<(), PredictorError> {
        Ok(())
    }

    fn predict(&self, crop: &CropAreaInput, context: &LayoutContext) -> Result<f64, PredictorError>;

    /// Explicitly retry initialization after a failure
    fn reinit(&self) -> Result<(), PredictorError> {
        self.ready()
    }

    /// Artifact version when backed by a loaded model
    fn version(&self) -> Option<String> {
        None
    }
}
