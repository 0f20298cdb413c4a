//! Model Predictor
//!
//! Wraps the trained yield network. The artifact is loaded lazily and at most
//! once per predictor:
//!
//! ```text
//! Uninitialized ──load_model()──▶ Loading ──┬──▶ Ready(handle)
//!                                           └──▶ Failed(reason)
//! ```
//!
//! `Failed` behaves like "no model" until `reinit()` is called; `predict`
//! never retries a failed load on its own. The ready handle is shared
//! read-only (`Arc`) by every concurrent prediction.

use super::network::{ModelArtifact, ModelHandle};
use super::Predictor;
use crate::encoding::EncodedFeatureVector;
use crate::error::PredictorError;
use crate::types::{CropAreaInput, LayoutContext, PredictionSource};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::time::Instant;

// ============================================================================
// Artifact sources
// ============================================================================

/// Where a model artifact comes from
pub trait ArtifactSource: Send + Sync + fmt::Debug {
    /// Human-readable location for logs
    fn describe(&self) -> String;

    /// Fetch the artifact (may block on I/O)
    fn fetch(&self) -> Result<ModelArtifact, PredictorError>;
}

/// JSON artifact on disk
#[derive(Debug, Clone)]
pub struct FileArtifact {
    path: PathBuf,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactSource for FileArtifact {
    fn describe(&self) -> String {
        format!("{:?}", self.path)
    }

    fn fetch(&self) -> Result<ModelArtifact, PredictorError> {
        if !self.path.exists() {
            return Err(PredictorError::ModelUnavailable(format!(
                "no model artifact at {:?}",
                self.path
            )));
        }
        ModelArtifact::load(&self.path).map_err(|e| PredictorError::ModelUnavailable(format!("{:#}", e)))
    }
}

/// Artifact already in memory
impl ArtifactSource for ModelArtifact {
    fn describe(&self) -> String {
        format!("in-memory artifact '{}'", self.version)
    }

    fn fetch(&self) -> Result<ModelArtifact, PredictorError> {
        Ok(self.clone())
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

enum LoadState {
    Uninitialized,
    Ready(Arc<ModelHandle>),
    Failed(String),
}

/// Observable lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Uninitialized,
    Loading,
    Ready { version: String },
    Failed { reason: String },
}

pub struct ModelPredictor {
    source: Box<dyn ArtifactSource>,
    expected_version: Option<String>,
    state: RwLock<LoadState>,
}

impl fmt::Debug for ModelPredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPredictor")
            .field("source", &self.source.describe())
            .field("expected_version", &self.expected_version)
            .field("status", &self.status())
            .finish()
    }
}

impl ModelPredictor {
    pub fn new(source: Box<dyn ArtifactSource>, expected_version: Option<String>) -> Self {
        Self {
            source,
            expected_version,
            state: RwLock::new(LoadState::Uninitialized),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>, expected_version: Option<String>) -> Self {
        Self::new(Box::new(FileArtifact::new(path)), expected_version)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self::new(Box::new(artifact), None)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LoadState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LoadState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn settled(state: &LoadState) -> Option<Result<Arc<ModelHandle>, PredictorError>> {
        match state {
            LoadState::Ready(handle) => Some(Ok(Arc::clone(handle))),
            LoadState::Failed(reason) => Some(Err(PredictorError::ModelUnavailable(reason.clone()))),
            LoadState::Uninitialized => None,
        }
    }

    pub fn status(&self) -> ModelStatus {
        let state = match self.state.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return ModelStatus::Loading,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        match &*state {
            LoadState::Uninitialized => ModelStatus::Uninitialized,
            LoadState::Ready(handle) => ModelStatus::Ready {
                version: handle.version().to_string(),
            },
            LoadState::Failed(reason) => ModelStatus::Failed {
                reason: reason.clone(),
            },
        }
    }

    /// Return the cached handle, loading the artifact on first use
    pub fn load_model(&self) -> Result<Arc<ModelHandle>, PredictorError> {
        if let Some(settled) = Self::settled(&self.read_state()) {
            return settled;
        }

        let mut state = self.write_state();
        // Another caller may have finished loading while we waited
        if let Some(settled) = Self::settled(&state) {
            return settled;
        }

        let started = Instant::now();
        tracing::info!("Loading yield model from {}...", self.source.describe());

        let outcome = self.fetch_handle();
        match &outcome {
            Ok(handle) => {
                tracing::info!(
                    "Yield model '{}' ready in {:?} (layers: {:?})",
                    handle.version(),
                    started.elapsed(),
                    handle.layer_shapes()
                );
                *state = LoadState::Ready(Arc::clone(handle));
            }
            Err(e) => {
                tracing::warn!("Yield model unavailable - heuristic predictions only: {}", e);
                let reason = match e {
                    PredictorError::ModelUnavailable(reason) => reason.clone(),
                    other => other.to_string(),
                };
                *state = LoadState::Failed(reason);
            }
        }
        outcome
    }

    fn fetch_handle(&self) -> Result<Arc<ModelHandle>, PredictorError> {
        let artifact = self.source.fetch()?;

        if let Some(expected) = &self.expected_version {
            if artifact.version != *expected {
                return Err(PredictorError::ModelUnavailable(format!(
                    "artifact version '{}' does not match expected '{}'",
                    artifact.version, expected
                )));
            }
        }

        artifact.into_handle().map(Arc::new)
    }

    /// Drop any cached handle or failure and load again
    pub fn reinit_model(&self) -> Result<Arc<ModelHandle>, PredictorError> {
        *self.write_state() = LoadState::Uninitialized;
        self.load_model()
    }

    /// Run inference on an encoded vector
    pub fn predict_encoded(&self, features: &EncodedFeatureVector) -> Result<f64, PredictorError> {
        self.load_model()?.infer(features.as_slice())
    }
}

impl Predictor for ModelPredictor {
    fn source(&self) -> PredictionSource {
        PredictionSource::Model
    }

    fn ready(&self) -> Result<(), PredictorError> {
        self.load_model().map(|_| ())
    }

    fn predict(&self, crop: &CropAreaInput, context: &LayoutContext) -> Result<f64, PredictorError> {
        let handle = self.load_model()?;
        let features = handle.encoder().encode(crop, context)?;
        handle.infer(features.as_slice())
    }

    fn reinit(&self) -> Result<(), PredictorError> {
        self.reinit_model().map(|_| ())
    }

    fn version(&self) -> Option<String> {
        match self.status() {
            ModelStatus::Ready { version } => Some(version),
            _ => None,
        }
    }
}
