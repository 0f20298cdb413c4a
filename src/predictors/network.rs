//! Model Artifact
//!
//! JSON artifact produced by the training pipeline. It carries everything the
//! inference side needs to stay compatible with training:
//!   - `version`: pinned by deployments (`expected_model_version`)
//!   - `vocabulary`: categorical codes used when the training data was encoded
//!   - `scaler`: optional per-feature standardization `(x - mean) / scale`
//!   - `layers`: dense feed-forward network, 9 inputs → 1 output
//!
//! Shape and vocabulary checks run once at load time, so inference only has
//! to guard against bad input vectors and non-finite outputs.

use crate::encoding::{FeatureEncoder, Vocabulary, VocabularySpec, FEATURE_COUNT};
use crate::error::PredictorError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fs;
use std::path::Path;

/// Activation buffer; hidden layers of yield models are small
type Activations = SmallVec<[f64; 32]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    #[default]
    Linear,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
        }
    }
}

/// Fully connected layer: `weights[out][in]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn input_dim(&self) -> usize {
        self.weights.first().map_or(0, |row| row.len())
    }

    pub fn output_dim(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Activations {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b;
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Per-feature standardization fitted on the training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Serialized artifact (file form)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub vocabulary: VocabularySpec,
    #[serde(default)]
    pub scaler: Option<Scaler>,
    pub layers: Vec<DenseLayer>,
}

impl ModelArtifact {
    /// Read an artifact from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact: {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse model artifact JSON: {:?}", path))
    }

    /// Check shapes / vocabulary and build the ready-to-use handle
    pub fn into_handle(self) -> Result<ModelHandle, PredictorError> {
        let invalid = |reason: String| {
            PredictorError::ModelUnavailable(format!("artifact '{}' is invalid: {}", self.version, reason))
        };

        let vocabulary = Vocabulary::from_spec(&self.vocabulary).map_err(|e| invalid(e.to_string()))?;

        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != FEATURE_COUNT || scaler.scale.len() != FEATURE_COUNT {
                return Err(invalid(format!(
                    "scaler has {}/{} entries, expected {}",
                    scaler.mean.len(),
                    scaler.scale.len(),
                    FEATURE_COUNT
                )));
            }
            if scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                return Err(invalid("scaler contains a zero or non-finite scale".to_string()));
            }
        }

        if self.layers.is_empty() {
            return Err(invalid("no layers".to_string()));
        }

        let mut expected_inputs = FEATURE_COUNT;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.output_dim() == 0 || layer.bias.len() != layer.output_dim() {
                return Err(invalid(format!(
                    "layer {} has {} rows but {} biases",
                    idx,
                    layer.output_dim(),
                    layer.bias.len()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != expected_inputs) {
                return Err(invalid(format!(
                    "layer {} expects inputs of width {}",
                    idx, expected_inputs
                )));
            }
            expected_inputs = layer.output_dim();
        }
        if expected_inputs != 1 {
            return Err(invalid(format!("network outputs {} values, expected 1", expected_inputs)));
        }

        Ok(ModelHandle {
            encoder: FeatureEncoder::new(vocabulary),
            artifact: self,
        })
    }
}

/// Loaded, validated model. Shared read-only once created.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    artifact: ModelArtifact,
    encoder: FeatureEncoder,
}

impl ModelHandle {
    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    /// Encoder bound to this artifact's vocabulary
    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn layer_shapes(&self) -> Vec<(usize, usize)> {
        self.artifact
            .layers
            .iter()
            .map(|l| (l.input_dim(), l.output_dim()))
            .collect()
    }

    /// Forward pass over a raw feature slice
    ///
    /// Wrong-length or non-finite input and non-finite output are
    /// `PredictorError::Prediction`; negative output is clamped to 0.
    pub fn infer(&self, features: &[f64]) -> Result<f64, PredictorError> {
        if features.len() != FEATURE_COUNT {
            return Err(PredictorError::Prediction(format!(
                "expected {} features, got {}",
                FEATURE_COUNT,
                features.len()
            )));
        }
        if features.iter().any(|x| !x.is_finite()) {
            return Err(PredictorError::Prediction("feature vector contains non-finite values".to_string()));
        }

        let mut activations: Activations = match &self.artifact.scaler {
            Some(scaler) => features
                .iter()
                .zip(scaler.mean.iter().zip(&scaler.scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            None => features.iter().copied().collect(),
        };

        for layer in &self.artifact.layers {
            activations = layer.forward(&activations);
        }

        let output = activations
            .first()
            .copied()
            .ok_or_else(|| PredictorError::Prediction("network produced no output".to_string()))?;

        if !output.is_finite() {
            return Err(PredictorError::Prediction(format!("non-finite model output {}", output)));
        }
        Ok(output.max(0.0))
    }
}
