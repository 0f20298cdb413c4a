//! Heuristic Yield Predictor
//!
//! Deterministic fallback that needs no trained model:
//!
//! ```text
//! yield = baseline[cropType] × irrigation × fertilizer × (1 + density × 0.5)
//! ```
//!
//! Baselines (kg/m²): Corn 2.5, Tomatoes 2.2, Potatoes 2.8, Wheat 2.1,
//! Rice 1.9, anything else 2.0. Categorical values go through the same
//! canonical casing rule as the model vocabulary, so `"drip"` and `"Drip"`
//! are the same practice. Matching is deliberately not exact: the layout
//! editor's in-browser estimate only recognizes the lowercase spellings
//! (`"drip"`, `"nitrogen"`, ...), so the two can differ for other casings.

use super::Predictor;
use crate::encoding::canonicalize;
use crate::error::PredictorError;
use crate::types::{CropAreaInput, LayoutContext, PredictionSource};

pub const DEFAULT_BASELINE_YIELD: f64 = 2.0;

/// Density assumed when the field is missing, unparsable or negative
pub const DEFAULT_DENSITY: f64 = 0.5;

/// Yield gained per plant/m²
pub const DENSITY_FACTOR: f64 = 0.5;

/// Baseline yield (kg/m²) for a crop type, `None` for unlisted crops
pub fn baseline_yield(crop_type: &str) -> Option<f64> {
    match canonicalize(crop_type).as_str() {
        "Corn" => Some(2.5),
        "Tomatoes" => Some(2.2),
        "Potatoes" => Some(2.8),
        "Wheat" => Some(2.1),
        "Rice" => Some(1.9),
        _ => None,
    }
}

pub fn irrigation_multiplier(irrigation: &str) -> f64 {
    match canonicalize(irrigation).as_str() {
        "Drip" => 1.10,
        "Sprinkler" => 1.05,
        _ => 1.0,
    }
}

pub fn fertilizer_multiplier(fertilizer_type: &str) -> f64 {
    match canonicalize(fertilizer_type).as_str() {
        "Nitrogen" => 1.08,
        "Phosphorus" => 1.06,
        _ => 1.0,
    }
}

pub fn density_multiplier(density: f64) -> f64 {
    1.0 + density * DENSITY_FACTOR
}

/// Formula-based estimator; stateless
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPredictor;

impl HeuristicPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Estimate yield (kg/m²). Total: never fails, always finite and ≥ 0.
    pub fn estimate(&self, crop: &CropAreaInput) -> f64 {
        let base = baseline_yield(&crop.crop_type).unwrap_or(DEFAULT_BASELINE_YIELD);
        let irrigation = irrigation_multiplier(&crop.irrigation);
        let fertilizer = fertilizer_multiplier(&crop.fertilizer_type);

        let density = crop
            .density
            .as_ref()
            .and_then(|d| d.parse_lenient())
            .filter(|d| *d >= 0.0)
            .unwrap_or(DEFAULT_DENSITY);

        let value = base * irrigation * fertilizer * density_multiplier(density);
        if value.is_finite() {
            value
        } else {
            // Absurd densities overflow; score them as an unspecified density
            base * irrigation * fertilizer * density_multiplier(DEFAULT_DENSITY)
        }
    }
}

impl Predictor for HeuristicPredictor {
    fn source(&self) -> PredictionSource {
        PredictionSource::Heuristic
    }

    fn predict(&self, crop: &CropAreaInput, _context: &LayoutContext) -> Result<f64, PredictorError> {
        Ok(self.estimate(crop))
    }
}
