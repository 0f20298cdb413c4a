//! Feature Encoder
//!
//! Turns one crop area + layout context into the fixed-order numeric vector
//! the yield model was trained on:
//!
//! | idx | feature          | source                          |
//! |-----|------------------|---------------------------------|
//! | 0   | cropType         | vocabulary code                 |
//! | 1   | area             | width × height (m²)             |
//! | 2   | soil_ph          | layout context                  |
//! | 3   | soil_npk         | layout context                  |
//! | 4   | soil_om          | layout context                  |
//! | 5   | irrigation       | vocabulary code                 |
//! | 6   | fertilizerType   | vocabulary code                 |
//! | 7   | fertilizerMethod | vocabulary code                 |
//! | 8   | density          | plants/m²                       |

use super::vocabulary::{CategoricalField, Vocabulary};
use crate::error::PredictorError;
use crate::types::{CropAreaInput, LayoutContext, NumericInput};

pub const FEATURE_COUNT: usize = 9;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "cropType",
    "area",
    "soil_ph",
    "soil_npk",
    "soil_om",
    "irrigation",
    "fertilizerType",
    "fertilizerMethod",
    "density",
];

/// Encoded model input in `FEATURE_NAMES` order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedFeatureVector([f64; FEATURE_COUNT]);

impl EncodedFeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES.iter().position(|n| *n == name).map(|idx| self.0[idx])
    }
}

/// Encoder bound to the vocabulary of one model artifact
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    vocabulary: Vocabulary,
}

impl FeatureEncoder {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Encode one crop area
    ///
    /// Fails with `PredictorError::Encoding` when a categorical value is not in
    /// the vocabulary, or a numeric field is missing / non-numeric.
    pub fn encode(
        &self,
        crop: &CropAreaInput,
        context: &LayoutContext,
    ) -> Result<EncodedFeatureVector, PredictorError> {
        let area = crop
            .area()
            .filter(|a| a.is_finite())
            .ok_or_else(|| PredictorError::encoding("area", "width and height are required"))?;

        let crop_code = self.categorical(CategoricalField::CropType, &crop.crop_type)?;
        let irrigation_code = self.categorical(CategoricalField::Irrigation, &crop.irrigation)?;
        let fert_type_code = self.categorical(CategoricalField::FertilizerType, &crop.fertilizer_type)?;
        let fert_method_code = self.categorical(CategoricalField::FertilizerMethod, &crop.fertilizer_method)?;

        let soil_ph = numeric("soil_ph", context.soil_ph.as_ref())?;
        let soil_npk = numeric("soil_npk", context.soil_npk.as_ref())?;
        let soil_om = numeric("soil_om", context.soil_om.as_ref())?;

        let density = numeric("density", crop.density.as_ref())?;
        if density < 0.0 {
            return Err(PredictorError::encoding("density", format!("negative value {}", density)));
        }

        Ok(EncodedFeatureVector([
            crop_code,
            area,
            soil_ph,
            soil_npk,
            soil_om,
            irrigation_code,
            fert_type_code,
            fert_method_code,
            density,
        ]))
    }

    fn categorical(&self, field: CategoricalField, raw: &str) -> Result<f64, PredictorError> {
        self.vocabulary
            .code(field, raw)
            .map(|code| code as f64)
            .ok_or_else(|| PredictorError::encoding(field.name(), format!("unknown value '{}'", raw)))
    }
}

fn numeric(field: &'static str, value: Option<&NumericInput>) -> Result<f64, PredictorError> {
    let value = value.ok_or_else(|| PredictorError::encoding(field, "missing"))?;
    value
        .parse_strict()
        .ok_or_else(|| PredictorError::encoding(field, format!("not a number: {:?}", value)))
}
