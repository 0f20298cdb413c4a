//! Data Model
//!
//! Plain records exchanged with the request/storage layer. All of them are
//! created per call and never mutated by the prediction pipeline.
//!
//! Wire casing follows the layout editor: crop fields are camelCase
//! (`cropType`, `fertilizerMethod`, ...), soil metrics are snake_case
//! (`soil_ph`, `soil_npk`, `soil_om`).

use crate::error::ValidationError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// Identifiers and loosely-typed numbers
// ============================================================================

/// Caller-supplied crop area identifier, echoed back as `cropId`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CropId {
    Int(i64),
    Text(String),
}

impl fmt::Display for CropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropId::Int(n) => write!(f, "{}", n),
            CropId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CropId {
    fn from(n: i64) -> Self {
        CropId::Int(n)
    }
}

impl From<i32> for CropId {
    fn from(n: i32) -> Self {
        CropId::Int(i64::from(n))
    }
}

impl From<&str> for CropId {
    fn from(s: &str) -> Self {
        CropId::Text(s.to_string())
    }
}

/// Numeric form field that may arrive as a JSON number or as text
/// (form inputs are frequently posted as `"0.5"` or `""`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    /// Whole value must be a finite number (surrounding whitespace allowed)
    pub fn parse_strict(&self) -> Option<f64> {
        match self {
            NumericInput::Number(n) => Some(*n).filter(|n| n.is_finite()),
            NumericInput::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Longest leading numeric prefix, the way a browser's `parseFloat` reads
    /// `"0.75 plants"` as 0.75
    pub fn parse_lenient(&self) -> Option<f64> {
        match self {
            NumericInput::Number(n) => Some(*n).filter(|n| n.is_finite()),
            NumericInput::Text(s) => {
                let s = s.trim_start();
                let len = numeric_prefix_len(s);
                if len == 0 {
                    return None;
                }
                s[..len].parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }
}

impl From<f64> for NumericInput {
    fn from(n: f64) -> Self {
        NumericInput::Number(n)
    }
}

impl From<&str> for NumericInput {
    fn from(s: &str) -> Self {
        NumericInput::Text(s.to_string())
    }
}

/// Byte length of `[+-]? digits [. digits] [(e|E) [+-]? digits]`, 0 if no mantissa digit
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        mantissa_digits += j - frac_start;
        if mantissa_digits > 0 {
            i = j;
        }
    }

    if mantissa_digits == 0 {
        return 0;
    }

    // Exponent only counts when followed by at least one digit
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    i
}

// ============================================================================
// Inputs
// ============================================================================

/// Categorical field that the editor may post as `null`; read as empty
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One rectangular crop area as drawn in the layout editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CropAreaInput {
    pub id: Option<CropId>,
    #[serde(deserialize_with = "null_as_empty")]
    pub crop_type: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Position inside the farm layout (informational only)
    pub x: Option<f64>,
    pub y: Option<f64>,
    #[serde(deserialize_with = "null_as_empty")]
    pub irrigation: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub fertilizer_type: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub fertilizer_method: String,
    /// Plants per m²
    pub density: Option<NumericInput>,
    /// Set by a previous predict-batch call, consumed by layout totals
    #[serde(alias = "yieldPrediction", skip_serializing_if = "Option::is_none")]
    pub predicted_yield: Option<f64>,
}

impl CropAreaInput {
    pub fn new(id: impl Into<CropId>, crop_type: &str, width: f64, height: f64) -> Self {
        Self {
            id: Some(id.into()),
            crop_type: crop_type.to_string(),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    pub fn with_practices(mut self, irrigation: &str, fertilizer_type: &str, fertilizer_method: &str) -> Self {
        self.irrigation = irrigation.to_string();
        self.fertilizer_type = fertilizer_type.to_string();
        self.fertilizer_method = fertilizer_method.to_string();
        self
    }

    pub fn with_density(mut self, density: impl Into<NumericInput>) -> Self {
        self.density = Some(density.into());
        self
    }

    pub fn with_predicted_yield(mut self, value: f64) -> Self {
        self.predicted_yield = Some(value);
        self
    }

    /// Derived area (m²), `None` when either side is missing
    pub fn area(&self) -> Option<f64> {
        Some(self.width? * self.height?)
    }

    /// Check geometry and return `(width, height)`
    ///
    /// `index` is the item's position in the batch, reported back on failure.
    pub fn dimensions(&self, index: usize) -> Result<(f64, f64), ValidationError> {
        let width = self.checked_side("width", self.width, index)?;
        let height = self.checked_side("height", self.height, index)?;
        Ok((width, height))
    }

    fn checked_side(&self, field: &'static str, side: Option<f64>, index: usize) -> Result<f64, ValidationError> {
        let crop_id = || self.id.clone();
        let value = side.ok_or_else(|| ValidationError::MissingDimension {
            index,
            crop_id: crop_id(),
            field,
        })?;
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteDimension {
                index,
                crop_id: crop_id(),
                field,
            });
        }
        if value <= 0.0 {
            return Err(ValidationError::NonPositiveDimension {
                index,
                crop_id: crop_id(),
                field,
                value,
            });
        }
        Ok(value)
    }
}

/// Farm-level soil metrics shared by every crop area of one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutContext {
    pub soil_ph: Option<NumericInput>,
    pub soil_npk: Option<NumericInput>,
    /// Organic matter, %
    pub soil_om: Option<NumericInput>,
}

impl LayoutContext {
    pub fn new(soil_ph: f64, soil_npk: f64, soil_om: f64) -> Self {
        Self {
            soil_ph: Some(soil_ph.into()),
            soil_npk: Some(soil_npk.into()),
            soil_om: Some(soil_om.into()),
        }
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Which strategy produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Model,
    Heuristic,
}

/// Predicted yield for one crop area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub crop_id: Option<CropId>,
    /// kg/m², finite and non-negative
    pub value: f64,
    pub source: PredictionSource,
    /// Model-path error kind when the heuristic stood in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Ordered 1:1 with the submitted crop areas
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchPredictionResult {
    pub predictions: Vec<PredictionResult>,
    /// Version of the artifact that served the batch, if any item used it
    pub model_version: Option<String>,
}

impl BatchPredictionResult {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.predictions.iter().map(|p| p.value).collect()
    }

    pub fn count_by_source(&self, source: PredictionSource) -> usize {
        self.predictions.iter().filter(|p| p.source == source).count()
    }
}

/// Layout summary fields stored alongside a saved layout
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTotals {
    /// m²
    pub total_area: f64,
    /// Σ per-area yield (kg/m²)
    pub total_yield: f64,
}

// ============================================================================
// Boundary records (predict-batch / compute-layout-totals)
// ============================================================================

/// predict-batch request
///
/// Soil metrics are accepted either nested under `layoutContext` or inline at
/// the top level of the body (as the layout editor posts them). Unknown keys
/// such as `name` or `dimensions` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictBatchRequest {
    #[serde(default, rename = "layoutContext")]
    pub layout_context: Option<LayoutContext>,
    #[serde(flatten)]
    pub inline_context: LayoutContext,
    #[serde(default)]
    pub crops: Vec<CropAreaInput>,
}

impl PredictBatchRequest {
    pub fn context(&self) -> &LayoutContext {
        self.layout_context.as_ref().unwrap_or(&self.inline_context)
    }
}

/// predict-batch response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictBatchResponse {
    pub predicted_yields: Vec<PredictionResult>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub totals: Option<LayoutTotals>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_parse_reads_numeric_prefix() {
        assert_eq!(NumericInput::from("0.75 plants").parse_lenient(), Some(0.75));
        assert_eq!(NumericInput::from("  3").parse_lenient(), Some(3.0));
        assert_eq!(NumericInput::from(".5").parse_lenient(), Some(0.5));
        assert_eq!(NumericInput::from("2e3x").parse_lenient(), Some(2000.0));
        assert_eq!(NumericInput::from("2e").parse_lenient(), Some(2.0));
        assert_eq!(NumericInput::from("").parse_lenient(), None);
        assert_eq!(NumericInput::from("abc").parse_lenient(), None);
        assert_eq!(NumericInput::from("-.").parse_lenient(), None);
    }

    #[test]
    fn test_strict_parse_rejects_trailing_text() {
        assert_eq!(NumericInput::from(" 6.5 ").parse_strict(), Some(6.5));
        assert_eq!(NumericInput::from("0.75 plants").parse_strict(), None);
        assert_eq!(NumericInput::from("NaN").parse_strict(), None);
        assert_eq!(NumericInput::Number(f64::INFINITY).parse_strict(), None);
    }

    #[test]
    fn test_dimensions_validation() {
        let ok = CropAreaInput::new(1, "Corn", 10.0, 4.0);
        assert_eq!(ok.dimensions(0), Ok((10.0, 4.0)));
        assert_eq!(ok.area(), Some(40.0));

        let zero = CropAreaInput::new(2, "Corn", 0.0, 4.0);
        assert!(matches!(
            zero.dimensions(3),
            Err(ValidationError::NonPositiveDimension { index: 3, field: "width", .. })
        ));

        let mut missing = CropAreaInput::new("a", "Corn", 1.0, 1.0);
        missing.height = None;
        assert!(matches!(
            missing.dimensions(0),
            Err(ValidationError::MissingDimension { field: "height", .. })
        ));
        assert_eq!(missing.area(), None);
    }

    #[test]
    fn test_request_accepts_inline_and_nested_context() {
        let inline: PredictBatchRequest = serde_json::from_str(
            r#"{
                "name": "north field",
                "soil_ph": 6.5, "soil_npk": "12", "soil_om": 3,
                "crops": [{"id": 17, "cropType": "Corn", "width": 10, "height": 5,
                           "irrigation": "drip", "fertilizerType": "nitrogen",
                           "fertilizerMethod": "broadcasting", "density": "0.5"}]
            }"#,
        )
        .unwrap();
        assert_eq!(inline.context().soil_ph, Some(NumericInput::Number(6.5)));
        assert_eq!(inline.context().soil_npk, Some(NumericInput::from("12")));
        assert_eq!(inline.crops.len(), 1);
        assert_eq!(inline.crops[0].id, Some(CropId::Int(17)));
        assert_eq!(inline.crops[0].fertilizer_type, "nitrogen");

        let nested: PredictBatchRequest = serde_json::from_str(
            r#"{"layoutContext": {"soil_ph": 7.0}, "crops": []}"#,
        )
        .unwrap();
        assert_eq!(nested.context().soil_ph, Some(NumericInput::Number(7.0)));
        assert!(nested.crops.is_empty());
    }

    #[test]
    fn test_null_categoricals_read_as_empty() {
        let request: PredictBatchRequest = serde_json::from_str(
            r#"{
                "soil_ph": 6.5,
                "crops": [{"id": 4, "cropType": null, "width": 2, "height": 2,
                           "irrigation": null, "fertilizerType": null,
                           "fertilizerMethod": null, "density": 1}]
            }"#,
        )
        .unwrap();
        let crop = &request.crops[0];
        assert_eq!(crop.crop_type, "");
        assert_eq!(crop.irrigation, "");
        assert_eq!(crop.fertilizer_type, "");
        assert_eq!(crop.fertilizer_method, "");
        assert_eq!(crop.dimensions(0), Ok((2.0, 2.0)));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = PredictionResult {
            crop_id: Some(CropId::from("plot-a")),
            value: 2.0,
            source: PredictionSource::Heuristic,
            fallback_reason: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["cropId"], "plot-a");
        assert_eq!(json["source"], "heuristic");
        assert!(json.get("fallbackReason").is_none());
    }
}
