//! Categorical Vocabulary
//!
//! Fitted label vocabularies for the four categorical crop attributes.
//! Shipped inside the model artifact so that inference always uses the same
//! codes the model was trained on.
//!
//! **Canonicalization rule** (compatibility contract with the training data):
//!   1. trim surrounding whitespace
//!   2. uppercase the first character
//!   3. lowercase the rest
//!
//! `" drip"` → `"Drip"`, `"SIDE-DRESSING"` → `"Side-dressing"`.
//! Vocabulary entries must already be in canonical form.

use crate::error::VocabularyError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Apply the canonical casing rule to a categorical value
pub fn canonicalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Categorical fields of a crop area, in feature-vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalField {
    CropType,
    Irrigation,
    FertilizerType,
    FertilizerMethod,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 4] = [
        CategoricalField::CropType,
        CategoricalField::Irrigation,
        CategoricalField::FertilizerType,
        CategoricalField::FertilizerMethod,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CategoricalField::CropType => "cropType",
            CategoricalField::Irrigation => "irrigation",
            CategoricalField::FertilizerType => "fertilizerType",
            CategoricalField::FertilizerMethod => "fertilizerMethod",
        }
    }
}

/// Serialized vocabulary lists (artifact form)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularySpec {
    pub crop_type: Vec<String>,
    pub irrigation: Vec<String>,
    pub fertilizer_type: Vec<String>,
    pub fertilizer_method: Vec<String>,
}

/// Code lookup for one categorical field
#[derive(Debug, Clone, Default)]
struct LabelCodes {
    codes: FxHashMap<String, usize>,
}

impl LabelCodes {
    fn build(field: CategoricalField, labels: &[String]) -> Result<Self, VocabularyError> {
        if labels.is_empty() {
            return Err(VocabularyError::Empty { field: field.name() });
        }

        let mut codes = FxHashMap::default();
        for (code, label) in labels.iter().enumerate() {
            let canonical = canonicalize(label);
            if canonical != *label {
                return Err(VocabularyError::NotCanonical {
                    field: field.name(),
                    label: label.clone(),
                    canonical,
                });
            }
            if codes.insert(canonical, code).is_some() {
                return Err(VocabularyError::Duplicate {
                    field: field.name(),
                    label: label.clone(),
                });
            }
        }

        Ok(Self { codes })
    }
}

/// Validated vocabulary: canonical label → zero-based code
#[derive(Debug, Clone)]
pub struct Vocabulary {
    crop_type: LabelCodes,
    irrigation: LabelCodes,
    fertilizer_type: LabelCodes,
    fertilizer_method: LabelCodes,
}

impl Vocabulary {
    /// Build lookups, rejecting empty, duplicate or non-canonical entries
    pub fn from_spec(spec: &VocabularySpec) -> Result<Self, VocabularyError> {
        Ok(Self {
            crop_type: LabelCodes::build(CategoricalField::CropType, &spec.crop_type)?,
            irrigation: LabelCodes::build(CategoricalField::Irrigation, &spec.irrigation)?,
            fertilizer_type: LabelCodes::build(CategoricalField::FertilizerType, &spec.fertilizer_type)?,
            fertilizer_method: LabelCodes::build(CategoricalField::FertilizerMethod, &spec.fertilizer_method)?,
        })
    }

    fn labels(&self, field: CategoricalField) -> &LabelCodes {
        match field {
            CategoricalField::CropType => &self.crop_type,
            CategoricalField::Irrigation => &self.irrigation,
            CategoricalField::FertilizerType => &self.fertilizer_type,
            CategoricalField::FertilizerMethod => &self.fertilizer_method,
        }
    }

    /// Canonicalize `raw` and look up its code
    pub fn code(&self, field: CategoricalField, raw: &str) -> Option<usize> {
        self.labels(field).codes.get(&canonicalize(raw)).copied()
    }

    pub fn size(&self, field: CategoricalField) -> usize {
        self.labels(field).codes.len()
    }
}
