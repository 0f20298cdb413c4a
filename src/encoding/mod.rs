//! Feature encoding for the model path
//!
//! - `vocabulary`: canonical casing rule + fitted label codes
//! - `feature_encoder`: crop area + soil context → 9-element feature vector

pub mod vocabulary;
pub mod feature_encoder;

pub use vocabulary::{canonicalize, CategoricalField, Vocabulary, VocabularySpec};
pub use feature_encoder::{EncodedFeatureVector, FeatureEncoder, FEATURE_COUNT, FEATURE_NAMES};
