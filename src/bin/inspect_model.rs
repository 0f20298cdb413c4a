//! Inspect Model - load and validate a yield model artifact
//!
//! Usage: cargo run --bin inspect_model -- path/to/model.json

use anyhow::{Context, Result};
use crop_yield_rust::encoding::{CategoricalField, FEATURE_NAMES};
use crop_yield_rust::ModelArtifact;
use std::path::PathBuf;

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: inspect_model <artifact.json>")?;

    println!("\n=== MODEL ARTIFACT: {:?} ===\n", path);

    let artifact = ModelArtifact::load(&path)?;
    let has_scaler = artifact.scaler.is_some();
    let handle = artifact.into_handle()?;

    println!("Version: {}", handle.version());
    println!("Features ({}): {}", FEATURE_NAMES.len(), FEATURE_NAMES.join(", "));
    println!("Standardized inputs: {}", if has_scaler { "yes" } else { "no" });

    println!("\nVocabulary:");
    for field in CategoricalField::ALL {
        println!("  {:<18} {} labels", field.name(), handle.encoder().vocabulary().size(field));
    }

    println!("\nLayers:");
    for (idx, (inputs, outputs)) in handle.layer_shapes().iter().enumerate() {
        println!("  [{}] {} → {}", idx, inputs, outputs);
    }
    println!();

    Ok(())
}
