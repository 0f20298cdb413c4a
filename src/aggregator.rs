//! Yield Aggregator
//!
//! Pure reductions from per-area values to the layout summary fields
//! (`totalArea`, `totalYield`) stored with a saved layout.

use crate::error::ValidationError;
use crate::types::{CropAreaInput, CropId, LayoutTotals, PredictionResult};
use rustc_hash::FxHashMap;

pub struct YieldAggregator;

impl YieldAggregator {
    /// Sum areas of `inputs` and the yields matched to them
    ///
    /// `results[idx]` pairs with `inputs[idx]` when their ids agree (always
    /// the case for output of `predict_batch`). Otherwise an input with an
    /// id takes the first result carrying that id, and an input without one
    /// pairs by position. Inputs without a matching result count 0 yield;
    /// missing geometry counts 0 area.
    pub fn aggregate(inputs: &[CropAreaInput], results: &[PredictionResult]) -> LayoutTotals {
        let mut first_by_id: FxHashMap<&CropId, f64> = FxHashMap::default();
        for result in results {
            if let Some(id) = &result.crop_id {
                first_by_id.entry(id).or_insert(result.value);
            }
        }

        inputs
            .iter()
            .enumerate()
            .fold(LayoutTotals::default(), |mut totals, (idx, crop)| {
                totals.total_area += crop.area().unwrap_or(0.0);

                let aligned = results.get(idx).filter(|r| r.crop_id == crop.id);
                let value = match (aligned, &crop.id) {
                    (Some(result), _) => Some(result.value),
                    (None, Some(id)) => first_by_id.get(id).copied(),
                    (None, None) => results.get(idx).map(|r| r.value),
                };
                totals.total_yield += value.unwrap_or(0.0);
                totals
            })
    }

    /// Totals from crop areas already annotated with `predictedYield`
    pub fn from_annotated(crops: &[CropAreaInput]) -> LayoutTotals {
        crops.iter().fold(LayoutTotals::default(), |mut totals, crop| {
            totals.total_area += crop.area().unwrap_or(0.0);
            totals.total_yield += crop.predicted_yield.filter(|v| v.is_finite()).unwrap_or(0.0);
            totals
        })
    }
}

/// compute-layout-totals: validate geometry, then reduce
pub fn compute_layout_totals(crops: &[CropAreaInput]) -> Result<LayoutTotals, ValidationError> {
    for (idx, crop) in crops.iter().enumerate() {
        crop.dimensions(idx)?;
    }
    Ok(YieldAggregator::from_annotated(crops))
}
