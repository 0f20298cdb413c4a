//! Prediction Service - main coordinator for batch yield prediction
//!
//! Batch flow:
//!   1. Validate geometry of every crop area (reject the batch on failure)
//!   2. Prepare the primary predictor once (model load is cached)
//!   3. Evaluate each crop area independently (sequential or Rayon)
//!   4. Fold each item's `Result` into a `PredictionResult`, using the
//!      heuristic for any item whose primary attempt failed
//!
//! Model-path errors never leave this module; the only error a caller can
//! see is `ValidationError`.

use crate::aggregator::YieldAggregator;
use crate::config::{PredictionMode, ServiceConfig};
use crate::error::{PredictorError, ValidationError};
use crate::predictors::{HeuristicPredictor, ModelPredictor, ModelStatus, Predictor};
use crate::types::{
    BatchPredictionResult, CropAreaInput, LayoutContext, PredictBatchRequest, PredictBatchResponse,
    PredictionResult, PredictionSource,
};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time budgets applied while evaluating one batch
#[derive(Debug, Clone, Copy)]
struct Budget {
    item_timeout: Option<Duration>,
    batch_timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl Budget {
    fn start(config: &ServiceConfig) -> Self {
        let batch_timeout = config.batch_timeout();
        Self {
            item_timeout: config.item_timeout(),
            batch_timeout,
            deadline: batch_timeout.map(|t| Instant::now() + t),
        }
    }
}

pub struct PredictionService {
    primary: Option<Arc<dyn Predictor>>,
    model: Option<Arc<ModelPredictor>>,
    fallback: HeuristicPredictor,
    config: ServiceConfig,
}

impl PredictionService {
    /// Build the service, choosing the primary strategy from `config`
    ///
    /// The model path is selected only when the mode allows it and an
    /// artifact exists at `model_path`; the artifact itself is loaded on
    /// first use (or by `warm_up`).
    pub fn new(config: ServiceConfig) -> Self {
        let model = match (&config.mode, &config.model_path) {
            (PredictionMode::Heuristic, _) => {
                tracing::info!("Prediction mode: heuristic only");
                None
            }
            (PredictionMode::Auto, Some(path)) if path.exists() => {
                tracing::info!("Prediction mode: model ({:?}), heuristic fallback", path);
                Some(Arc::new(ModelPredictor::from_file(
                    path.clone(),
                    config.expected_model_version.clone(),
                )))
            }
            (PredictionMode::Auto, Some(path)) => {
                tracing::warn!("Model artifact not found at {:?} - using heuristic predictor", path);
                None
            }
            (PredictionMode::Auto, None) => {
                tracing::info!("No model artifact configured - using heuristic predictor");
                None
            }
        };

        Self::assemble(model, config)
    }

    /// Service configured from environment variables
    pub fn from_env() -> Self {
        Self::new(ServiceConfig::from_env())
    }

    /// Service backed by an already-constructed model predictor
    pub fn with_model(model: ModelPredictor, config: ServiceConfig) -> Self {
        let model = match config.mode {
            PredictionMode::Auto => Some(Arc::new(model)),
            PredictionMode::Heuristic => None,
        };
        Self::assemble(model, config)
    }

    /// Service with a custom primary predictor
    pub fn with_predictor(predictor: Arc<dyn Predictor>, config: ServiceConfig) -> Self {
        let primary = match config.mode {
            PredictionMode::Auto => Some(predictor),
            PredictionMode::Heuristic => None,
        };
        Self {
            primary,
            model: None,
            fallback: HeuristicPredictor::new(),
            config,
        }
    }

    pub fn heuristic_only() -> Self {
        Self::assemble(None, ServiceConfig::heuristic_only())
    }

    fn assemble(model: Option<Arc<ModelPredictor>>, config: ServiceConfig) -> Self {
        let primary = model.clone().map(|m| m as Arc<dyn Predictor>);
        Self {
            primary,
            model,
            fallback: HeuristicPredictor::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Strategy items are attempted with first
    pub fn primary_source(&self) -> PredictionSource {
        self.primary
            .as_ref()
            .map_or(PredictionSource::Heuristic, |p| p.source())
    }

    /// Lifecycle state of the owned model, if the service has one
    pub fn model_status(&self) -> Option<ModelStatus> {
        self.model.as_ref().map(|m| m.status())
    }

    /// Load the model ahead of the first batch (blocking)
    pub fn warm_up(&self) -> Result<(), PredictorError> {
        match &self.primary {
            Some(primary) => primary.ready(),
            None => Ok(()),
        }
    }

    /// Explicitly retry model initialization after a failed load
    pub fn reload_model(&self) -> Result<(), PredictorError> {
        match &self.primary {
            Some(primary) => primary.reinit(),
            None => Ok(()),
        }
    }

    /// Reject the batch if any crop area has missing or non-positive sides
    pub fn validate(crops: &[CropAreaInput]) -> Result<(), ValidationError> {
        for (idx, crop) in crops.iter().enumerate() {
            crop.dimensions(idx)?;
        }
        Ok(())
    }

    /// Predict yield for every crop area, same length and order as `crops`
    pub fn predict_batch(
        &self,
        context: &LayoutContext,
        crops: &[CropAreaInput],
    ) -> Result<BatchPredictionResult, ValidationError> {
        Self::validate(crops)?;

        let started = Instant::now();
        let budget = Budget::start(&self.config);

        // Availability is decided once per batch
        let primary = match &self.primary {
            Some(primary) => primary.ready().map(|()| primary.as_ref()),
            None => Err(PredictorError::ModelUnavailable("heuristic mode".to_string())),
        };

        let predictions: Vec<PredictionResult> = match primary {
            Ok(primary) => {
                let evaluate = |(idx, crop): (usize, &CropAreaInput)| {
                    let outcome = attempt(primary, crop, context, &budget);
                    self.fold_outcome(idx, crop, primary.source(), outcome)
                };

                if self.config.parallel && crops.len() >= self.config.parallel_threshold {
                    crops.par_iter().enumerate().map(evaluate).collect()
                } else {
                    crops.iter().enumerate().map(evaluate).collect()
                }
            }
            Err(reason) => {
                let fallback_reason = self.primary.as_ref().map(|_| reason.kind());
                self.heuristic_batch(crops, fallback_reason).predictions
            }
        };

        let result = BatchPredictionResult {
            model_version: self.model_version_used(&predictions),
            predictions,
        };

        tracing::info!(
            "Predicted {} crop areas in {:?} ({} model, {} heuristic)",
            result.len(),
            started.elapsed(),
            result.count_by_source(PredictionSource::Model),
            result.count_by_source(PredictionSource::Heuristic)
        );

        Ok(result)
    }

    /// Predictions plus layout totals in a single record
    pub fn predict_layout(
        &self,
        context: &LayoutContext,
        crops: &[CropAreaInput],
    ) -> Result<PredictBatchResponse, ValidationError> {
        let batch = self.predict_batch(context, crops)?;
        let totals = YieldAggregator::aggregate(crops, &batch.predictions);
        Ok(PredictBatchResponse {
            predicted_yields: batch.predictions,
            totals: Some(totals),
        })
    }

    /// predict-batch boundary operation
    pub fn handle_request(&self, request: &PredictBatchRequest) -> Result<PredictBatchResponse, ValidationError> {
        self.predict_layout(request.context(), &request.crops)
    }

    /// Serve every crop area with the heuristic, tagging each result with
    /// `fallback_reason` when the heuristic is standing in for the model
    pub fn heuristic_batch(&self, crops: &[CropAreaInput], fallback_reason: Option<&str>) -> BatchPredictionResult {
        let predictions = crops
            .iter()
            .map(|crop| PredictionResult {
                crop_id: crop.id.clone(),
                value: self.fallback.estimate(crop),
                source: PredictionSource::Heuristic,
                fallback_reason: fallback_reason.map(str::to_string),
            })
            .collect();

        BatchPredictionResult {
            predictions,
            model_version: None,
        }
    }

    fn fold_outcome(
        &self,
        idx: usize,
        crop: &CropAreaInput,
        source: PredictionSource,
        outcome: Result<f64, PredictorError>,
    ) -> PredictionResult {
        match outcome {
            Ok(value) => {
                tracing::debug!("Crop area #{} ({:?}): {:.4} kg/m² via {:?}", idx, crop.id, value, source);
                PredictionResult {
                    crop_id: crop.id.clone(),
                    value,
                    source,
                    fallback_reason: None,
                }
            }
            Err(e) => {
                tracing::warn!("Crop area #{} ({:?}) falling back to heuristic: {}", idx, crop.id, e);
                PredictionResult {
                    crop_id: crop.id.clone(),
                    value: self.fallback.estimate(crop),
                    source: PredictionSource::Heuristic,
                    fallback_reason: Some(e.kind().to_string()),
                }
            }
        }
    }

    fn model_version_used(&self, predictions: &[PredictionResult]) -> Option<String> {
        if predictions.iter().any(|p| p.source == PredictionSource::Model) {
            self.primary.as_ref().and_then(|p| p.version())
        } else {
            None
        }
    }
}

/// One primary-predictor attempt under the batch budget
fn attempt(
    primary: &dyn Predictor,
    crop: &CropAreaInput,
    context: &LayoutContext,
    budget: &Budget,
) -> Result<f64, PredictorError> {
    if let (Some(deadline), Some(limit)) = (budget.deadline, budget.batch_timeout) {
        if Instant::now() >= deadline {
            return Err(PredictorError::Timeout(limit));
        }
    }

    let started = Instant::now();
    let value = primary.predict(crop, context)?;

    if let Some(limit) = budget.item_timeout {
        if started.elapsed() > limit {
            return Err(PredictorError::Timeout(limit));
        }
    }

    if !value.is_finite() || value < 0.0 {
        return Err(PredictorError::Prediction(format!("out-of-range yield {}", value)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictors::network::tests::linear_artifact;
    use crate::types::CropId;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> LayoutContext {
        LayoutContext::new(6.0, 10.0, 3.0)
    }

    fn crops() -> Vec<CropAreaInput> {
        vec![
            CropAreaInput::new(1, "Corn", 10.0, 10.0)
                .with_practices("drip", "nitrogen", "broadcasting")
                .with_density("0.5"),
            CropAreaInput::new(2, "Quinoa", 5.0, 4.0)
                .with_practices("none", "none", "broadcasting")
                .with_density("1"),
            CropAreaInput::new(3, "wheat", 2.0, 3.0)
                .with_practices("sprinkler", "phosphorus", "fertigation")
                .with_density(2.0),
        ]
    }

    #[test]
    fn test_heuristic_only_batch() {
        let service = PredictionService::heuristic_only();
        let result = service.predict_batch(&context(), &crops()).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.count_by_source(PredictionSource::Heuristic), 3);
        assert_relative_eq!(result.predictions[0].value, 3.7125, epsilon = 1e-9);
        // Heuristic mode is not a fallback
        assert!(result.predictions.iter().all(|p| p.fallback_reason.is_none()));
        assert!(result.model_version.is_none());
    }

    #[test]
    fn test_per_item_fallback_keeps_model_values() {
        let service = PredictionService::with_model(
            ModelPredictor::from_artifact(linear_artifact()),
            ServiceConfig::default(),
        );
        let result = service.predict_batch(&context(), &crops()).unwrap();

        assert_eq!(result.len(), 3);
        // Corn: 1.0 + 0.01·100 + 0.1·6 + 0.5·0.5
        assert_eq!(result.predictions[0].source, PredictionSource::Model);
        assert_relative_eq!(result.predictions[0].value, 2.85, epsilon = 1e-12);

        // Quinoa is outside the vocabulary
        assert_eq!(result.predictions[1].source, PredictionSource::Heuristic);
        assert_eq!(result.predictions[1].fallback_reason.as_deref(), Some("encoding"));
        assert_relative_eq!(result.predictions[1].value, 2.0 * 1.5, epsilon = 1e-12);

        // Wheat: 1.0 + 0.06 + 0.6 + 1.0
        assert_eq!(result.predictions[2].source, PredictionSource::Model);
        assert_relative_eq!(result.predictions[2].value, 2.66, epsilon = 1e-12);

        assert_eq!(result.model_version.as_deref(), Some("test-linear-1"));
    }

    #[test]
    fn test_missing_model_serves_whole_batch_by_heuristic() {
        let service = PredictionService::with_model(
            ModelPredictor::from_file("/nonexistent/model.json", None),
            ServiceConfig::default(),
        );
        let result = service.predict_batch(&context(), &crops()).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.count_by_source(PredictionSource::Heuristic), 3);
        assert!(result
            .predictions
            .iter()
            .all(|p| p.fallback_reason.as_deref() == Some("model_unavailable")));
        assert!(matches!(service.model_status(), Some(ModelStatus::Failed { .. })));
    }

    #[test]
    fn test_new_without_artifact_is_heuristic() {
        let service = PredictionService::new(ServiceConfig::with_model("/nonexistent/model.json"));
        assert_eq!(service.primary_source(), PredictionSource::Heuristic);
        assert!(service.model_status().is_none());

        let service = PredictionService::new(ServiceConfig::default());
        assert_eq!(service.primary_source(), PredictionSource::Heuristic);
    }

    #[test]
    fn test_heuristic_mode_ignores_model() {
        let service = PredictionService::with_model(
            ModelPredictor::from_artifact(linear_artifact()),
            ServiceConfig::heuristic_only(),
        );
        assert_eq!(service.primary_source(), PredictionSource::Heuristic);
        let result = service.predict_batch(&context(), &crops()).unwrap();
        assert_eq!(result.count_by_source(PredictionSource::Model), 0);
    }

    #[test]
    fn test_validation_rejects_before_prediction() {
        struct CountingPredictor(AtomicUsize);
        impl Predictor for CountingPredictor {
            fn source(&self) -> PredictionSource {
                PredictionSource::Model
            }
            fn predict(&self, _: &CropAreaInput, _: &LayoutContext) -> Result<f64, PredictorError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(1.0)
            }
        }

        let predictor = Arc::new(CountingPredictor(AtomicUsize::new(0)));
        let service = PredictionService::with_predictor(predictor.clone(), ServiceConfig::default());

        let mut batch = crops();
        batch[2].height = Some(0.0);
        let err = service.predict_batch(&context(), &batch).unwrap_err();
        assert_eq!(err.index(), 2);
        assert!(matches!(err, ValidationError::NonPositiveDimension { field: "height", .. }));
        assert_eq!(predictor.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_out_of_range_primary_values_fall_back() {
        struct Broken;
        impl Predictor for Broken {
            fn source(&self) -> PredictionSource {
                PredictionSource::Model
            }
            fn predict(&self, crop: &CropAreaInput, _: &LayoutContext) -> Result<f64, PredictorError> {
                match &crop.id {
                    Some(CropId::Int(1)) => Ok(f64::NAN),
                    Some(CropId::Int(2)) => Ok(-1.0),
                    _ => Err(PredictorError::Prediction("tensor shape mismatch".to_string())),
                }
            }
        }

        let service = PredictionService::with_predictor(Arc::new(Broken), ServiceConfig::default());
        let result = service.predict_batch(&context(), &crops()).unwrap();
        assert_eq!(result.count_by_source(PredictionSource::Heuristic), 3);
        for p in &result.predictions {
            assert!(p.value.is_finite() && p.value >= 0.0);
            assert_eq!(p.fallback_reason.as_deref(), Some("prediction"));
        }
    }

    #[test]
    fn test_slow_items_time_out_to_heuristic() {
        struct Slow;
        impl Predictor for Slow {
            fn source(&self) -> PredictionSource {
                PredictionSource::Model
            }
            fn predict(&self, crop: &CropAreaInput, _: &LayoutContext) -> Result<f64, PredictorError> {
                if crop.id == Some(CropId::Int(2)) {
                    std::thread::sleep(Duration::from_millis(30));
                }
                Ok(9.0)
            }
        }

        let config = ServiceConfig {
            item_timeout_ms: Some(10),
            ..ServiceConfig::default()
        };
        let service = PredictionService::with_predictor(Arc::new(Slow), config);
        let result = service.predict_batch(&context(), &crops()).unwrap();

        assert_eq!(result.predictions[0].value, 9.0);
        assert_eq!(result.predictions[1].source, PredictionSource::Heuristic);
        assert_eq!(result.predictions[1].fallback_reason.as_deref(), Some("timeout"));
        assert_eq!(result.predictions[2].value, 9.0);
    }

    #[test]
    fn test_batch_deadline_skips_remaining_items() {
        struct Sleepy;
        impl Predictor for Sleepy {
            fn source(&self) -> PredictionSource {
                PredictionSource::Model
            }
            fn predict(&self, _: &CropAreaInput, _: &LayoutContext) -> Result<f64, PredictorError> {
                std::thread::sleep(Duration::from_millis(20));
                Ok(9.0)
            }
        }

        let config = ServiceConfig {
            batch_timeout_ms: Some(5),
            parallel: false,
            ..ServiceConfig::default()
        };
        let service = PredictionService::with_predictor(Arc::new(Sleepy), config);
        let result = service.predict_batch(&context(), &crops()).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.predictions[0].source, PredictionSource::Model);
        assert_eq!(result.predictions[1].fallback_reason.as_deref(), Some("timeout"));
        assert_eq!(result.predictions[2].fallback_reason.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_parallel_preserves_order() {
        let config = ServiceConfig {
            parallel_threshold: 1,
            ..ServiceConfig::default()
        };
        let service = PredictionService::with_model(ModelPredictor::from_artifact(linear_artifact()), config);

        let batch: Vec<CropAreaInput> = (0..200)
            .map(|i| CropAreaInput::new(i, "Corn", 1.0 + i as f64, 1.0).with_density(0.0))
            .collect();
        let result = service.predict_batch(&context(), &batch).unwrap();

        assert_eq!(result.len(), 200);
        for (i, p) in result.predictions.iter().enumerate() {
            assert_eq!(p.crop_id, Some(CropId::Int(i as i64)));
            // 1.0 + 0.01·area + 0.6
            assert_relative_eq!(p.value, 1.6 + 0.01 * (1.0 + i as f64), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_predict_layout_totals() {
        let service = PredictionService::heuristic_only();
        let response = service.predict_layout(&context(), &crops()).unwrap();
        let totals = response.totals.unwrap();

        assert_relative_eq!(totals.total_area, 126.0);
        let sum: f64 = response.predicted_yields.iter().map(|p| p.value).sum();
        assert_relative_eq!(totals.total_yield, sum);
    }

    #[test]
    fn test_predict_layout_totals_with_repeated_ids() {
        let service = PredictionService::heuristic_only();
        let crops = vec![
            CropAreaInput::new(1, "Corn", 10.0, 10.0).with_density(0.5),
            CropAreaInput::new(1, "Rice", 5.0, 4.0).with_density(0.0),
        ];
        let response = service.predict_layout(&context(), &crops).unwrap();
        let totals = response.totals.unwrap();

        // 2.5 × 1.25 + 1.9
        assert_relative_eq!(totals.total_yield, 5.025, epsilon = 1e-12);
        assert_relative_eq!(totals.total_area, 120.0);
    }

    #[test]
    fn test_empty_batch() {
        let service = PredictionService::with_model(
            ModelPredictor::from_artifact(linear_artifact()),
            ServiceConfig::default(),
        );
        let response = service.predict_layout(&context(), &[]).unwrap();
        assert!(response.predicted_yields.is_empty());
        assert_eq!(response.totals.unwrap().total_area, 0.0);
    }
}
