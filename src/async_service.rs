//! Async boundary for request handlers
//!
//! Model loading and batch evaluation are CPU/blocking work, so they run on
//! Tokio's blocking pool (`spawn_blocking`), never on the async executor.
//! When `batch_timeout_ms` is configured the whole batch is bounded with
//! `tokio::time::timeout`; a batch that misses the bound is answered by the
//! heuristic instead of failing. The blocking task is not cancelled and
//! finishes in the background.

use crate::error::{PredictorError, ValidationError};
use crate::service::PredictionService;
use crate::types::{BatchPredictionResult, CropAreaInput, LayoutContext};
use std::sync::Arc;

#[derive(Clone)]
pub struct AsyncPredictionService {
    inner: Arc<PredictionService>,
}

impl AsyncPredictionService {
    pub fn new(service: PredictionService) -> Self {
        Self {
            inner: Arc::new(service),
        }
    }

    pub fn inner(&self) -> &PredictionService {
        &self.inner
    }

    /// Load the model on the blocking pool
    pub async fn warm_up(&self) -> Result<(), PredictorError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.warm_up())
            .await
            .map_err(|e| PredictorError::ModelUnavailable(format!("Task join error: {}", e)))?
    }

    pub async fn predict_batch(
        &self,
        context: LayoutContext,
        crops: Vec<CropAreaInput>,
    ) -> Result<BatchPredictionResult, ValidationError> {
        // Reject malformed geometry without touching the blocking pool
        PredictionService::validate(&crops)?;

        let inner = Arc::clone(&self.inner);
        let items = crops.clone();
        let task = tokio::task::spawn_blocking(move || inner.predict_batch(&context, &items));

        let joined = match self.inner.config().batch_timeout() {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!(
                        "Batch of {} crop areas exceeded {:?} - answering with heuristic",
                        crops.len(),
                        limit
                    );
                    return Ok(self.inner.heuristic_batch(&crops, Some("timeout")));
                }
            },
            None => task.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Prediction task failed ({}) - answering with heuristic", e);
                Ok(self.inner.heuristic_batch(&crops, Some("prediction")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::predictors::network::tests::linear_artifact;
    use crate::predictors::{ModelPredictor, Predictor};
    use crate::types::PredictionSource;
    use std::time::Duration;

    fn crops() -> Vec<CropAreaInput> {
        vec![
            CropAreaInput::new(1, "Corn", 10.0, 10.0).with_density(0.5),
            CropAreaInput::new(2, "Rice", 2.0, 2.0).with_density(1.0),
        ]
    }

    #[tokio::test]
    async fn test_async_batch_uses_model() {
        let service = AsyncPredictionService::new(PredictionService::with_model(
            ModelPredictor::from_artifact(linear_artifact()),
            ServiceConfig::default(),
        ));
        service.warm_up().await.unwrap();

        let mut batch = crops();
        for crop in &mut batch {
            crop.irrigation = "none".into();
            crop.fertilizer_type = "none".into();
            crop.fertilizer_method = "broadcasting".into();
        }
        let result = service
            .predict_batch(LayoutContext::new(6.0, 10.0, 3.0), batch)
            .await
            .unwrap();
        assert_eq!(result.count_by_source(PredictionSource::Model), 2);
    }

    #[tokio::test]
    async fn test_async_batch_timeout_falls_back() {
        struct Stalled;
        impl Predictor for Stalled {
            fn source(&self) -> PredictionSource {
                PredictionSource::Model
            }
            fn predict(&self, _: &CropAreaInput, _: &LayoutContext) -> Result<f64, PredictorError> {
                std::thread::sleep(Duration::from_millis(200));
                Ok(1.0)
            }
        }

        let config = ServiceConfig {
            batch_timeout_ms: Some(20),
            ..ServiceConfig::default()
        };
        let service = AsyncPredictionService::new(PredictionService::with_predictor(Arc::new(Stalled), config));
        let result = service
            .predict_batch(LayoutContext::default(), crops())
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.count_by_source(PredictionSource::Heuristic), 2);
        assert!(result
            .predictions
            .iter()
            .all(|p| p.fallback_reason.as_deref() == Some("timeout")));
    }

    #[tokio::test]
    async fn test_async_validation_error() {
        let service = AsyncPredictionService::new(PredictionService::heuristic_only());
        let mut batch = crops();
        batch[0].width = Some(-1.0);
        assert!(service.predict_batch(LayoutContext::default(), batch).await.is_err());
    }
}
