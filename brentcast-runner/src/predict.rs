//! Prediction service: answer "what is the forecast for date D?" from the
//! persisted model and watermark.
//!
//! The model is loaded when the service opens and the watermark is re-read
//! on every request, so an unreadable watermark degrades that request to the
//! fallback horizon instead of failing it. A readable watermark must match the
//! loaded model's cutoff. When it does not, a pipeline run has replaced the
//! pair: the model is reloaded, and if the fresh pair still disagrees the
//! request is rejected.

use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use brentcast_core::data::ArtifactStore;
use brentcast_core::domain::Watermark;
use brentcast_core::error::{InvalidHorizonError, SerializationError};
use brentcast_core::forecast::{deserialize_model, FittedModel};
use brentcast_core::horizon::{resolve_horizon, HorizonPolicy, ResolvedHorizon};

use crate::config::PipelineConfig;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("model unavailable: {0}")]
    Model(#[from] SerializationError),
    #[error("{0}")]
    Horizon(#[from] InvalidHorizonError),
    #[error("no forecast row for {target}: it is the last observed day, not a future one")]
    EmptyForecast { target: NaiveDate },
    #[error("model cutoff {model_cutoff} does not match watermark {watermark}; artifacts are mid-update")]
    MismatchedArtifacts {
        model_cutoff: NaiveDate,
        watermark: NaiveDate,
    },
}

/// One answered request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Requested date.
    pub target: NaiveDate,
    /// Date of the returned forecast row; differs from `target` only on fallback.
    pub forecast_date: NaiveDate,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub horizon: ResolvedHorizon,
}

pub struct PredictionService {
    store: ArtifactStore,
    model: RwLock<Arc<dyn FittedModel>>,
    policy: HorizonPolicy,
}

fn load_model(store: &ArtifactStore) -> Result<Arc<dyn FittedModel>, SerializationError> {
    let text = store.read_model_text()?;
    Ok(Arc::from(deserialize_model(&text)?))
}

impl PredictionService {
    /// Load the persisted model. Fails if it is missing or unreadable.
    pub fn open(store: ArtifactStore, policy: HorizonPolicy) -> Result<Self, PredictError> {
        let model = load_model(&store)?;
        info!(
            kind = %model.kind(),
            cutoff = %model.cutoff(),
            dir = %store.dir().display(),
            "loaded forecast model"
        );
        Ok(Self {
            store,
            model: RwLock::new(model),
            policy,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, PredictError> {
        Self::open(
            ArtifactStore::new(&config.artifacts.dir),
            config.prediction.policy(),
        )
    }

    /// The model currently answering requests.
    pub fn model(&self) -> Arc<dyn FittedModel> {
        Arc::clone(&self.model.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// The model and watermark to answer one request with.
    ///
    /// A readable watermark is always paired with a model whose cutoff equals it.
    fn current_pair(
        &self,
    ) -> Result<(Arc<dyn FittedModel>, Result<Watermark, SerializationError>), PredictError> {
        let model = self.model();
        let watermark = self.store.read_watermark();
        match &watermark {
            Ok(wm) if wm.date() != model.cutoff() => {}
            _ => return Ok((model, watermark)),
        }

        let fresh = load_model(&self.store)?;
        let watermark = self.store.read_watermark();
        if let Ok(wm) = &watermark {
            if wm.date() != fresh.cutoff() {
                error!(
                    model_cutoff = %fresh.cutoff(),
                    watermark = %wm,
                    "model and watermark disagree after reload"
                );
                return Err(PredictError::MismatchedArtifacts {
                    model_cutoff: fresh.cutoff(),
                    watermark: wm.date(),
                });
            }
        }
        info!(
            previous = %model.cutoff(),
            cutoff = %fresh.cutoff(),
            "artifacts replaced; reloaded forecast model"
        );
        *self.model.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&fresh);
        Ok((fresh, watermark))
    }

    /// Forecast for one target date: the last row of `predict(horizon)`.
    pub fn predict(&self, target: NaiveDate) -> Result<Prediction, PredictError> {
        let (model, watermark) = self.current_pair()?;
        let horizon = resolve_horizon(target, watermark, self.policy)?;
        let forecast = model.predict(horizon.days)?;
        let row = forecast
            .last()
            .ok_or(PredictError::EmptyForecast { target })?;

        debug!(%target, days = horizon.days, source = %horizon.source, yhat = row.yhat, "prediction");
        Ok(Prediction {
            target,
            forecast_date: row.date,
            value: row.yhat,
            lower: row.yhat_lower,
            upper: row.yhat_upper,
            horizon,
        })
    }

    /// Answer several dates in parallel. Results keep the input order.
    pub fn predict_many(&self, targets: &[NaiveDate]) -> Vec<Result<Prediction, PredictError>> {
        targets.par_iter().map(|&t| self.predict(t)).collect()
    }
}
