//! Prediction orchestration: snapshot → cap → engineer → normalize → infer
//! → domain result.
//!
//! This is the only module that touches history ordering and the wall
//! clock. The pair snapshot is taken once per request; a lifecycle swap
//! landing mid-prediction has no effect on it.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

use crate::engine::InferenceEngine;
use crate::error::{InferenceError, PredictError};
use crate::lifecycle::ModelLifecycleManager;
use crate::{PondContext, Prediction, SensorReading, features, normalize};
use std::sync::Arc;

pub struct PredictionService {
    lifecycle: Arc<ModelLifecycleManager>,
    engine: InferenceEngine,
}

impl PredictionService {
    pub fn new(lifecycle: Arc<ModelLifecycleManager>, engine: InferenceEngine) -> Self {
        Self { lifecycle, engine }
    }

    /// Run the full pipeline for one reading. Input-quality problems
    /// (out-of-range or NaN sensor fields) are recovered by capping and
    /// imputation; only structural failures surface as errors.
    pub fn predict(
        &self,
        pond: &PondContext,
        reading: &SensorReading,
        history: &[SensorReading],
    ) -> Result<Prediction, PredictError> {
        let pair = self.lifecycle.snapshot().ok_or(PredictError::NoActivePair)?;
        let cfg = &pair.config;

        // Cap base readings before any derived feature can see them.
        let capped = normalize::cap_reading(&cfg.limits, reading);
        let mut capped_history: Vec<SensorReading> = history
            .iter()
            .map(|r| normalize::cap_reading(&cfg.limits, r))
            .collect();
        capped_history.sort_by_key(|r| r.recorded_at);

        let raw = features::raw_vector(cfg, &capped, pond, &capped_history);
        let scaled = normalize::normalize(cfg, &raw);
        let output = self.engine.run(pair.runtime.as_ref(), &scaled)?;
        // Pair validation pinned the model's output width to (weight, length).
        if output.len() != 2 {
            return Err(PredictError::Inference(InferenceError::OutputWidth {
                got: output.len(),
                expected: 2,
            }));
        }
        let weight_g = output[0];
        let length_cm = output[1];

        let age_days = features::days_in_farm(
            pond.start_date,
            capped.recorded_at,
            cfg.constants.day_zero_offset,
        );
        let harvest_ready_at = harvest_ready_at(
            capped.recorded_at.date_naive(),
            age_days,
            weight_g,
            cfg.constants.market_weight_g,
        );

        tracing::debug!(
            pond = %pond.pond_id,
            version = %pair.version,
            weight_g,
            length_cm,
            "prediction produced"
        );

        Ok(Prediction {
            weight_g,
            length_cm,
            harvest_ready_at,
            model_version: pair.version.clone(),
            created_at: Utc::now(),
        })
    }
}

/// Project the date the fish reaches market weight, assuming the average
/// growth rate observed since stocking continues. Horizon capped at a year;
/// an unusable rate degrades to the far end of the horizon rather than
/// failing the prediction.
fn harvest_ready_at(
    reading_date: NaiveDate,
    age_days: f64,
    weight_g: f64,
    market_weight_g: f64,
) -> NaiveDate {
    if weight_g >= market_weight_g {
        return reading_date;
    }
    let rate_g_per_day = weight_g / age_days.max(1.0);
    let days = if rate_g_per_day > 0.0 {
        ((market_weight_g - weight_g) / rate_g_per_day).ceil()
    } else {
        f64::INFINITY
    };
    let days = if days.is_finite() {
        days.clamp(0.0, 365.0) as i64
    } else {
        365
    };
    reading_date + ChronoDuration::days(days)
}
