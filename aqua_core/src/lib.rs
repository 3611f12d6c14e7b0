#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core inference pipeline (backend-agnostic).
//!
//! This crate turns raw pond sensor readings into model-ready vectors and
//! keeps the on-device (model, preprocessing config) pair coherent across
//! updates. The model backend is reached only through
//! `aqua_traits::ModelRuntime`.
//!
//! ## Architecture
//!
//! - **Feature engineering**: reading + history → raw vector in config order
//!   (`features` module)
//! - **Normalization**: biological capping, imputation, zero floors, robust
//!   scaling (`normalize` module)
//! - **Inference**: width/finiteness/latency-validated model calls
//!   (`engine` module)
//! - **Prediction**: orchestration into domain results (`predict` module)
//! - **Lifecycle**: versioned atomic swap of the active pair (`lifecycle`)
//!
//! ## Determinism
//!
//! The prediction path is a pure function of (reading, history, config,
//! model): re-running it yields bit-identical output. All data-dependent
//! branching happens once, at config resolution, never per prediction.

pub mod engine;
pub mod error;
pub mod features;
pub mod lifecycle;
pub mod mocks;
pub mod normalize;
pub mod predict;
pub mod util;

use chrono::{DateTime, NaiveDate, Utc};

pub use engine::InferenceEngine;
pub use error::{InferenceError, LifecycleError, PredictError};
pub use lifecycle::{
    ActivePair, FsUpdateSource, LifecycleState, ModelLifecycleManager, UpdateCheck, UpdateEvent,
    UpdateOutcome, UpdateSource, UpdateWorker,
};
pub use predict::PredictionService;

/// Ordered numeric input consumed by the inference model. Length and order
/// are fixed by the active preprocessing config; vectors are only comparable
/// under the same config version.
pub type FeatureVector = Vec<f64>;

/// One water-quality sample. Owned by the storage collaborator; this crate
/// only ever reads it. Missing sensor fields arrive as NaN and are recovered
/// by imputation, never surfaced as errors.
#[derive(Debug, Clone)]
pub struct SensorReading {
    pub temperature: f64,
    pub ph: f64,
    pub dissolved_oxygen: f64,
    pub ammonia: f64,
    pub nitrate: f64,
    pub turbidity: f64,
    pub recorded_at: DateTime<Utc>,
    pub pond_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl SensorReading {
    /// Build a reading from a sideloaded history CSV row.
    pub fn from_history_row(row: &aqua_config::HistoryRow, pond_id: &str) -> Self {
        Self {
            temperature: row.temperature,
            ph: row.ph,
            dissolved_oxygen: row.dissolved_oxygen,
            ammonia: row.ammonia,
            nitrate: row.nitrate,
            turbidity: row.turbidity,
            recorded_at: row.recorded_at,
            pond_id: pond_id.to_string(),
            latitude: None,
            longitude: None,
        }
    }
}

/// The pond a reading belongs to, as far as the pipeline cares.
#[derive(Debug, Clone)]
pub struct PondContext {
    pub pond_id: String,
    /// Stocking date; day zero for the elapsed-days feature.
    pub start_date: NaiveDate,
}

/// Output of one successful pipeline run. Immutable; persisted by an
/// external collaborator.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Predicted fish weight in grams (model native unit)
    pub weight_g: f64,
    /// Predicted fish length in centimeters
    pub length_cm: f64,
    /// Estimated date the fish reaches market weight
    pub harvest_ready_at: NaiveDate,
    /// Version of the model pair that produced this prediction
    pub model_version: String,
    pub created_at: DateTime<Utc>,
}
