use thiserror::Error;

/// Failures of a single inference call. Distinct from "no model loaded" so
/// callers can tell a broken pipeline from an unprovisioned device.
#[derive(Debug, Error, Clone)]
pub enum InferenceError {
    #[error("no model loaded")]
    NoModel,
    #[error("input width {got}, model expects {expected}")]
    WidthMismatch { got: usize, expected: usize },
    #[error("model output width {got}, expected {expected}")]
    OutputWidth { got: usize, expected: usize },
    #[error("model produced non-finite output")]
    NonFinite,
    #[error("inference exceeded latency budget of {budget_ms} ms")]
    LatencyExceeded { budget_ms: u64 },
    #[error("corrupt model artifact: {0}")]
    CorruptModel(String),
    #[error("model runtime failure: {0}")]
    Runtime(String),
}

#[derive(Debug, Error, Clone)]
pub enum PredictError {
    #[error("no active model/config pair")]
    NoActivePair,
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

/// Internal lifecycle failures; surfaced to callers only as the reason
/// string inside `UpdateOutcome::Rejected` / `UpdateCheck::CheckFailed`.
#[derive(Debug, Error, Clone)]
pub enum LifecycleError {
    #[error("update check failed: {0}")]
    CheckFailed(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("download cancelled")]
    Cancelled,
    #[error("checksum mismatch for {artifact} artifact")]
    ChecksumMismatch { artifact: &'static str },
    #[error("invalid preprocessing config: {0}")]
    InvalidConfig(String),
    #[error("model artifact rejected: {0}")]
    BadModel(String),
    #[error("model/config pair disagree: {0}")]
    IncompatiblePair(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
