//! Width-, finiteness- and latency-validated model calls.
//!
//! The engine has no knowledge of feature meaning: it takes a fixed-length
//! numeric vector, runs the backend, and refuses to hand back anything that
//! is structurally valid but numerically garbage. Timeouts are reported as
//! failures and never retried here; retry policy belongs to the caller.

use std::sync::Arc;
use std::time::Instant;

use aqua_traits::ModelRuntime;
use aqua_traits::clock::{Clock, MonotonicClock};

use crate::error::InferenceError;

// For typed runtime error mapping
#[cfg(feature = "runtime-errors")]
use aqua_runtime::error::RtError;

pub struct InferenceEngine {
    latency_budget_ms: u64,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("latency_budget_ms", &self.latency_budget_ms)
            .finish()
    }
}

impl InferenceEngine {
    pub fn new(latency_budget_ms: u64) -> Self {
        Self {
            latency_budget_ms,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Provide a custom clock implementation; defaults to MonotonicClock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the model on `input`, validating widths, output finiteness, and
    /// the latency budget. Returns the raw output vector in f64.
    pub fn run(
        &self,
        runtime: &dyn ModelRuntime,
        input: &[f64],
    ) -> Result<Vec<f64>, InferenceError> {
        let expected = runtime.input_width();
        if input.len() != expected {
            return Err(InferenceError::WidthMismatch {
                got: input.len(),
                expected,
            });
        }

        let input_f32: Vec<f32> = input.iter().map(|&v| v as f32).collect();
        let epoch: Instant = self.clock.now();
        let out = runtime
            .infer(&input_f32)
            .map_err(|e| map_rt_error_dyn(&*e))?;
        let elapsed_ms = self.clock.ms_since(epoch);
        if elapsed_ms > self.latency_budget_ms {
            tracing::warn!(elapsed_ms, budget_ms = self.latency_budget_ms, "inference over budget");
            return Err(InferenceError::LatencyExceeded {
                budget_ms: self.latency_budget_ms,
            });
        }

        let declared = runtime.output_width();
        if out.len() != declared {
            return Err(InferenceError::OutputWidth {
                got: out.len(),
                expected: declared,
            });
        }
        if out.iter().any(|v| !v.is_finite()) {
            tracing::error!("model produced non-finite output");
            return Err(InferenceError::NonFinite);
        }
        Ok(out.iter().map(|&v| f64::from(v)).collect())
    }
}

// Map any backend error to a typed InferenceError, with special handling
// for the known runtime error type.
fn map_rt_error_dyn(e: &(dyn std::error::Error + 'static)) -> InferenceError {
    #[cfg(feature = "runtime-errors")]
    if let Some(rt) = e.downcast_ref::<RtError>() {
        return match rt {
            RtError::InputWidth { got, expected } => InferenceError::WidthMismatch {
                got: *got,
                expected: *expected,
            },
            RtError::Malformed(msg) => InferenceError::CorruptModel(msg.clone()),
            other => InferenceError::Runtime(other.to_string()),
        };
    }
    let s = e.to_string();
    if s.to_lowercase().contains("malformed") {
        InferenceError::CorruptModel(s)
    } else {
        InferenceError::Runtime(s)
    }
}
