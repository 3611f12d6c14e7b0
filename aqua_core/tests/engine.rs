use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use aqua_core::InferenceEngine;
use aqua_core::error::InferenceError;
use aqua_core::mocks::{FailingRuntime, FixedRuntime};
use aqua_traits::ModelRuntime;
use aqua_traits::clock::test_clock::TestClock;
use rstest::rstest;

#[rstest]
fn rejects_input_width_mismatch() {
    let engine = InferenceEngine::new(100);
    let rt = FixedRuntime {
        input_width: 14,
        output: vec![250.0, 25.0],
    };
    let err = engine.run(&rt, &[0.0; 13]).unwrap_err();
    assert!(matches!(
        err,
        InferenceError::WidthMismatch {
            got: 13,
            expected: 14
        }
    ));
}

#[rstest]
fn rejects_non_finite_output() {
    let engine = InferenceEngine::new(100);
    let rt = FixedRuntime {
        input_width: 2,
        output: vec![f32::NAN, 25.0],
    };
    let err = engine.run(&rt, &[0.0, 0.0]).unwrap_err();
    assert!(matches!(err, InferenceError::NonFinite));
}

/// A runtime whose declared output width disagrees with what it returns.
struct LyingRuntime;
impl ModelRuntime for LyingRuntime {
    fn input_width(&self) -> usize {
        2
    }
    fn output_width(&self) -> usize {
        2
    }
    fn infer(&self, _input: &[f32]) -> Result<Vec<f32>, Box<dyn Error + Send + Sync>> {
        Ok(vec![1.0, 2.0, 3.0])
    }
}

#[rstest]
fn rejects_output_width_mismatch() {
    let engine = InferenceEngine::new(100);
    let err = engine.run(&LyingRuntime, &[0.0, 0.0]).unwrap_err();
    assert!(matches!(
        err,
        InferenceError::OutputWidth {
            got: 3,
            expected: 2
        }
    ));
}

#[rstest]
fn maps_backend_failure_to_runtime_error() {
    let engine = InferenceEngine::new(100);
    let rt = FailingRuntime { input_width: 2 };
    let err = engine.run(&rt, &[0.0, 0.0]).unwrap_err();
    assert!(matches!(err, InferenceError::Runtime(_)));
}

/// A runtime that advances the shared test clock past the budget.
struct SlowRuntime {
    clock: TestClock,
}
impl ModelRuntime for SlowRuntime {
    fn input_width(&self) -> usize {
        2
    }
    fn output_width(&self) -> usize {
        2
    }
    fn infer(&self, _input: &[f32]) -> Result<Vec<f32>, Box<dyn Error + Send + Sync>> {
        self.clock.advance(Duration::from_millis(250));
        Ok(vec![1.0, 2.0])
    }
}

#[rstest]
fn reports_latency_budget_exceeded_as_failure() {
    let clock = TestClock::new();
    let engine = InferenceEngine::new(100).with_clock(Arc::new(clock.clone()));
    let rt = SlowRuntime { clock };
    let err = engine.run(&rt, &[0.0, 0.0]).unwrap_err();
    assert!(matches!(
        err,
        InferenceError::LatencyExceeded { budget_ms: 100 }
    ));
}

#[cfg(feature = "runtime-errors")]
#[rstest]
fn downcasts_runtime_width_errors() {
    use aqua_runtime::SimulatedRuntime;

    // Simulated model declares width 3; feed it through a runtime wrapper
    // that lies about its input width so the backend sees the short vector.
    struct Mismatched(SimulatedRuntime);
    impl ModelRuntime for Mismatched {
        fn input_width(&self) -> usize {
            2
        }
        fn output_width(&self) -> usize {
            2
        }
        fn infer(&self, input: &[f32]) -> Result<Vec<f32>, Box<dyn Error + Send + Sync>> {
            self.0.infer(input)
        }
    }

    let bytes = SimulatedRuntime::encode(3, 2, &[0.0; 6], &[1.0, 2.0]);
    let inner = SimulatedRuntime::from_bytes(&bytes).unwrap();
    let engine = InferenceEngine::new(100);
    let err = engine.run(&Mismatched(inner), &[0.0, 0.0]).unwrap_err();
    assert!(matches!(
        err,
        InferenceError::WidthMismatch {
            got: 2,
            expected: 3
        }
    ));
}
