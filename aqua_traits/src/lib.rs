pub mod cancel;
pub mod clock;

pub use cancel::CancelToken;
pub use clock::{Clock, MonotonicClock};

/// Numeric model seam. Implementations wrap an on-device model runtime;
/// they have no knowledge of feature meaning.
pub trait ModelRuntime: Send + Sync {
    /// Declared input width of the loaded model.
    fn input_width(&self) -> usize;

    /// Declared output width of the loaded model.
    fn output_width(&self) -> usize;

    /// Run the model on a vector of exactly `input_width()` values.
    ///
    /// Implementations return whatever the model produced; callers are
    /// responsible for validating length and finiteness of the output.
    fn infer(&self, input: &[f32]) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Builds a runtime from raw model-artifact bytes.
///
/// The lifecycle manager uses this to prove a downloaded artifact actually
/// loads before promoting it to the active pair.
pub trait RuntimeLoader: Send + Sync {
    fn load(
        &self,
        bytes: &[u8],
    ) -> Result<Box<dyn ModelRuntime>, Box<dyn std::error::Error + Send + Sync>>;
}
