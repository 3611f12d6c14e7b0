//! Concrete `ModelRuntime` implementations.
//!
//! `SimulatedRuntime` executes a small affine model stored in a
//! checksummable binary layout; it stands in for the real backend in tests
//! and on hosts without one. The ONNX-backed `TractRuntime` lives behind the
//! `tract` feature.
pub mod error;
#[cfg(feature = "tract")]
pub mod tract;

use aqua_traits::{ModelRuntime, RuntimeLoader};
use error::RtError;

/// Magic prefix of the simulated model artifact.
const MAGIC: &[u8; 4] = b"AQM1";

/// Affine model `y = W·x + b` decoded from a binary artifact.
///
/// Layout (little endian): magic "AQM1", u32 input width, u32 output width,
/// then `out*in` f32 weights row-major followed by `out` f32 biases.
#[derive(Debug)]
pub struct SimulatedRuntime {
    input_width: usize,
    output_width: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl SimulatedRuntime {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RtError> {
        if bytes.len() < 12 || bytes[..4] != *MAGIC {
            return Err(RtError::Malformed("missing AQM1 magic".into()));
        }
        let input_width = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let output_width = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        if input_width == 0 || output_width == 0 {
            return Err(RtError::Malformed("zero input or output width".into()));
        }
        let n_f32 = input_width
            .checked_mul(output_width)
            .and_then(|n| n.checked_add(output_width))
            .ok_or_else(|| RtError::Malformed("width overflow".into()))?;
        let expected_len = n_f32
            .checked_mul(4)
            .and_then(|n| n.checked_add(12))
            .ok_or_else(|| RtError::Malformed("width overflow".into()))?;
        if bytes.len() != expected_len {
            return Err(RtError::Malformed(format!(
                "payload is {} bytes, expected {}",
                bytes.len(),
                expected_len
            )));
        }
        let mut values = Vec::with_capacity(n_f32);
        for chunk in bytes[12..].chunks_exact(4) {
            values.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        let weights = values[..input_width * output_width].to_vec();
        let biases = values[input_width * output_width..].to_vec();
        Ok(Self {
            input_width,
            output_width,
            weights,
            biases,
        })
    }

    /// Encode weights and biases into the binary artifact layout.
    /// `weights` is row-major `output_width x input_width`.
    pub fn encode(input_width: usize, output_width: usize, weights: &[f32], biases: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + (weights.len() + biases.len()) * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(input_width as u32).to_le_bytes());
        out.extend_from_slice(&(output_width as u32).to_le_bytes());
        for w in weights.iter().chain(biases) {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }
}

impl ModelRuntime for SimulatedRuntime {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn output_width(&self) -> usize {
        self.output_width
    }

    fn infer(&self, input: &[f32]) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
        if input.len() != self.input_width {
            return Err(Box::new(RtError::InputWidth {
                got: input.len(),
                expected: self.input_width,
            }));
        }
        let mut out = Vec::with_capacity(self.output_width);
        for row in 0..self.output_width {
            let w = &self.weights[row * self.input_width..(row + 1) * self.input_width];
            let mut acc = self.biases[row];
            for (wi, xi) in w.iter().zip(input) {
                acc += wi * xi;
            }
            out.push(acc);
        }
        Ok(out)
    }
}

/// Loader for the simulated artifact format.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedLoader;

impl RuntimeLoader for SimulatedLoader {
    fn load(
        &self,
        bytes: &[u8],
    ) -> Result<Box<dyn ModelRuntime>, Box<dyn std::error::Error + Send + Sync>> {
        let rt = SimulatedRuntime::from_bytes(bytes)?;
        tracing::debug!(
            input_width = rt.input_width(),
            output_width = rt.output_width(),
            "simulated model loaded"
        );
        Ok(Box::new(rt))
    }
}
