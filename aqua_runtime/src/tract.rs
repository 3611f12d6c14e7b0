//! ONNX-backed runtime via tract. Enabled with the `tract` feature.

use tract_onnx::prelude::*;

use crate::error::RtError;
use aqua_traits::{ModelRuntime, RuntimeLoader};

pub struct TractRuntime {
    plan: TypedSimplePlan<TypedModel>,
    input_width: usize,
    output_width: usize,
}

impl TractRuntime {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RtError> {
        let mut reader = std::io::Cursor::new(bytes);
        let plan = tract_onnx::onnx()
            .model_for_read(&mut reader)
            .map_err(|e| RtError::Malformed(e.to_string()))?
            .into_optimized()
            .map_err(|e| RtError::Malformed(e.to_string()))?
            .into_runnable()
            .map_err(|e| RtError::Backend(e.to_string()))?;

        let input_width = Self::static_width(plan.model().input_fact(0))?;
        let output_width = Self::static_width(plan.model().output_fact(0))?;
        Ok(Self {
            plan,
            input_width,
            output_width,
        })
    }

    /// Width of a rank-1 or batch-leading rank-2 tensor fact; anything with
    /// a symbolic trailing dimension is rejected.
    fn static_width(fact: TractResult<&TypedFact>) -> Result<usize, RtError> {
        let fact = fact.map_err(|e| RtError::Malformed(e.to_string()))?;
        let dims = fact
            .shape
            .as_concrete()
            .ok_or_else(|| RtError::Malformed("model shape is not static".into()))?;
        dims.last()
            .copied()
            .filter(|&w| w > 0)
            .ok_or_else(|| RtError::Malformed("model has an empty shape".into()))
    }
}

impl ModelRuntime for TractRuntime {
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
        let tensor = tract_ndarray::Array2::from_shape_vec((1, self.input_width), input.to_vec())
            .map_err(|e| Box::new(RtError::Backend(e.to_string())))?;
        let outputs = self
            .plan
            .run(tvec!(Tensor::from(tensor).into()))
            .map_err(|e| Box::new(RtError::Backend(e.to_string())))?;
        let view = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| Box::new(RtError::Backend(e.to_string())))?;
        Ok(view.iter().copied().collect())
    }
}

/// Loader for ONNX model artifacts.
#[derive(Debug, Default, Clone, Copy)]
pub struct TractLoader;

impl RuntimeLoader for TractLoader {
    fn load(
        &self,
        bytes: &[u8],
    ) -> Result<Box<dyn ModelRuntime>, Box<dyn std::error::Error + Send + Sync>> {
        let rt = TractRuntime::from_bytes(bytes)?;
        tracing::debug!(
            input_width = rt.input_width(),
            output_width = rt.output_width(),
            "onnx model loaded"
        );
        Ok(Box::new(rt))
    }
}
