//! Model runtime abstraction.

use crate::error::Result;
use crate::preprocess::InputSpec;
use ndarray::Array4;
use std::future::Future;
use std::path::PathBuf;

/// NHWC input tensor with a leading batch dimension of 1.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    /// Channel values in [0, 255].
    Uint8(Array4<u8>),
    /// Normalized channel values.
    Float32(Array4<f32>),
}

impl Tensor {
    /// All-zero tensor matching an input contract.
    pub fn zeros(spec: InputSpec) -> Self {
        match spec.normalization {
            crate::preprocess::Normalization::Uint8 => Self::Uint8(Array4::zeros(spec.shape())),
            _ => Self::Float32(Array4::zeros(spec.shape())),
        }
    }

    /// Tensor dimensions.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Uint8(a) => a.shape(),
            Self::Float32(a) => a.shape(),
        }
    }
}

/// Flat model output, one value per class.
///
/// Whether the values are probabilities or raw scores is unknown until the
/// vector goes through [`interpret`](crate::inference::interpret).
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput(pub Vec<f32>);

impl RawOutput {
    /// Number of output classes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the output is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Output values.
    pub fn values(&self) -> &[f32] {
        &self.0
    }
}

/// Model asset as handed to a runtime.
#[derive(Debug, Clone)]
pub struct ModelSource {
    /// Human-readable role of the model ("gate", "species").
    pub name: String,
    /// Location of the model file.
    pub path: PathBuf,
    /// Input contract the model was exported with.
    pub input: InputSpec,
}

/// Loads models and runs them on tensors.
///
/// Handles are read-only after load and are shared between sessions.
pub trait InferenceRuntime: Send + Sync + 'static {
    /// A loaded model.
    type Handle: Send + Sync + 'static;

    /// Load a model. May suspend while the asset is read and parsed.
    fn load(&self, source: &ModelSource) -> impl Future<Output = Result<Self::Handle>> + Send;

    /// Number of output classes, if the runtime knows it after load.
    fn output_len(&self, handle: &Self::Handle) -> Option<usize>;

    /// Run the model on one tensor. The tensor is consumed by the call.
    fn run(&self, handle: &Self::Handle, tensor: Tensor) -> Result<RawOutput>;
}
