//! Model loading, inference and output post-processing.

mod interpret;
mod onnx;
mod ranking;
mod runtime;

pub use interpret::{interpret, looks_like_probabilities, softmax};
pub use onnx::{OnnxModel, OnnxRuntime};
pub use ranking::{PredictionSet, RankedPrediction, rank};
pub use runtime::{InferenceRuntime, ModelSource, RawOutput, Tensor};
