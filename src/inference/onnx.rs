//! ONNX Runtime implementation of [`InferenceRuntime`].

use crate::error::{Error, Result};
use crate::inference::{InferenceRuntime, ModelSource, RawOutput, Tensor};
use crate::preprocess::InputSpec;
use ort::session::Session;
use ort::value::{DynValue, TensorRef};
use std::sync::Mutex;
use tracing::{debug, info};

/// Runtime backed by ONNX Runtime sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnnxRuntime;

/// A loaded ONNX model.
pub struct OnnxModel {
    name: String,
    input: InputSpec,
    output_name: String,
    output_len: usize,
    // `Session::run` needs `&mut`; the lock is only held for one forward pass.
    session: Mutex<Session>,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output_name", &self.output_name)
            .field("output_len", &self.output_len)
            .finish_non_exhaustive()
    }
}

impl OnnxModel {
    /// Input contract the model was loaded with.
    pub fn input(&self) -> InputSpec {
        self.input
    }
}

impl InferenceRuntime for OnnxRuntime {
    type Handle = OnnxModel;

    async fn load(&self, source: &ModelSource) -> Result<OnnxModel> {
        let bytes = tokio::fs::read(&source.path)
            .await
            .map_err(|e| asset_error(source, format!("{}: {e}", source.path.display())))?;

        debug!(
            "Read {} model ({} bytes) from {}",
            source.name,
            bytes.len(),
            source.path.display()
        );

        let source = source.clone();
        tokio::task::spawn_blocking(move || build_model(&source, &bytes))
            .await
            .map_err(|e| Error::Internal {
                message: format!("model load task failed: {e}"),
            })?
    }

    fn output_len(&self, handle: &OnnxModel) -> Option<usize> {
        Some(handle.output_len)
    }

    fn run(&self, handle: &OnnxModel, tensor: Tensor) -> Result<RawOutput> {
        if tensor.shape() != handle.input.shape() {
            return Err(Error::Inference {
                reason: format!(
                    "{} model expects input {:?}, got {:?}",
                    handle.name,
                    handle.input.shape(),
                    tensor.shape()
                ),
            });
        }

        let mut session = handle.session.lock().map_err(|_| Error::Inference {
            reason: format!("{} model session lock poisoned", handle.name),
        })?;

        forward(&mut session, &handle.output_name, &tensor)
            .map(RawOutput)
            .map_err(|reason| Error::Inference {
                reason: format!("{} model: {reason}", handle.name),
            })
    }
}

/// Build a session and probe it once with a zero tensor.
///
/// The probe checks the declared input contract and yields the output width
/// used for label alignment.
fn build_model(source: &ModelSource, bytes: &[u8]) -> Result<OnnxModel> {
    let mut builder = Session::builder().map_err(|e| asset_error(source, e))?;
    let mut session = builder
        .commit_from_memory(bytes)
        .map_err(|e| asset_error(source, e))?;

    let output_name = session
        .outputs()
        .first()
        .map(|o| o.name().to_string())
        .ok_or_else(|| asset_error(source, "model declares no outputs"))?;

    let probe = forward(&mut session, &output_name, &Tensor::zeros(source.input)).map_err(
        |reason| {
            asset_error(
                source,
                format!(
                    "model rejected a {:?} {} probe: {reason}",
                    source.input.shape(),
                    source.input.normalization
                ),
            )
        },
    )?;

    if probe.is_empty() {
        return Err(asset_error(source, "model produced an empty output"));
    }

    info!(
        "Loaded {} model: input {}x{} ({}), {} output classes",
        source.name,
        source.input.size,
        source.input.size,
        source.input.normalization,
        probe.len()
    );

    Ok(OnnxModel {
        name: source.name.clone(),
        input: source.input,
        output_name,
        output_len: probe.len(),
        session: Mutex::new(session),
    })
}

/// Run one forward pass and flatten the first output.
fn forward(
    session: &mut Session,
    output_name: &str,
    tensor: &Tensor,
) -> std::result::Result<Vec<f32>, String> {
    let outputs = match tensor {
        Tensor::Uint8(array) => {
            let data = array.as_slice().ok_or("input tensor is not contiguous")?;
            let input = TensorRef::from_array_view((dims(array.shape()), data))
                .map_err(|e| e.to_string())?;
            session.run(ort::inputs![input])
        }
        Tensor::Float32(array) => {
            let data = array.as_slice().ok_or("input tensor is not contiguous")?;
            let input = TensorRef::from_array_view((dims(array.shape()), data))
                .map_err(|e| e.to_string())?;
            session.run(ort::inputs![input])
        }
    }
    .map_err(|e| e.to_string())?;

    extract_scores(&outputs[output_name])
}

/// Read class scores as `f32`. Quantized `u8` outputs are scaled by 1/255.
fn extract_scores(value: &DynValue) -> std::result::Result<Vec<f32>, String> {
    if let Ok((_, data)) = value.try_extract_tensor::<f32>() {
        Ok(data.to_vec())
    } else if let Ok((_, data)) = value.try_extract_tensor::<u8>() {
        Ok(data.iter().map(|&v| f32::from(v) / 255.0).collect())
    } else {
        Err("unsupported output type (expected f32 or u8)".to_string())
    }
}

fn dims(shape: &[usize]) -> Vec<i64> {
    shape.iter().map(|&d| d as i64).collect()
}

fn asset_error(source: &ModelSource, reason: impl std::fmt::Display) -> Error {
    Error::AssetLoad {
        asset: format!("{} model", source.name),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::preprocess::Normalization;

    #[tokio::test]
    async fn test_load_missing_model_is_asset_error() {
        let source = ModelSource {
            name: "gate".to_string(),
            path: "/nonexistent/model.onnx".into(),
            input: InputSpec {
                size: 224,
                normalization: Normalization::SignedUnit,
            },
        };

        let err = OnnxRuntime.load(&source).await.unwrap_err();
        assert!(err.is_asset_load());
        assert!(err.to_string().contains("gate model"));
    }

    #[test]
    fn test_dims_conversion() {
        assert_eq!(dims(&[1, 224, 224, 3]), vec![1, 224, 224, 3]);
    }
}
