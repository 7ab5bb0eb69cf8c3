//! Image preprocessing for classifier input.
//!
//! Every model sees the same geometry: the largest centered square of the
//! photo, resampled to the model's input size. Only the value range differs.

use crate::constants::{CHANNELS, pixel};
use crate::error::{Error, Result};
use crate::inference::Tensor;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Value range expected by a model's input tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Raw channel values in [0, 255], fed as `u8` (quantized models).
    #[default]
    Uint8,
    /// `(v - 127.5) / 127.5`, mapping to [-1, 1].
    SignedUnit,
    /// `v / 255`, mapping to [0, 1].
    Unit,
}

impl Normalization {
    /// Apply this normalization to a single channel value.
    pub fn apply(self, value: f32) -> f32 {
        match self {
            Self::Uint8 => value,
            Self::SignedUnit => (value - pixel::MIDPOINT) / pixel::MIDPOINT,
            Self::Unit => value / pixel::MAX,
        }
    }
}

impl std::fmt::Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uint8 => write!(f, "uint8"),
            Self::SignedUnit => write!(f, "signed_unit"),
            Self::Unit => write!(f, "unit"),
        }
    }
}

/// Input contract of a model: square side length and value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    /// Side of the square input in pixels.
    pub size: u32,
    /// Value range of the input tensor.
    pub normalization: Normalization,
}

impl InputSpec {
    /// Tensor shape `[1, size, size, 3]`.
    pub fn shape(self) -> [usize; 4] {
        let side = self.size as usize;
        [1, side, side, CHANNELS]
    }
}

/// Square region of the source image fed to the resampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    /// Left offset in pixels.
    pub x: u32,
    /// Top offset in pixels.
    pub y: u32,
    /// Side length in pixels.
    pub side: u32,
}

/// Largest square centered in a `width` x `height` image.
pub fn center_square(width: u32, height: u32) -> CropRegion {
    let side = width.min(height);
    CropRegion {
        x: (width - side) / 2,
        y: (height - side) / 2,
        side,
    }
}

/// Convert a decoded image into a `[1, size, size, 3]` tensor.
///
/// The scratch RGB buffer lives only for this call; the returned tensor is
/// owned by the caller.
pub fn preprocess(image: &DynamicImage, spec: InputSpec) -> Result<Tensor> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::ImageNotReady { width, height });
    }

    let crop = center_square(width, height);
    trace!(
        "Cropping {}x{} at ({}, {}) from {}x{}, resizing to {}",
        crop.side, crop.side, crop.x, crop.y, width, height, spec.size
    );

    let rgb = image
        .crop_imm(crop.x, crop.y, crop.side, crop.side)
        .resize_exact(spec.size, spec.size, FilterType::Triangle)
        .to_rgb8();

    let shape = spec.shape();
    let raw = rgb.into_raw();

    let tensor = match spec.normalization {
        Normalization::Uint8 => Tensor::Uint8(to_array(shape, raw)?),
        normalization => {
            let values = raw
                .into_iter()
                .map(|v| normalization.apply(f32::from(v)))
                .collect();
            Tensor::Float32(to_array(shape, values)?)
        }
    };

    Ok(tensor)
}

fn to_array<T>(shape: [usize; 4], values: Vec<T>) -> Result<Array4<T>> {
    Array4::from_shape_vec(shape, values).map_err(|e| Error::Internal {
        message: format!("preprocessed buffer does not match {shape:?}: {e}"),
    })
}
