//! Error types for plantid.

use crate::pipeline::{Phase, SessionId};

/// Result type alias for plantid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for plantid.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Model file does not exist.
    #[error("model file does not exist: {path}")]
    ModelFileNotFound {
        /// Path to the missing model file.
        path: std::path::PathBuf,
    },

    /// Labels file does not exist.
    #[error("labels file does not exist: {path}")]
    LabelsFileNotFound {
        /// Path to the missing labels file.
        path: std::path::PathBuf,
    },

    /// A model asset could not be fetched or parsed.
    #[error("failed to load {asset}: {reason}")]
    AssetLoad {
        /// Which asset failed (e.g. "gate model").
        asset: String,
        /// Description of the failure.
        reason: String,
    },

    /// Failed to read a labels file.
    #[error("failed to read labels file '{path}'")]
    LabelsRead {
        /// Path to the labels file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a CSV labels file.
    #[error("failed to parse labels file '{path}'")]
    LabelsParse {
        /// Path to the labels file.
        path: std::path::PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Labels file contained no labels.
    #[error("labels file contains no labels: {path}")]
    EmptyLabels {
        /// Path to the labels file.
        path: std::path::PathBuf,
    },

    /// Failed to open or decode an image file.
    #[error("failed to open image '{path}'")]
    ImageOpen {
        /// Path to the image file.
        path: std::path::PathBuf,
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Image has no pixels (not decoded yet, or empty).
    #[error("image is not ready for classification ({width}x{height})")]
    ImageNotReady {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// Inference requested before the models finished loading.
    #[error("{model} model is not loaded (initialize has not completed)")]
    ModelNotLoaded {
        /// Which model was requested.
        model: String,
    },

    /// Inference failed.
    #[error("inference failed: {reason}")]
    Inference {
        /// Description of the inference failure.
        reason: String,
    },

    /// The referenced session is not the orchestrator's current session.
    #[error("session {session} is not active")]
    SessionNotActive {
        /// The session that was referenced.
        session: SessionId,
    },

    /// The requested operation is not valid in the session's current phase.
    #[error("session {session} cannot do that while in phase {phase}")]
    InvalidTransition {
        /// The session that was referenced.
        session: SessionId,
        /// Phase the session was in.
        phase: Phase,
    },

    /// Failed to serialize a JSON report.
    #[error("failed to serialize JSON output")]
    JsonSerialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Whether this error means a model or label asset could not be loaded.
    pub fn is_asset_load(&self) -> bool {
        matches!(
            self,
            Self::AssetLoad { .. }
                | Self::LabelsRead { .. }
                | Self::LabelsParse { .. }
                | Self::EmptyLabels { .. }
                | Self::ModelFileNotFound { .. }
                | Self::LabelsFileNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_load_classification() {
        let err = Error::EmptyLabels {
            path: "labels.txt".into(),
        };
        assert!(err.is_asset_load());

        let err = Error::Inference {
            reason: "shape mismatch".to_string(),
        };
        assert!(!err.is_asset_load());
    }

    #[test]
    fn test_image_not_ready_message() {
        let err = Error::ImageNotReady {
            width: 0,
            height: 480,
        };
        assert_eq!(
            err.to_string(),
            "image is not ready for classification (0x480)"
        );
    }
}
