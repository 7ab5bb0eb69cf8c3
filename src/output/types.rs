//! Report types shared by the output formats.

use crate::gate::GateDecision;
use crate::inference::PredictionSet;
use serde::Serialize;
use std::path::PathBuf;

/// How results are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per photo (NDJSON).
    Json,
}

/// How a photo's session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Species predictions were produced.
    Identified,
    /// The gate rejected the photo and the user cancelled.
    Cancelled,
    /// The photo could not be classified.
    Failed,
}

/// Everything learned about one photo.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoReport {
    /// Source file.
    pub path: PathBuf,
    /// Photo width in pixels.
    pub width: u32,
    /// Photo height in pixels.
    pub height: u32,
    /// How the session ended.
    pub outcome: Outcome,
    /// Gate model top-K.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<PredictionSet>,
    /// Gate decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<GateDecision>,
    /// Whether the user bypassed a rejection.
    pub bypassed: bool,
    /// Species model top-K.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<PredictionSet>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhotoReport {
    /// Empty report for a photo; fields are filled in as events arrive.
    pub fn new(path: PathBuf, width: u32, height: u32) -> Self {
        Self {
            path,
            width,
            height,
            outcome: Outcome::Failed,
            gate: None,
            decision: None,
            bypassed: false,
            species: None,
            error: None,
        }
    }
}
