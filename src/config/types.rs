//! Configuration type definitions.

use crate::constants::{
    DEFAULT_GATE_TOP_K, DEFAULT_INPUT_SIZE, DEFAULT_SPECIES_TOP_K, assets, gate,
};
use crate::gate::GateConfig;
use crate::labels::LabelFormat;
use crate::preprocess::Normalization;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model assets for both pipeline stages.
    pub models: ModelsConfig,

    /// Plant-likeness heuristic applied to the gate model output.
    pub gate: GateSettings,
}

/// The two models used by the pipeline.
///
/// Fields left out of a `[models.gate]` or `[models.species]` section take
/// that section's own defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ModelsFile")]
pub struct ModelsConfig {
    /// Coarse general-purpose classifier used to reject non-plant photos.
    pub gate: ModelConfig,

    /// Fine-grained species classifier.
    pub species: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            gate: ModelConfig {
                path: PathBuf::from(assets::GATE_MODEL),
                labels: PathBuf::from(assets::GATE_LABELS),
                label_format: LabelFormat::Lines,
                input_size: DEFAULT_INPUT_SIZE,
                normalization: Normalization::SignedUnit,
                top_k: DEFAULT_GATE_TOP_K,
            },
            species: ModelConfig {
                path: PathBuf::from(assets::SPECIES_MODEL),
                labels: PathBuf::from(assets::SPECIES_LABELS),
                label_format: LabelFormat::Csv,
                input_size: DEFAULT_INPUT_SIZE,
                normalization: Normalization::Uint8,
                top_k: DEFAULT_SPECIES_TOP_K,
            },
        }
    }
}

/// Configuration for a single model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelConfig {
    /// Path to the ONNX model file.
    pub path: PathBuf,

    /// Path to the labels file.
    pub labels: PathBuf,

    /// Layout of the labels file.
    pub label_format: LabelFormat,

    /// Square input size expected by the model.
    pub input_size: u32,

    /// Pixel normalization expected by the model.
    pub normalization: Normalization,

    /// Number of ranked predictions to keep.
    pub top_k: usize,
}

/// `[models]` as written in the config file.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ModelsFile {
    gate: ModelSection,
    species: ModelSection,
}

/// One model section with every field optional.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ModelSection {
    path: Option<PathBuf>,
    labels: Option<PathBuf>,
    label_format: Option<LabelFormat>,
    input_size: Option<u32>,
    normalization: Option<Normalization>,
    top_k: Option<usize>,
}

impl ModelSection {
    fn over(self, defaults: ModelConfig) -> ModelConfig {
        ModelConfig {
            path: self.path.unwrap_or(defaults.path),
            labels: self.labels.unwrap_or(defaults.labels),
            label_format: self.label_format.unwrap_or(defaults.label_format),
            input_size: self.input_size.unwrap_or(defaults.input_size),
            normalization: self.normalization.unwrap_or(defaults.normalization),
            top_k: self.top_k.unwrap_or(defaults.top_k),
        }
    }
}

impl From<ModelsFile> for ModelsConfig {
    fn from(file: ModelsFile) -> Self {
        let defaults = Self::default();
        Self {
            gate: file.gate.over(defaults.gate),
            species: file.species.over(defaults.species),
        }
    }
}

/// Gate heuristic settings as stored in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Label fragments that mark a class as plant-like.
    pub plant_keywords: Vec<String>,

    /// Label fragments that disqualify a class in the strict pass.
    pub negative_keywords: Vec<String>,

    /// Minimum probability for the strict pass.
    pub min_prob_any: f32,

    /// Minimum probability for the fallback pass.
    pub min_prob_top: f32,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            plant_keywords: gate::PLANT_KEYWORDS.iter().map(|s| (*s).to_string()).collect(),
            negative_keywords: gate::NEGATIVE_KEYWORDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            min_prob_any: gate::MIN_PROB_ANY,
            min_prob_top: gate::MIN_PROB_TOP,
        }
    }
}

impl GateSettings {
    /// Build the engine configuration from these settings.
    pub fn to_gate_config(&self) -> GateConfig {
        GateConfig::new(
            self.plant_keywords.iter().map(String::as_str),
            self.negative_keywords.iter().map(String::as_str),
            self.min_prob_any,
            self.min_prob_top,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_match_deployment() {
        let models = ModelsConfig::default();
        assert_eq!(models.gate.normalization, Normalization::SignedUnit);
        assert_eq!(models.gate.label_format, LabelFormat::Lines);
        assert_eq!(models.gate.top_k, 5);
        assert_eq!(models.species.normalization, Normalization::Uint8);
        assert_eq!(models.species.label_format, LabelFormat::Csv);
        assert_eq!(models.species.top_k, 3);
    }

    #[test]
    fn test_partial_species_section_keeps_species_defaults() {
        let models: ModelsConfig = toml::from_str(
            r#"
[species]
path = "/opt/plants/model.onnx"
labels = "/opt/plants/labels.csv"
"#,
        )
        .unwrap();

        assert_eq!(models.species.path, PathBuf::from("/opt/plants/model.onnx"));
        assert_eq!(models.species.label_format, LabelFormat::Csv);
        assert_eq!(models.species.normalization, Normalization::Uint8);
        assert_eq!(models.species.top_k, 3);
        assert_eq!(models.species.input_size, 224);
        assert_eq!(models.gate.label_format, LabelFormat::Lines);
        assert_eq!(models.gate.normalization, Normalization::SignedUnit);
    }

    #[test]
    fn test_default_gate_settings() {
        let settings = GateSettings::default();
        assert_eq!(settings.min_prob_any, 0.18);
        assert_eq!(settings.min_prob_top, 0.12);
        assert!(settings.plant_keywords.iter().any(|k| k == "daisy"));
        assert!(settings.negative_keywords.iter().any(|k| k == "coral"));
    }

    #[test]
    fn test_gate_settings_keywords_are_lowercased() {
        let settings = GateSettings {
            plant_keywords: vec!["Daisy".to_string()],
            negative_keywords: vec!["CORAL".to_string()],
            min_prob_any: 0.2,
            min_prob_top: 0.1,
        };
        let config = settings.to_gate_config();
        assert!(config.plant_keywords().contains("daisy"));
        assert!(config.negative_keywords().contains("coral"));
    }
}
