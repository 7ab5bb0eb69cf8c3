//! Configuration validation.

use crate::config::{Config, GateSettings, ModelConfig};
use crate::constants::probability;
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_model("gate", &config.models.gate)?;
    validate_model("species", &config.models.species)?;
    validate_gate(&config.gate)?;
    Ok(())
}

/// Validate the numeric settings of one model.
fn validate_model(name: &str, model: &ModelConfig) -> Result<()> {
    if model.top_k == 0 {
        return Err(Error::ConfigValidation {
            message: format!("models.{name}.top_k must be at least 1"),
        });
    }

    if model.input_size == 0 {
        return Err(Error::ConfigValidation {
            message: format!("models.{name}.input_size must be at least 1"),
        });
    }

    Ok(())
}

/// Validate the gate heuristic settings.
fn validate_gate(gate: &GateSettings) -> Result<()> {
    for (field, value) in [
        ("min_prob_any", gate.min_prob_any),
        ("min_prob_top", gate.min_prob_top),
    ] {
        if !(probability::MIN..=probability::MAX).contains(&value) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "gate.{field} must be between {} and {}, got {value}",
                    probability::MIN,
                    probability::MAX
                ),
            });
        }
    }

    if gate.plant_keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(Error::ConfigValidation {
            message: "gate.plant_keywords must contain at least one keyword".to_string(),
        });
    }

    Ok(())
}

/// Check that a model's files exist on disk.
pub fn validate_model_files(model: &ModelConfig) -> Result<()> {
    if !model.path.exists() {
        return Err(Error::ModelFileNotFound {
            path: model.path.clone(),
        });
    }

    if !model.labels.exists() {
        return Err(Error::LabelsFileNotFound {
            path: model.labels.clone(),
        });
    }

    Ok(())
}
