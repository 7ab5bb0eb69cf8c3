//! Help message display for CLI.

#![allow(clippy::print_stdout)]

use crate::config::{Config, validate_model_files};

/// Print help message based on whether the model assets are in place.
pub fn print_smart_help(config: &Config) {
    if models_present(config) {
        print_configured_help();
    } else {
        print_first_time_help();
    }
}

fn models_present(config: &Config) -> bool {
    validate_model_files(&config.models.gate).is_ok()
        && validate_model_files(&config.models.species).is_ok()
}

/// Print setup guide for users without model files.
pub fn print_first_time_help() {
    println!("Model files not found. Get started with plantid:");
    println!();
    println!("1. Initialize configuration:");
    println!("   plantid config init");
    println!();
    println!("2. Point [models.gate] and [models.species] at your ONNX models and labels:");
    println!("   plantid config path");
    println!();
    println!("   The gate is a general-purpose image classifier (e.g. MobileNet v2 on ImageNet)");
    println!("   with one label per line. The species model takes a CSV labels file (id,label).");
    println!();
    println!("3. Verify the assets:");
    println!("   plantid models check");
    println!();
    println!("4. Classify photos:");
    println!("   plantid leaf.jpg");
    println!();
    println!("Run 'plantid -h' for all options.");
}

/// Print brief usage reminder for configured users.
pub fn print_configured_help() {
    println!("Usage: plantid [IMAGES]... [OPTIONS]");
    println!();
    println!("Example: plantid leaf.jpg --on-reject bypass --format json");
    println!();
    println!("Run 'plantid -h' for all options.");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ModelsConfig;
    use std::path::PathBuf;

    #[test]
    fn test_missing_assets_trigger_first_time_help() {
        let mut config = Config::default();
        config.models.gate.path = PathBuf::from("/nonexistent/gate.onnx");
        assert!(!models_present(&config));
    }

    #[test]
    fn test_present_assets_trigger_configured_help() {
        let dir = tempfile::tempdir().unwrap();
        let mut models = ModelsConfig::default();
        for (name, model) in [("gate", &mut models.gate), ("species", &mut models.species)] {
            model.path = dir.path().join(format!("{name}.onnx"));
            model.labels = dir.path().join(format!("{name}.txt"));
            std::fs::write(&model.path, b"onnx").unwrap();
            std::fs::write(&model.labels, b"label").unwrap();
        }
        let config = Config {
            models,
            ..Default::default()
        };
        assert!(models_present(&config));
    }
}
