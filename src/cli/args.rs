//! CLI argument definitions.

use super::validators::{parse_probability, parse_top_k};
use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Identify plant species in photos, rejecting photos that are not plants.
#[derive(Debug, Parser)]
#[command(name = "plantid")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Photos to classify.
    pub inputs: Vec<PathBuf>,

    /// Common options for classification.
    #[command(flatten)]
    pub classify: ClassifyArgs,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage models.
    Models {
        /// Models action to perform.
        #[command(subcommand)]
        action: ModelsAction,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Models subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ModelsAction {
    /// Verify model and label files exist.
    Check,
    /// Load both models and their labels, then report their sizes.
    Load,
}

/// What to do when the gate says a photo is not a plant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OnReject {
    /// Ask "Continue anyway? [y/N]" on the terminal.
    #[default]
    Prompt,
    /// Identify the species anyway.
    Bypass,
    /// Skip the photo.
    Cancel,
}

/// Arguments for classifying photos.
#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// How to resolve a gate rejection.
    #[arg(long, value_enum, default_value_t = OnReject::Prompt, env = "PLANTID_ON_REJECT")]
    pub on_reject: OnReject,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, env = "PLANTID_FORMAT")]
    pub format: OutputFormat,

    /// Number of predictions to keep for both models (overrides config).
    #[arg(short = 'k', long, value_parser = parse_top_k)]
    pub top_k: Option<usize>,

    /// Path to the gate ONNX model (overrides config).
    #[arg(long, env = "PLANTID_GATE_MODEL")]
    pub gate_model: Option<PathBuf>,

    /// Path to the gate labels file (overrides config).
    #[arg(long, env = "PLANTID_GATE_LABELS")]
    pub gate_labels: Option<PathBuf>,

    /// Path to the species ONNX model (overrides config).
    #[arg(long, env = "PLANTID_SPECIES_MODEL")]
    pub species_model: Option<PathBuf>,

    /// Path to the species labels file (overrides config).
    #[arg(long, env = "PLANTID_SPECIES_LABELS")]
    pub species_labels: Option<PathBuf>,

    /// Strict-pass gate threshold (0.0-1.0, overrides config).
    #[arg(long, value_parser = parse_probability)]
    pub min_prob_any: Option<f32>,

    /// Fallback-pass gate threshold (0.0-1.0, overrides config).
    #[arg(long, value_parser = parse_probability)]
    pub min_prob_top: Option<f32>,

    /// Only log warnings and errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace+ORT info, -vvv: full trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
