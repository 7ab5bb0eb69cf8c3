//! Plantid - plant species identification from photos.
//!
//! A coarse gate model first decides whether a photo shows a plant; a
//! fine-grained species model then identifies it. Photos the gate rejects
//! can still be identified when the user asks for it.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod gate;
pub mod inference;
pub mod labels;
pub mod output;
pub mod pipeline;
pub mod preprocess;

use clap::Parser;
use cli::{ClassifyArgs, Cli, Command, ConfigAction, ModelsAction};
use config::{
    Config, ModelConfig, config_file_path, load_default_config, save_default_config,
    validate_config, validate_model_files,
};
use inference::{InferenceRuntime, OnnxRuntime};
use labels::{LabelSet, load_labels};
use pipeline::ModelAsset;

pub use error::{Error, Result};

/// Main entry point for the plantid CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.classify.verbose, cli.classify.quiet);

    let mut config = load_default_config()?;
    apply_overrides(&mut config, &cli.classify);
    validate_config(&config)?;

    if let Some(command) = cli.command {
        return handle_command(command, &config);
    }

    if cli.inputs.is_empty() {
        cli::help::print_smart_help(&config);
        return Ok(());
    }

    let runtime = async_runtime()?;
    runtime.block_on(cli::classify::classify_photos(
        &cli.inputs,
        &cli.classify,
        &config,
    ))
}

/// Apply command-line and environment overrides on top of the config file.
pub fn apply_overrides(config: &mut Config, args: &ClassifyArgs) {
    let models = &mut config.models;
    if let Some(path) = &args.gate_model {
        models.gate.path.clone_from(path);
    }
    if let Some(path) = &args.gate_labels {
        models.gate.labels.clone_from(path);
    }
    if let Some(path) = &args.species_model {
        models.species.path.clone_from(path);
    }
    if let Some(path) = &args.species_labels {
        models.species.labels.clone_from(path);
    }
    if let Some(top_k) = args.top_k {
        models.gate.top_k = top_k;
        models.species.top_k = top_k;
    }
    if let Some(min_prob_any) = args.min_prob_any {
        config.gate.min_prob_any = min_prob_any;
    }
    if let Some(min_prob_top) = args.min_prob_top {
        config.gate.min_prob_top = min_prob_top;
    }
}

fn async_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("Failed to create async runtime: {e}"),
    })
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // ORT logging is suppressed unless -v is given.
    let filter_str = if quiet {
        "warn,ort=off".to_string()
    } else {
        match verbose {
            0 => "info,ort=off".to_string(),
            1 => "debug,ort=warn".to_string(),
            2 => "trace,ort=info".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn handle_command(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Config { action } => handle_config_command(action, config),
        Command::Models { action } => handle_models_command(action, config),
    }
}

fn handle_config_command(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = config_file_path()?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                let saved_path = save_default_config(&Config::default())?;
                println!("Created configuration file: {}", saved_path.display());
                println!("\nNext steps:");
                println!("  Edit [models.gate] and [models.species] to point at your model files");
                println!("  plantid models check");
            }
            Ok(())
        }
        ConfigAction::Show => {
            println!("{config:#?}");
            Ok(())
        }
        ConfigAction::Path => {
            let path = config_file_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn handle_models_command(action: ModelsAction, config: &Config) -> Result<()> {
    let models = [("gate", &config.models.gate), ("species", &config.models.species)];

    match action {
        ModelsAction::Check => {
            for (name, model) in models {
                validate_model_files(model)?;
                println!("  {name}: OK");
            }
            Ok(())
        }
        ModelsAction::Load => {
            let runtime = async_runtime()?;
            runtime.block_on(async {
                for (name, model) in models {
                    let summary = describe_model(name, model).await?;
                    println!("  {name}: {summary}");
                }
                Ok::<(), Error>(())
            })
        }
    }
}

/// Load one model and its labels and describe how they line up.
async fn describe_model(name: &str, model: &ModelConfig) -> Result<String> {
    let asset = ModelAsset::from_config(name, model);
    let handle = OnnxRuntime.load(&asset.source).await?;
    let labels = load_labels(&asset.labels, asset.label_format).await?;

    let output_len = OnnxRuntime.output_len(&handle);
    let labels = LabelSet::aligned(labels, output_len);

    let outputs = output_len.map_or_else(|| "unknown".to_string(), |n| n.to_string());
    let mut summary = format!(
        "{outputs} outputs, {} labels, {}px {} input",
        labels.len(),
        asset.source.input.size,
        asset.source.input.normalization
    );
    if labels.offset() > 0 {
        summary.push_str(" (output 0 is background)");
    }
    Ok(summary)
}
