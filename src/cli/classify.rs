//! Classify photos from the command line.

use crate::cli::{ClassifyArgs, OnReject};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::inference::{InferenceRuntime, OnnxRuntime};
use crate::output::{Outcome, PhotoReport, reporter_for};
use crate::pipeline::{GateChoice, Orchestrator, PipelineAssets, SessionEvent};
use image::DynamicImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Classify each photo in turn and write one report per photo to stdout.
///
/// Photos that cannot be decoded or classified are reported and skipped.
pub async fn classify_photos(inputs: &[PathBuf], args: &ClassifyArgs, config: &Config) -> Result<()> {
    let orchestrator = Orchestrator::new(
        OnnxRuntime,
        PipelineAssets::from_config(&config.models),
        config.gate.to_gate_config(),
    );
    orchestrator.initialize().await?;

    let reporter = reporter_for(args.format);
    let mut failures = 0usize;

    for path in inputs {
        let image = match open_image(path).await {
            Ok(image) => image,
            Err(e) => {
                error!("Skipping {}: {e}", path.display());
                failures += 1;
                continue;
            }
        };

        let report = classify_photo(&orchestrator, path, image, args.on_reject).await?;
        if report.outcome == Outcome::Failed {
            failures += 1;
        }
        reporter.report(&mut std::io::stdout().lock(), &report)?;
    }

    info!(
        "Complete: {} photo(s), {} failed",
        inputs.len(),
        failures
    );
    if failures > 0 {
        warn!("{failures} photo(s) could not be classified");
    }

    Ok(())
}

/// Run one photo through the orchestrator and collect its events.
///
/// # Errors
///
/// Returns an error when the photo cannot be submitted or a gate rejection
/// cannot be resolved. Failures inside the session end up in the report.
pub async fn classify_photo<R: InferenceRuntime>(
    orchestrator: &Orchestrator<R>,
    path: &Path,
    image: DynamicImage,
    on_reject: OnReject,
) -> Result<PhotoReport> {
    let mut report = PhotoReport::new(path.to_path_buf(), image.width(), image.height());
    let mut session = orchestrator.submit_photo(image)?;

    while let Some(event) = session.next_event().await {
        match event {
            SessionEvent::GateEvaluated {
                predictions,
                decision,
            } => {
                report.gate = Some(predictions);
                report.decision = Some(decision);
            }
            SessionEvent::AwaitingUserChoice => {
                let choice = match on_reject {
                    OnReject::Prompt => prompt_continue(path, &report).await?,
                    OnReject::Bypass => GateChoice::Bypass,
                    OnReject::Cancel => GateChoice::Cancel,
                };
                orchestrator.resolve_gate_rejection(session.id(), choice)?;
            }
            SessionEvent::SpeciesIdentified {
                predictions,
                bypassed,
            } => {
                report.species = Some(predictions);
                report.bypassed = bypassed;
                report.outcome = Outcome::Identified;
            }
            SessionEvent::Cancelled => report.outcome = Outcome::Cancelled,
            SessionEvent::Failed(e) => {
                report.outcome = Outcome::Failed;
                report.error = Some(e.to_string());
            }
        }
    }

    if report.outcome == Outcome::Failed && report.error.is_none() {
        report.error = Some("session ended without a result".to_string());
    }

    Ok(report)
}

async fn open_image(path: &Path) -> Result<DynamicImage> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        image::open(&owned).map_err(|source| Error::ImageOpen {
            path: owned.clone(),
            source,
        })
    })
    .await
    .map_err(|e| Error::Internal {
        message: format!("image decode task failed: {e}"),
    })?
}

/// Ask on the terminal whether to identify a rejected photo anyway.
///
/// The question goes to stderr so JSON on stdout stays parseable.
async fn prompt_continue(path: &Path, report: &PhotoReport) -> Result<GateChoice> {
    let top = report
        .gate
        .as_ref()
        .map(|gate| gate.top_label().to_string())
        .unwrap_or_default();
    let question = format!(
        "{} does not look like a plant (best guess: {top}). Continue anyway? [y/N] ",
        path.display()
    );

    tokio::task::spawn_blocking(move || -> Result<GateChoice> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{question}")?;
        stderr.flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok(parse_answer(&answer))
    })
    .await
    .map_err(|e| Error::Internal {
        message: format!("prompt task failed: {e}"),
    })?
}

fn parse_answer(answer: &str) -> GateChoice {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        GateChoice::Bypass
    } else {
        GateChoice::Cancel
    }
}
