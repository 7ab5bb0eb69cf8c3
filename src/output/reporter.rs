//! Text and JSON rendering of photo reports.

use crate::error::{Error, Result};
use crate::inference::PredictionSet;
use crate::output::{OutputFormat, Outcome, PhotoReport};
use serde::Serialize;
use std::io::Write;

/// Version of the JSON line format.
pub const SPEC_VERSION: &str = "1.0";

/// Writes one report per photo.
pub trait Reporter: Send + Sync {
    /// Write a finished photo report.
    fn report(&self, out: &mut dyn Write, report: &PhotoReport) -> Result<()>;
}

/// Reporter for the requested format.
pub fn reporter_for(format: OutputFormat) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Text => Box::new(TextReporter),
        OutputFormat::Json => Box::new(JsonReporter),
    }
}

/// Human-readable report.
pub struct TextReporter;

impl Reporter for TextReporter {
    fn report(&self, out: &mut dyn Write, report: &PhotoReport) -> Result<()> {
        writeln!(
            out,
            "{} ({}x{})",
            report.path.display(),
            report.width,
            report.height
        )?;

        if let Some(decision) = &report.decision {
            match (&decision.matched, decision.accepted) {
                (Some(matched), true) => writeln!(
                    out,
                    "  Gate: plant ('{}', {})",
                    matched.label,
                    percent(matched.probability)
                )?,
                _ if report.bypassed => writeln!(out, "  Gate: not a plant (bypassed)")?,
                _ => writeln!(out, "  Gate: not a plant")?,
            }
        }
        if let Some(gate) = &report.gate {
            write_predictions(out, gate)?;
        }

        match report.outcome {
            Outcome::Identified => {
                if let Some(species) = &report.species {
                    writeln!(out, "  Species:")?;
                    write_predictions(out, species)?;
                }
            }
            Outcome::Cancelled => writeln!(out, "  Cancelled")?,
            Outcome::Failed => writeln!(
                out,
                "  Failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            )?,
        }

        Ok(())
    }
}

fn write_predictions(out: &mut dyn Write, predictions: &PredictionSet) -> Result<()> {
    for (rank, prediction) in predictions.iter().enumerate() {
        writeln!(
            out,
            "    {}. {:<40} {:>6}",
            rank + 1,
            prediction.label,
            percent(prediction.probability)
        )?;
    }
    Ok(())
}

fn percent(probability: f32) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// One JSON object per line.
pub struct JsonReporter;

#[derive(Serialize)]
struct JsonLine<'a> {
    spec_version: &'static str,
    event: &'static str,
    payload: &'a PhotoReport,
}

impl Reporter for JsonReporter {
    fn report(&self, out: &mut dyn Write, report: &PhotoReport) -> Result<()> {
        let line = JsonLine {
            spec_version: SPEC_VERSION,
            event: "photo_result",
            payload: report,
        };
        serde_json::to_writer(&mut *out, &line)
            .map_err(|source| Error::JsonSerialize { source })?;
        writeln!(out)?;
        Ok(())
    }
}
