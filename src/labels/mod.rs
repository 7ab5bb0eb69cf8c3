//! Label files and output-index alignment.

use crate::constants::PLACEHOLDER_LABEL_PREFIX;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Layout of a labels file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFormat {
    /// One label per line.
    #[default]
    Lines,
    /// `id,label` rows, optional header, quoted fields allowed.
    Csv,
}

/// Class labels aligned to a model's output vector.
///
/// A label set exactly one shorter than the output width means output 0 is a
/// reserved background class; every lookup is then shifted by one. The shift
/// is fixed when the set is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
    offset: usize,
}

impl LabelSet {
    /// Align `labels` against the model's output width.
    pub fn aligned(labels: Vec<String>, output_len: Option<usize>) -> Self {
        let offset = match output_len {
            Some(len) if len == labels.len() => 0,
            Some(len) if len == labels.len() + 1 => {
                debug!("Output has {len} classes for {} labels; index 0 is background", labels.len());
                1
            }
            Some(len) => {
                warn!(
                    "Label count {} does not match output width {len}; unmatched indices get placeholder labels",
                    labels.len()
                );
                0
            }
            None => 0,
        };

        Self { labels, offset }
    }

    /// Label for an output index, or a `class_<index>` placeholder.
    pub fn label_for(&self, index: usize) -> String {
        index
            .checked_sub(self.offset)
            .and_then(|i| self.labels.get(i))
            .cloned()
            .unwrap_or_else(|| format!("{PLACEHOLDER_LABEL_PREFIX}{index}"))
    }

    /// Number of labels (not counting a background class).
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Index shift applied to every lookup.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Read and parse a labels file.
pub async fn load_labels(path: &Path, format: LabelFormat) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::LabelsRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let labels = match format {
        LabelFormat::Lines => parse_lines(&text),
        LabelFormat::Csv => parse_csv(&text, path)?,
    };

    if labels.is_empty() {
        return Err(Error::EmptyLabels {
            path: path.to_path_buf(),
        });
    }

    debug!("Loaded {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Parse a one-label-per-line file. Blank lines are skipped.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `id,label` rows.
///
/// The header row is optional and detected by a non-numeric first field.
/// Labels may contain commas whether or not they are quoted. Row order
/// defines the class index, so a row with an empty label keeps its slot
/// under a `class_<index>` placeholder.
pub fn parse_csv(text: &str, path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut labels = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::LabelsParse {
            path: path.to_path_buf(),
            source: e,
        })?;

        let Some(first) = record.get(0) else {
            continue;
        };
        let id = first.trim_matches('"').trim();

        if row == 0 && id.parse::<u64>().is_err() {
            debug!("Skipping header row in {}", path.display());
            continue;
        }

        let label = if record.len() > 1 {
            record.iter().skip(1).collect::<Vec<_>>().join(",")
        } else {
            first.to_string()
        };

        let label = clean_label(&label);
        if label.is_empty() {
            let placeholder = format!("{PLACEHOLDER_LABEL_PREFIX}{}", labels.len());
            warn!("Empty label in {} row {}; using {placeholder}", path.display(), row + 1);
            labels.push(placeholder);
        } else {
            labels.push(label);
        }
    }

    Ok(labels)
}

fn clean_label(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    trimmed.trim().to_string()
}
