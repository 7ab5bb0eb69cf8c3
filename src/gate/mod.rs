//! Plant-likeness gate over a general-purpose classifier's top-K output.
//!
//! The keyword sets and thresholds are data, supplied through [`GateConfig`].
//! Decision order:
//!
//! 1. Strict pass: the first prediction whose label contains a plant keyword
//!    and no negative keyword, with probability `>= min_prob_any`.
//! 2. Fallback pass: the first prediction whose label contains a plant
//!    keyword (negative keywords ignored), accepted if its probability is
//!    `>= min_prob_top`.
//! 3. Otherwise reject.

use crate::inference::{PredictionSet, RankedPrediction};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Keyword sets and thresholds for the gate heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    plant_keywords: BTreeSet<String>,
    negative_keywords: BTreeSet<String>,
    min_prob_any: f32,
    min_prob_top: f32,
}

impl GateConfig {
    /// Build a configuration. Keywords are lowercased; blank ones are dropped.
    pub fn new<'a>(
        plant_keywords: impl IntoIterator<Item = &'a str>,
        negative_keywords: impl IntoIterator<Item = &'a str>,
        min_prob_any: f32,
        min_prob_top: f32,
    ) -> Self {
        Self {
            plant_keywords: normalize(plant_keywords),
            negative_keywords: normalize(negative_keywords),
            min_prob_any,
            min_prob_top,
        }
    }

    /// Plant keywords (lowercase).
    pub fn plant_keywords(&self) -> &BTreeSet<String> {
        &self.plant_keywords
    }

    /// Negative keywords (lowercase).
    pub fn negative_keywords(&self) -> &BTreeSet<String> {
        &self.negative_keywords
    }

    /// Strict-pass threshold.
    pub fn min_prob_any(&self) -> f32 {
        self.min_prob_any
    }

    /// Fallback-pass threshold.
    pub fn min_prob_top(&self) -> f32 {
        self.min_prob_top
    }

    fn is_plant_like(&self, label: &str) -> bool {
        self.plant_keywords.iter().any(|k| label.contains(k.as_str()))
    }

    fn is_excluded(&self, label: &str) -> bool {
        self.negative_keywords
            .iter()
            .any(|k| label.contains(k.as_str()))
    }
}

fn normalize<'a>(keywords: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Outcome of the gate heuristic for one prediction set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDecision {
    /// Whether the photo looks like a plant.
    pub accepted: bool,
    /// The prediction that caused acceptance.
    pub matched: Option<RankedPrediction>,
}

impl GateDecision {
    fn accept(prediction: &RankedPrediction) -> Self {
        Self {
            accepted: true,
            matched: Some(prediction.clone()),
        }
    }

    fn reject() -> Self {
        Self {
            accepted: false,
            matched: None,
        }
    }
}

/// Decide whether a gate prediction set looks like a plant.
pub fn decide(predictions: &PredictionSet, config: &GateConfig) -> GateDecision {
    let labels: Vec<String> = predictions.iter().map(|p| p.label.to_lowercase()).collect();

    let strict = predictions.iter().zip(&labels).find(|(p, label)| {
        !config.is_excluded(label)
            && config.is_plant_like(label)
            && p.probability >= config.min_prob_any
    });
    if let Some((prediction, _)) = strict {
        debug!(
            "Gate accepted '{}' ({:.3}) in strict pass",
            prediction.label, prediction.probability
        );
        return GateDecision::accept(prediction);
    }

    let fallback = predictions
        .iter()
        .zip(&labels)
        .find(|(_, label)| config.is_plant_like(label));
    if let Some((prediction, _)) = fallback
        && prediction.probability >= config.min_prob_top
    {
        debug!(
            "Gate accepted '{}' ({:.3}) in fallback pass",
            prediction.label, prediction.probability
        );
        return GateDecision::accept(prediction);
    }

    debug!(
        "Gate rejected; top prediction '{}' ({:.3})",
        predictions.top_label(),
        predictions.top_probability()
    );
    GateDecision::reject()
}
