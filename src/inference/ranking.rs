//! Top-K ranking of class probabilities.

use crate::constants::NO_LABEL;
use crate::labels::LabelSet;
use serde::Serialize;

/// One labeled class with its probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPrediction {
    /// Index into the model output.
    pub index: usize,
    /// Resolved class label.
    pub label: String,
    /// Probability in [0, 1].
    pub probability: f32,
}

/// Predictions ordered by descending probability.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PredictionSet(Vec<RankedPrediction>);

impl PredictionSet {
    /// Wrap predictions that are already sorted.
    pub fn new(predictions: Vec<RankedPrediction>) -> Self {
        Self(predictions)
    }

    /// Highest-probability prediction.
    pub fn top(&self) -> Option<&RankedPrediction> {
        self.0.first()
    }

    /// Label of the best prediction, or a dash when empty.
    pub fn top_label(&self) -> &str {
        self.top().map_or(NO_LABEL, |p| p.label.as_str())
    }

    /// Probability of the best prediction, or zero when empty.
    pub fn top_probability(&self) -> f32 {
        self.top().map_or(0.0, |p| p.probability)
    }

    /// Iterate in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, RankedPrediction> {
        self.0.iter()
    }

    /// Number of predictions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a PredictionSet {
    type Item = &'a RankedPrediction;
    type IntoIter = std::slice::Iter<'a, RankedPrediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Select and label the `k` most probable classes.
///
/// Ties are broken by ascending index so results are deterministic.
pub fn rank(probabilities: &[f32], labels: &LabelSet, k: usize) -> PredictionSet {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    indexed.truncate(k);

    PredictionSet(
        indexed
            .into_iter()
            .map(|(index, probability)| RankedPrediction {
                index,
                label: labels.label_for(index),
                probability,
            })
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn labels(names: &[&str], output_len: usize) -> LabelSet {
        LabelSet::aligned(
            names.iter().map(|s| (*s).to_string()).collect(),
            Some(output_len),
        )
    }

    #[test]
    fn test_rank_orders_by_probability() {
        let set = rank(&[0.1, 0.6, 0.3], &labels(&["a", "b", "c"], 3), 2);
        let got: Vec<_> = set.iter().map(|p| (p.index, p.label.as_str())).collect();
        assert_eq!(got, vec![(1, "b"), (2, "c")]);
        assert_eq!(set.top_label(), "b");
        assert_eq!(set.top_probability(), 0.6);
    }

    #[test]
    fn test_rank_ties_prefer_lower_index() {
        let set = rank(&[0.2, 0.4, 0.4, 0.0], &labels(&["a", "b", "c", "d"], 4), 3);
        let indices: Vec<_> = set.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 0]);
    }

    #[test]
    fn test_rank_applies_background_offset() {
        // Four outputs, three labels: output 0 is background.
        let set = rank(&[0.05, 0.1, 0.8, 0.05], &labels(&["a", "b", "c"], 4), 1);
        let top = set.top().map(|p| (p.index, p.label.clone()));
        assert_eq!(top, Some((2, "b".to_string())));
    }

    #[test]
    fn test_rank_unresolvable_index_uses_placeholder() {
        let set = rank(&[0.1, 0.9], &labels(&["a"], 5), 1);
        assert_eq!(set.top_label(), "class_1");
    }

    #[test]
    fn test_rank_k_larger_than_output() {
        let set = rank(&[0.5, 0.5], &labels(&["a", "b"], 2), 10);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_set_summary() {
        let set = PredictionSet::default();
        assert_eq!(set.top_label(), "—");
        assert_eq!(set.top_probability(), 0.0);
    }
}
