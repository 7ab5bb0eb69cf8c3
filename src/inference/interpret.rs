//! Output interpretation: raw model output to a probability distribution.
//!
//! Export pipelines emit either post-softmax probabilities or raw logits and
//! the model files carry no marker saying which. A vector whose elements all
//! lie in [0, 1] (with a small tolerance) and whose sum is close to 1 is taken
//! as-is; anything else goes through softmax.
//!
//! A logits vector that happens to satisfy both conditions is misread as a
//! distribution. That failure mode is accepted.

use crate::constants::probability;
use crate::inference::RawOutput;

/// Whether `values` already look like a probability distribution.
pub fn looks_like_probabilities(values: &[f32]) -> bool {
    let low = -probability::ELEMENT_TOLERANCE;
    let high = probability::MAX + probability::ELEMENT_TOLERANCE;

    let mut sum = 0.0_f64;
    for &v in values {
        if !(low..=high).contains(&v) {
            return false;
        }
        sum += f64::from(v);
    }

    (f64::from(probability::SUM_MIN)..=f64::from(probability::SUM_MAX)).contains(&sum)
}

/// Turn raw model output into probabilities.
pub fn interpret(raw: &RawOutput) -> Vec<f32> {
    let values = raw.values();
    if looks_like_probabilities(values) {
        values
            .iter()
            .map(|v| v.clamp(probability::MIN, probability::MAX))
            .collect()
    } else {
        softmax(values)
    }
}

/// Numerically stable softmax.
pub fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return uniform(values.len());
    }

    let exps: Vec<f64> = values
        .iter()
        .map(|&v| (f64::from(v) - f64::from(max)).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    // NaN scores survive the max fold and poison the sum.
    if !sum.is_finite() || sum <= 0.0 {
        return uniform(values.len());
    }

    #[allow(clippy::cast_possible_truncation)]
    exps.into_iter().map(|e| (e / sum) as f32).collect()
}

#[allow(clippy::cast_precision_loss)]
fn uniform(len: usize) -> Vec<f32> {
    if len == 0 {
        return Vec::new();
    }
    vec![1.0 / len as f32; len]
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn argmax(values: &[f32]) -> usize {
        values
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                if v > best.1 { (i, v) } else { best }
            })
            .0
    }

    #[test]
    fn test_probabilities_pass_through_unchanged() {
        let raw = RawOutput(vec![0.7, 0.2, 0.1]);
        assert_eq!(interpret(&raw), vec![0.7, 0.2, 0.1]);
    }

    #[test]
    fn test_sum_within_tolerance_passes_through() {
        let raw = RawOutput(vec![0.5, 0.49]);
        assert_eq!(interpret(&raw), vec![0.5, 0.49]);
    }

    #[test]
    fn test_small_negative_is_clamped() {
        let raw = RawOutput(vec![1.0005, -0.0005, 0.0]);
        assert_eq!(interpret(&raw), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_logits_are_softmaxed() {
        let logits = vec![2.0, -1.0, 0.5, 3.5, -7.0];
        let probs = interpret(&RawOutput(logits.clone()));

        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|p| *p > 0.0));
        assert_eq!(argmax(&probs), argmax(&logits));
    }

    #[test]
    fn test_large_logits_are_stable() {
        let probs = softmax(&[1000.0, 999.0, 998.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn test_sum_outside_band_is_softmaxed() {
        // Every value is in [0, 1] but they sum to 1.5.
        let probs = interpret(&RawOutput(vec![0.5, 0.5, 0.5]));
        for p in &probs {
            assert!((p - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_nan_scores_fall_back_to_uniform() {
        let probs = interpret(&RawOutput(vec![2.0, f32::NAN, 1.0, 0.5]));
        assert_eq!(probs, vec![0.25; 4]);
    }

    #[test]
    fn test_detection_rules() {
        assert!(looks_like_probabilities(&[0.98]));
        assert!(looks_like_probabilities(&[0.51, 0.51]));
        assert!(!looks_like_probabilities(&[0.97]));
        assert!(!looks_like_probabilities(&[1.5, -0.5]));
        assert!(!looks_like_probabilities(&[]));
    }

    #[test]
    fn test_empty_output() {
        assert!(interpret(&RawOutput(Vec::new())).is_empty());
    }
}
