//! Evaluation results and the ordering used to pick the best draft.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::query::SCORE_SCALE_MAX;

/// One evaluator's verdict on one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Evaluator identifier (e.g. `"quality"`, `"standards"`).
    pub evaluator: String,
    /// Score on the 0-10 scale.
    pub score: f64,
    /// Feedback text for the reviser.
    pub feedback: String,
    /// Concrete improvement suggestions.
    #[serde(default)]
    pub improvements: Vec<String>,
    /// Whether `score` reached the configured threshold.
    pub passed: bool,
    /// Whether the evaluator call itself failed.
    #[serde(default)]
    pub failed: bool,
}

impl EvaluationResult {
    /// Builds a result, clamping the score into range and applying `threshold`.
    #[must_use]
    pub fn scored(
        evaluator: impl Into<String>,
        score: f64,
        feedback: impl Into<String>,
        improvements: Vec<String>,
        threshold: f64,
    ) -> Self {
        let score = clamp_score(score);
        Self {
            evaluator: evaluator.into(),
            score,
            feedback: feedback.into(),
            improvements,
            passed: score >= threshold,
            failed: false,
        }
    }

    /// Conservative failing result for an evaluator that could not run.
    #[must_use]
    pub fn unavailable(evaluator: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            evaluator: evaluator.into(),
            score: 0.0,
            feedback: format!("Evaluation unavailable ({reason}); treated as failing."),
            improvements: Vec::new(),
            passed: false,
            failed: true,
        }
    }
}

/// Clamps a raw score into `0..=10`; `NaN` becomes 0.
#[must_use]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, SCORE_SCALE_MAX)
    }
}

/// Session pass condition: every evaluator passed.
///
/// An empty set never passes.
#[must_use]
pub fn all_passed(evaluations: &[EvaluationResult]) -> bool {
    !evaluations.is_empty() && evaluations.iter().all(|e| e.passed && !e.failed)
}

/// Aggregate used to compare drafts: worst dimension first, then mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Lowest evaluator score.
    pub min: f64,
    /// Mean evaluator score.
    pub mean: f64,
}

impl ScoreSummary {
    /// Summarizes an evaluation set. An empty set scores zero.
    #[must_use]
    pub fn of(evaluations: &[EvaluationResult]) -> Self {
        if evaluations.is_empty() {
            return Self { min: 0.0, mean: 0.0 };
        }
        let min = evaluations
            .iter()
            .map(|e| e.score)
            .fold(f64::INFINITY, f64::min);
        #[allow(clippy::cast_precision_loss)]
        let mean = evaluations.iter().map(|e| e.score).sum::<f64>() / evaluations.len() as f64;
        Self { min, mean }
    }

    /// Compares by `min`, then `mean`.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.min
            .total_cmp(&other.min)
            .then_with(|| self.mean.total_cmp(&other.mean))
    }

    /// Strictly better than `other`.
    #[must_use]
    pub fn beats(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eval(name: &str, score: f64) -> EvaluationResult {
        EvaluationResult::scored(name, score, "", Vec::new(), 8.5)
    }

    #[test]
    fn test_worst_dimension_wins() {
        // {quality: 7, standards: 9} beats {quality: 9, standards: 6}
        let first = ScoreSummary::of(&[eval("quality", 7.0), eval("standards", 9.0)]);
        let second = ScoreSummary::of(&[eval("quality", 9.0), eval("standards", 6.0)]);
        assert!(first.beats(&second));
        assert!(!second.beats(&first));
    }

    #[test]
    fn test_mean_breaks_min_tie() {
        let a = ScoreSummary::of(&[eval("quality", 7.0), eval("standards", 9.0)]);
        let b = ScoreSummary::of(&[eval("quality", 7.0), eval("standards", 8.0)]);
        assert!(a.beats(&b));
    }

    #[test]
    fn test_equal_does_not_beat() {
        let a = ScoreSummary::of(&[eval("quality", 8.0)]);
        assert!(!a.beats(&a));
    }

    #[test]
    fn test_unavailable_fails() {
        let e = EvaluationResult::unavailable("standards", "timeout");
        assert!(e.failed);
        assert!(!e.passed);
        assert!(!all_passed(&[eval("quality", 9.5), e]));
    }

    #[test]
    fn test_empty_set_never_passes() {
        assert!(!all_passed(&[]));
    }

    #[test]
    fn test_clamp() {
        assert!((clamp_score(f64::NAN)).abs() < f64::EPSILON);
        assert!((clamp_score(12.0) - 10.0).abs() < f64::EPSILON);
        assert!((clamp_score(-1.0)).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_pass_is_stable(scores in proptest::collection::vec(0.0f64..=10.0, 1..4), threshold in 0.0f64..=10.0) {
            let build = || scores
                .iter()
                .enumerate()
                .map(|(i, s)| EvaluationResult::scored(format!("e{i}"), *s, "", Vec::new(), threshold))
                .collect::<Vec<_>>();
            let first = all_passed(&build());
            let second = all_passed(&build());
            prop_assert_eq!(first, second);
            prop_assert_eq!(first, scores.iter().all(|s| *s >= threshold));
        }

        #[test]
        fn prop_min_bounds_mean(scores in proptest::collection::vec(0.0f64..=10.0, 1..6)) {
            let evals: Vec<_> = scores.iter().map(|s| eval("e", *s)).collect();
            let summary = ScoreSummary::of(&evals);
            prop_assert!(summary.min <= summary.mean + 1e-9);
        }

        #[test]
        fn prop_compare_antisymmetric(a in proptest::collection::vec(0.0f64..=10.0, 1..4), b in proptest::collection::vec(0.0f64..=10.0, 1..4)) {
            let sa = ScoreSummary::of(&a.iter().map(|s| eval("e", *s)).collect::<Vec<_>>());
            let sb = ScoreSummary::of(&b.iter().map(|s| eval("e", *s)).collect::<Vec<_>>());
            prop_assert_eq!(sa.compare(&sb), sb.compare(&sa).reverse());
        }
    }
}
