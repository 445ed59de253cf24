//! Statistics engine.
//!
//! Every test returns a [`TestOutcome`]: the statistic, its p-value and a
//! categorical reading of both. NaN values are dropped before a test runs
//! (pairwise for paired columns); each test refuses to run below the sample
//! size it needs instead of producing NaN.

pub mod correlation;
pub mod descriptive;
pub mod hypothesis;
pub mod normality;
pub mod rank;
pub mod trend;

use std::fmt;

use serde::{Serialize, Serializer};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::erf::{erfc, erfc_inv};

use crate::error::{AnalysisError, Result};

/// p-value cutoff below which a result is called significant.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// |r| at or above which a correlation is moderate.
pub const MODERATE_CORRELATION: f64 = 0.3;

/// |r| at or above which a correlation is strong.
pub const STRONG_CORRELATION: f64 = 0.5;

/// Minimum paired observations for any two-column analysis.
pub const MIN_PAIRED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    Pearson,
    Spearman,
    TTest,
    MannWhitney,
    Anova,
    KruskalWallis,
    ShapiroWilk,
    DagostinoPearson,
}

impl TestKind {
    pub fn name(self) -> &'static str {
        match self {
            TestKind::Pearson => "pearson",
            TestKind::Spearman => "spearman",
            TestKind::TTest => "t-test",
            TestKind::MannWhitney => "mann-whitney",
            TestKind::Anova => "anova",
            TestKind::KruskalWallis => "kruskal-wallis",
            TestKind::ShapiroWilk => "shapiro-wilk",
            TestKind::DagostinoPearson => "dagostino-pearson",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Significance {
    Significant,
    NotSignificant,
}

impl Significance {
    pub fn from_p(p_value: f64) -> Self {
        if p_value < SIGNIFICANCE_LEVEL {
            Significance::Significant
        } else {
            Significance::NotSignificant
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    pub fn from_r(r: f64) -> Self {
        let r = r.abs();
        if r >= STRONG_CORRELATION {
            Strength::Strong
        } else if r >= MODERATE_CORRELATION {
            Strength::Moderate
        } else {
            Strength::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Positive,
    Negative,
    None,
}

impl Direction {
    pub fn from_sign(v: f64) -> Self {
        if v > 0.0 {
            Direction::Positive
        } else if v < 0.0 {
            Direction::Negative
        } else {
            Direction::None
        }
    }
}

/// Categorical reading of a result, rendered as e.g.
/// `strong, significant, negative` or `not significant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpretation {
    pub significance: Significance,
    pub strength: Option<Strength>,
    pub direction: Option<Direction>,
}

impl Interpretation {
    pub fn for_test(p_value: f64) -> Self {
        Self {
            significance: Significance::from_p(p_value),
            strength: None,
            direction: None,
        }
    }

    pub fn for_correlation(r: f64, p_value: f64) -> Self {
        Self {
            significance: Significance::from_p(p_value),
            strength: Some(Strength::from_r(r)),
            direction: Some(Direction::from_sign(r)),
        }
    }

    pub fn is_significant(&self) -> bool {
        self.significance == Significance::Significant
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(strength) = self.strength {
            parts.push(match strength {
                Strength::Weak => "weak",
                Strength::Moderate => "moderate",
                Strength::Strong => "strong",
            });
        }
        parts.push(match self.significance {
            Significance::Significant => "significant",
            Significance::NotSignificant => "not significant",
        });
        match self.direction {
            Some(Direction::Positive) => parts.push("positive"),
            Some(Direction::Negative) => parts.push("negative"),
            _ => {}
        }
        f.write_str(&parts.join(", "))
    }
}

impl Serialize for Interpretation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// TestOutcome
// ---------------------------------------------------------------------------

/// Result object handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub test: TestKind,
    pub statistic: f64,
    pub p_value: f64,
    /// Observations that entered the test after NaN removal.
    pub n: usize,
    pub interpretation: Interpretation,
}

impl TestOutcome {
    pub(crate) fn new(test: TestKind, statistic: f64, p_value: f64, n: usize) -> Self {
        Self {
            test,
            statistic,
            p_value,
            n,
            interpretation: Interpretation::for_test(p_value),
        }
    }

    pub(crate) fn correlation(test: TestKind, r: f64, p_value: f64, n: usize) -> Self {
        Self {
            test,
            statistic: r,
            p_value,
            n,
            interpretation: Interpretation::for_correlation(r, p_value),
        }
    }

    pub fn is_significant(&self) -> bool {
        self.interpretation.is_significant()
    }
}

// ---------------------------------------------------------------------------
// Test selector
// ---------------------------------------------------------------------------

/// Input shapes the engine accepts.
#[derive(Debug, Clone, Copy)]
pub enum TestInput<'a> {
    /// Two columns of equal length; row i of `x` pairs with row i of `y`.
    Paired { x: &'a [f64], y: &'a [f64] },
    /// One numeric column split into groups.
    Grouped(&'a [Vec<f64>]),
    /// One numeric column.
    Single(&'a [f64]),
}

impl TestInput<'_> {
    fn shape(&self) -> &'static str {
        match self {
            TestInput::Paired { .. } => "paired",
            TestInput::Grouped(_) => "grouped",
            TestInput::Single(_) => "single-column",
        }
    }
}

/// Run the selected test on the given input.
///
/// Paired input feeds the correlation tests directly and the two-sample
/// tests as two samples (after pairwise NaN removal). Grouped tests accept
/// paired input as two groups; t-test and Mann-Whitney accept grouped input
/// with exactly two groups.
pub fn run_test(kind: TestKind, input: TestInput<'_>) -> Result<TestOutcome> {
    let unsupported = || AnalysisError::UnsupportedInput {
        test: kind.name(),
        input: input.shape(),
    };

    match (kind, input) {
        (TestKind::Pearson, TestInput::Paired { x, y }) => correlation::pearson(x, y),
        (TestKind::Spearman, TestInput::Paired { x, y }) => correlation::spearman(x, y),
        (TestKind::TTest | TestKind::MannWhitney, TestInput::Paired { x, y }) => {
            let (x, y) = drop_nan_pairs(kind.name(), x, y)?;
            require(kind.name(), "paired observations", MIN_PAIRED, x.len())?;
            two_sample(kind, &x, &y)
        }
        (TestKind::TTest | TestKind::MannWhitney, TestInput::Grouped(groups)) => match groups {
            [a, b] => two_sample(kind, a, b),
            _ => Err(unsupported()),
        },
        (TestKind::Anova | TestKind::KruskalWallis, TestInput::Paired { x, y }) => {
            let (x, y) = drop_nan_pairs(kind.name(), x, y)?;
            require(kind.name(), "paired observations", MIN_PAIRED, x.len())?;
            grouped(kind, &[x, y])
        }
        (TestKind::Anova | TestKind::KruskalWallis, TestInput::Grouped(groups)) => {
            grouped(kind, groups)
        }
        (TestKind::ShapiroWilk, TestInput::Single(x)) => normality::shapiro_wilk(x),
        (TestKind::DagostinoPearson, TestInput::Single(x)) => normality::dagostino_pearson(x),
        _ => Err(unsupported()),
    }
}

fn two_sample(kind: TestKind, a: &[f64], b: &[f64]) -> Result<TestOutcome> {
    match kind {
        TestKind::TTest => hypothesis::t_test(a, b),
        _ => hypothesis::mann_whitney(a, b),
    }
}

fn grouped(kind: TestKind, groups: &[Vec<f64>]) -> Result<TestOutcome> {
    match kind {
        TestKind::Anova => hypothesis::one_way_anova(groups),
        _ => hypothesis::kruskal_wallis(groups),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Keep rows where both sides are finite. The columns must pair up row by
/// row, so unequal lengths are an error rather than a truncation.
pub fn drop_nan_pairs(test: &'static str, x: &[f64], y: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if x.len() != y.len() {
        return Err(AnalysisError::LengthMismatch {
            test,
            left: x.len(),
            right: y.len(),
        });
    }
    Ok(x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip())
}

pub fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

pub(crate) fn require(test: &'static str, unit: &'static str, required: usize, found: usize) -> Result<()> {
    if found < required {
        Err(AnalysisError::insufficient(test, unit, required, found))
    } else {
        Ok(())
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Upper tail of the standard normal distribution.
pub(crate) fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

/// Standard normal quantile, `p` in (0, 1).
pub(crate) fn normal_quantile(p: f64) -> f64 {
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

/// Two-sided p-value of a Student t statistic.
pub(crate) fn students_t_two_sided(t: f64, df: f64) -> f64 {
    if t.is_infinite() {
        return 0.0;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpretation_rendering() {
        assert_eq!(
            Interpretation::for_correlation(-1.0, 0.0).to_string(),
            "strong, significant, negative"
        );
        assert_eq!(
            Interpretation::for_correlation(0.35, 0.2).to_string(),
            "moderate, not significant, positive"
        );
        assert_eq!(Interpretation::for_test(0.05).to_string(), "not significant");
        assert_eq!(Interpretation::for_test(0.049).to_string(), "significant");
    }

    #[test]
    fn test_strength_thresholds() {
        assert_eq!(Strength::from_r(0.299), Strength::Weak);
        assert_eq!(Strength::from_r(-0.3), Strength::Moderate);
        assert_eq!(Strength::from_r(0.5), Strength::Strong);
    }

    #[test]
    fn test_drop_nan_pairs_is_pairwise() {
        let (x, y) = drop_nan_pairs("test", &[1.0, f64::NAN, 3.0, 4.0], &[1.0, 2.0, f64::NAN, 4.0]).unwrap();
        assert_eq!(x, vec![1.0, 4.0]);
        assert_eq!(y, vec![1.0, 4.0]);
    }

    #[test]
    fn test_unequal_columns_are_rejected() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0];
        for kind in [TestKind::Pearson, TestKind::Spearman, TestKind::TTest, TestKind::Anova] {
            let err = run_test(kind, TestInput::Paired { x: &x, y: &y }).unwrap_err();
            assert!(
                matches!(err, AnalysisError::LengthMismatch { left: 5, right: 3, .. }),
                "{kind}: {err}"
            );
        }
    }

    #[test]
    fn test_selector_routes_and_rejects() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 5.0, 9.0];
        let outcome = run_test(TestKind::Spearman, TestInput::Paired { x: &x, y: &y }).unwrap();
        assert!((outcome.statistic - 1.0).abs() < 1e-12);

        let err = run_test(TestKind::Pearson, TestInput::Single(&x)).unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedInput { .. }));
    }

    #[test]
    fn test_paired_two_sample_requires_three_pairs() {
        let err = run_test(
            TestKind::TTest,
            TestInput::Paired {
                x: &[1.0, 2.0, f64::NAN],
                y: &[1.0, 5.0, 3.0],
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                required: 3,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_outcome_serializes_interpretation_as_text() {
        let outcome = TestOutcome::correlation(TestKind::Pearson, -1.0, 0.0, 3);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["interpretation"], "strong, significant, negative");
        assert_eq!(json["test"], "pearson");
    }
}
