use super::rank::average_ranks;
use super::{drop_nan_pairs, mean, require, students_t_two_sided, TestKind, TestOutcome, MIN_PAIRED};
use crate::error::{AnalysisError, Result};

/// Pearson product-moment correlation with a two-sided p-value.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<TestOutcome> {
    let (x, y) = drop_nan_pairs(TestKind::Pearson.name(), x, y)?;
    correlate(TestKind::Pearson, &x, &y)
}

/// Spearman rank correlation: Pearson on average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<TestOutcome> {
    let (x, y) = drop_nan_pairs(TestKind::Spearman.name(), x, y)?;
    correlate(TestKind::Spearman, &average_ranks(&x), &average_ranks(&y))
}

fn correlate(kind: TestKind, x: &[f64], y: &[f64]) -> Result<TestOutcome> {
    require(kind.name(), "paired observations", MIN_PAIRED, x.len())?;
    let r = pearson_r(x, y).ok_or_else(|| {
        AnalysisError::constant(kind.name(), "one of the columns has zero variance")
    })?;
    Ok(TestOutcome::correlation(
        kind,
        r,
        correlation_p_value(r, x.len()),
        x.len(),
    ))
}

/// Sample correlation coefficient, `None` when either side is constant.
pub(crate) fn pearson_r(x: &[f64], y: &[f64]) -> Option<f64> {
    let (mx, my) = (mean(x), mean(y));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Two-sided p-value of r under H0: ρ = 0, via t with n − 2 df.
pub(crate) fn correlation_p_value(r: f64, n: usize) -> f64 {
    let df = n as f64 - 2.0;
    let rest = 1.0 - r * r;
    if rest <= f64::EPSILON {
        return 0.0;
    }
    students_t_two_sided(r * (df / rest).sqrt(), df)
}
