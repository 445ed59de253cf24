use serde::Serialize;

use super::correlation::correlation_p_value;
use super::{drop_nan_pairs, mean, require, MIN_PAIRED, SIGNIFICANCE_LEVEL};
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

/// Ordinary least-squares fit of `y` on `x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value of the slope (t with n − 2 df).
    pub p_value: f64,
    pub n: usize,
    pub significant: bool,
    pub direction: TrendDirection,
}

pub fn linear_trend(x: &[f64], y: &[f64]) -> Result<LinearTrend> {
    let (x, y) = drop_nan_pairs("linear trend", x, y)?;
    require("linear trend", "paired observations", MIN_PAIRED, x.len())?;

    let (mx, my) = (mean(&x), mean(&y));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(&y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 {
        return Err(AnalysisError::constant("linear trend", "x has zero variance"));
    }

    let slope = sxy / sxx;
    let (r, p_value) = if syy == 0.0 {
        (0.0, 1.0)
    } else {
        let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
        (r, correlation_p_value(r, x.len()))
    };
    let direction = if slope > 0.0 {
        TrendDirection::Increasing
    } else if slope < 0.0 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Flat
    };

    Ok(LinearTrend {
        slope,
        intercept: my - slope * mx,
        r_squared: r * r,
        p_value,
        n: x.len(),
        significant: p_value < SIGNIFICANCE_LEVEL,
        direction,
    })
}
