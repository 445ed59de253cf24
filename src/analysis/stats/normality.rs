use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::{finite, normal_quantile, normal_sf, require, TestKind, TestOutcome, SIGNIFICANCE_LEVEL};
use crate::error::{AnalysisError, Result};

/// Above this size the Shapiro-Wilk p-value is only approximate.
pub const SHAPIRO_MAX_EXACT: usize = 5000;

/// Shapiro-Wilk is reported for samples below this size.
pub const SHAPIRO_SUMMARY_LIMIT: usize = 50;

/// D'Agostino-Pearson is reported from this size on.
pub const DAGOSTINO_SUMMARY_MIN: usize = 20;

const DAGOSTINO_MIN: usize = 8;

// Royston (1995) polynomial coefficients, lowest order first.
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

// ---------------------------------------------------------------------------
// Shapiro-Wilk
// ---------------------------------------------------------------------------

/// Shapiro-Wilk W test for normality (Royston's AS R94 approximation).
pub fn shapiro_wilk(values: &[f64]) -> Result<TestOutcome> {
    let name = TestKind::ShapiroWilk.name();
    let mut x = finite(values);
    require(name, "observations", 3, x.len())?;
    x.sort_by(f64::total_cmp);

    let n = x.len();
    if n > SHAPIRO_MAX_EXACT {
        log::warn!("Shapiro-Wilk on {n} observations: p-value may not be accurate above {SHAPIRO_MAX_EXACT}");
    }
    let range = x[n - 1] - x[0];
    if range < 1e-19 {
        return Err(AnalysisError::constant(name, "all values are identical"));
    }

    let a = shapiro_coefficients(n);
    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| ((v - mean) / range).powi(2)).sum();
    let numerator: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]) / range)
        .sum();
    let w = (numerator * numerator / ss).min(1.0);

    Ok(TestOutcome::new(
        TestKind::ShapiroWilk,
        w,
        shapiro_p_value(w, n),
        n,
    ))
}

/// The first n/2 weights; the remaining ones mirror them with opposite sign.
fn shapiro_coefficients(n: usize) -> Vec<f64> {
    if n == 3 {
        return vec![std::f64::consts::FRAC_1_SQRT_2];
    }
    let half = n / 2;
    let an = n as f64;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal_quantile((i as f64 - 0.375) / (an + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / an.sqrt();

    let mut a = vec![0.0; half];
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    a[0] = a1;
    let (first, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        a[1] = a2;
        let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
            / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
            .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
        (1, fac)
    };
    for i in first..half {
        a[i] = -m[i] / fac;
    }
    a
}

fn shapiro_p_value(w: f64, n: usize) -> f64 {
    if w >= 1.0 {
        return 1.0;
    }
    if n == 3 {
        let p = 6.0 / std::f64::consts::PI
            * (w.sqrt().asin() - std::f64::consts::FRAC_PI_3);
        return p.clamp(0.0, 1.0);
    }

    let an = n as f64;
    let mut y = (1.0 - w).ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return 0.0;
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let ln_n = an.ln();
        (poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };
    normal_sf((y - m) / s)
}

// ---------------------------------------------------------------------------
// D'Agostino-Pearson
// ---------------------------------------------------------------------------

/// D'Agostino-Pearson K² omnibus test, combining the skewness and kurtosis
/// z-scores.
pub fn dagostino_pearson(values: &[f64]) -> Result<TestOutcome> {
    let name = TestKind::DagostinoPearson.name();
    let x = finite(values);
    require(name, "observations", DAGOSTINO_MIN, x.len())?;

    let moments = Moments::of(&x);
    if moments.m2 == 0.0 {
        return Err(AnalysisError::constant(name, "all values are identical"));
    }
    let n = x.len() as f64;
    let zs = skewness_z(moments.skewness(), n);
    let zk = kurtosis_z(moments.kurtosis(), n);
    let k2 = zs * zs + zk * zk;
    let p_value = ChiSquared::new(2.0).map(|d| d.sf(k2)).unwrap_or(f64::NAN);

    Ok(TestOutcome::new(TestKind::DagostinoPearson, k2, p_value, x.len()))
}

fn skewness_z(b1: f64, n: f64) -> f64 {
    let y = b1 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let y = if y == 0.0 { 1.0 } else { y };
    let ya = y / alpha;
    delta * (ya + (ya * ya + 1.0).sqrt()).ln()
}

fn kurtosis_z(b2: f64, n: f64) -> f64 {
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 = 24.0 * n * (n - 2.0) * (n - 3.0)
        / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / var_b2.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}

/// Central moments, biased (divided by n).
pub(crate) struct Moments {
    pub m2: f64,
    pub m3: f64,
    pub m4: f64,
}

impl Moments {
    pub(crate) fn of(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for v in values {
            let d = v - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        Self {
            m2: m2 / n,
            m3: m3 / n,
            m4: m4 / n,
        }
    }

    /// g1 = m3 / m2^1.5
    pub(crate) fn skewness(&self) -> f64 {
        self.m3 / self.m2.powf(1.5)
    }

    /// Pearson kurtosis b2 = m4 / m2² (3 for a normal distribution).
    pub(crate) fn kurtosis(&self) -> f64 {
        self.m4 / (self.m2 * self.m2)
    }
}

// ---------------------------------------------------------------------------
// Summary used by the reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct NormalityCheck {
    pub outcome: TestOutcome,
    /// p > 0.05: no evidence against normality.
    pub normal: bool,
}

impl From<TestOutcome> for NormalityCheck {
    fn from(outcome: TestOutcome) -> Self {
        Self {
            normal: outcome.p_value > SIGNIFICANCE_LEVEL,
            outcome,
        }
    }
}

/// Shapiro-Wilk for 3 ≤ n < 50 and D'Agostino-Pearson for n ≥ 20. Either may
/// be absent when the sample is outside its range or degenerate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalitySummary {
    pub shapiro_wilk: Option<NormalityCheck>,
    pub dagostino_pearson: Option<NormalityCheck>,
}

impl NormalitySummary {
    pub fn of(values: &[f64]) -> Self {
        let n = finite(values).len();
        let shapiro_wilk = (n < SHAPIRO_SUMMARY_LIMIT)
            .then(|| shapiro_wilk(values).ok())
            .flatten()
            .map(NormalityCheck::from);
        let dagostino_pearson = (n >= DAGOSTINO_SUMMARY_MIN)
            .then(|| dagostino_pearson(values).ok())
            .flatten()
            .map(NormalityCheck::from);
        Self {
            shapiro_wilk,
            dagostino_pearson,
        }
    }
}
