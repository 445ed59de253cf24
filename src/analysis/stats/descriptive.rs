use serde::Serialize;
use statrs::statistics::{Data, Median, Statistics};

use super::normality::Moments;
use super::{finite, require};
use crate::error::Result;

/// Summary of one numeric column after NaN removal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptive {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; needs two observations.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    /// Standard deviation as a percentage of the mean.
    pub coefficient_of_variation: Option<f64>,
    pub skewness: Option<f64>,
    pub excess_kurtosis: Option<f64>,
}

pub fn describe(values: &[f64]) -> Result<Descriptive> {
    let x = finite(values);
    require("descriptive statistics", "observations", 1, x.len())?;

    let mean = Statistics::mean(&x);
    let min = Statistics::min(&x);
    let max = Statistics::max(&x);
    let std_dev = (x.len() >= 2).then(|| Statistics::std_dev(&x));
    let coefficient_of_variation = std_dev
        .filter(|_| mean != 0.0)
        .map(|sd| sd / mean.abs() * 100.0);

    let moments = Moments::of(&x);
    let (skewness, excess_kurtosis) = if moments.m2 > 0.0 {
        (Some(moments.skewness()), Some(moments.kurtosis() - 3.0))
    } else {
        (None, None)
    };

    Ok(Descriptive {
        n: x.len(),
        mean,
        median: Data::new(x).median(),
        std_dev,
        min,
        max,
        range: max - min,
        coefficient_of_variation,
        skewness,
        excess_kurtosis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    #[test]
    fn test_describe_basic() {
        let d = describe(&[4.0, f64::NAN, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(d.n, 4);
        assert_eq!(d.mean, 2.5);
        assert_eq!(d.median, 2.5);
        assert_eq!((d.min, d.max, d.range), (1.0, 4.0, 3.0));
        let sd = (5.0f64 / 3.0).sqrt();
        assert!((d.std_dev.unwrap() - sd).abs() < 1e-12);
        assert!((d.coefficient_of_variation.unwrap() - sd / 2.5 * 100.0).abs() < 1e-9);
        assert!(d.skewness.unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_single_value_has_no_spread() {
        let d = describe(&[7.0]).unwrap();
        assert_eq!(d.std_dev, None);
        assert_eq!(d.skewness, None);
        assert_eq!(d.range, 0.0);
    }

    #[test]
    fn test_zero_mean_has_no_cv() {
        let d = describe(&[-1.0, 1.0]).unwrap();
        assert_eq!(d.coefficient_of_variation, None);
    }

    #[test]
    fn test_empty_is_insufficient() {
        assert!(matches!(
            describe(&[f64::NAN]),
            Err(AnalysisError::InsufficientData { .. })
        ));
    }
}
