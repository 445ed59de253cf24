use chrono::NaiveDate;
use serde::Serialize;
use statrs::statistics::Statistics;

use super::stats::finite;
use crate::data::filter::Selection;
use crate::data::market::{MarketHistory, MarketObservation, TRADING_DAYS_PER_YEAR};

/// Observations looked back for the one-month return.
pub const MONTH_OBSERVATIONS: usize = 21;

/// Observations looked back for the one-year return.
pub const YEAR_OBSERVATIONS: usize = 252;

/// Latest state of one asset.
#[derive(Debug, Clone, Serialize)]
pub struct AssetSnapshot {
    pub asset: String,
    pub country: String,
    pub country_name: String,
    pub last_date: NaiveDate,
    pub last_price: f64,
    pub return_1m: Option<f64>,
    pub return_1y: Option<f64>,
    /// Annualized volatility (%) of all daily returns.
    pub volatility: Option<f64>,
}

/// Performance of one asset inside a date window.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodMetrics {
    pub asset: String,
    pub country: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub first_price: f64,
    pub last_price: f64,
    pub observations: usize,
    pub period_return: f64,
    pub volatility: Option<f64>,
    /// Annualized mean daily return over its volatility.
    pub sharpe: Option<f64>,
}

/// Return (%) from `lookback` observations before the last one, counting
/// the last one.
fn trailing_return(series: &[MarketObservation], lookback: usize) -> Option<f64> {
    if series.len() < lookback {
        return None;
    }
    let start = series[series.len() - lookback].price;
    let last = series.last()?.price;
    (start != 0.0).then(|| (last / start - 1.0) * 100.0)
}

fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    (returns.len() >= 2).then(|| returns.std_dev() * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Daily returns of a window, recomputed inside it so the first observation
/// contributes none.
fn window_returns(series: &[MarketObservation]) -> Vec<f64> {
    let returns: Vec<f64> = series
        .windows(2)
        .map(|w| (w[1].price - w[0].price) / w[0].price * 100.0)
        .collect();
    finite(&returns)
}

pub fn snapshot(history: &MarketHistory) -> Vec<AssetSnapshot> {
    history
        .series()
        .filter_map(|series| {
            let last = series.last()?;
            let returns = finite(&series.iter().map(|o| o.daily_return).collect::<Vec<_>>());
            Some(AssetSnapshot {
                asset: last.asset_id.clone(),
                country: last.country.clone(),
                country_name: last.country_name.clone(),
                last_date: last.date,
                last_price: last.price,
                return_1m: trailing_return(series, MONTH_OBSERVATIONS),
                return_1y: trailing_return(series, YEAR_OBSERVATIONS),
                volatility: annualized_volatility(&returns),
            })
        })
        .collect()
}

/// Metrics per asset for the observations passing `selection`; assets with
/// fewer than two observations in the window are left out. Ordered by
/// period return, best first.
pub fn period_metrics(history: &MarketHistory, selection: &Selection) -> Vec<PeriodMetrics> {
    let mut metrics: Vec<PeriodMetrics> = history
        .series()
        .filter_map(|series| {
            let window: Vec<MarketObservation> = series
                .iter()
                .filter(|o| selection.matches_market(o))
                .cloned()
                .collect();
            let (first, last) = (window.first()?, window.last()?);
            if window.len() < 2 || first.price == 0.0 {
                return None;
            }
            let returns = window_returns(&window);
            let volatility = annualized_volatility(&returns);
            let sharpe = volatility.filter(|v| *v > 0.0).map(|v| {
                returns.iter().sum::<f64>() / returns.len() as f64 * TRADING_DAYS_PER_YEAR / v
            });
            Some(PeriodMetrics {
                asset: first.asset_id.clone(),
                country: first.country.clone(),
                first_date: first.date,
                last_date: last.date,
                first_price: first.price,
                last_price: last.price,
                observations: window.len(),
                period_return: (last.price - first.price) / first.price * 100.0,
                volatility,
                sharpe,
            })
        })
        .collect();
    metrics.sort_by(|a, b| b.period_return.total_cmp(&a.period_return));
    metrics
}
