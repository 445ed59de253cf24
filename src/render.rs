//! Plain-text rendering of the reports for the terminal.

use std::fmt::Write;

use geofinance::analysis::adhoc::TestReport;
use geofinance::analysis::compare::Comparison;
use geofinance::analysis::correlations::CorrelationMatrix;
use geofinance::analysis::coverage::{Coverage, DatasetSummary, COMPLETE_COUNTRY_PERCENT};
use geofinance::analysis::explore::Exploration;
use geofinance::analysis::metrics::{AssetSnapshot, PeriodMetrics};
use geofinance::analysis::stats::descriptive::Descriptive;
use geofinance::analysis::stats::TestOutcome;
use geofinance::analysis::trends::TrendReport;
use geofinance::data::loader::TableInfo;

fn opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "n/a".to_string(),
    }
}

fn years(span: Option<(i32, i32)>) -> String {
    span.map_or_else(|| "-".to_string(), |(a, b)| format!("{a}-{b}"))
}

fn outcome_line(out: &mut String, label: &str, outcome: &TestOutcome) {
    let _ = writeln!(
        out,
        "  {label:<22} {:<16} stat = {:>10.4}  p = {:.4}  n = {:<5} {}",
        outcome.test.name(),
        outcome.statistic,
        outcome.p_value,
        outcome.n,
        outcome.interpretation
    );
}

fn dataset_line(out: &mut String, label: &str, series_label: &str, d: &DatasetSummary) {
    let span = match (d.first_year, d.last_year) {
        (Some(a), Some(b)) => format!("{a}-{b}"),
        _ => "-".to_string(),
    };
    let _ = writeln!(
        out,
        "  {label:<8} {:>9} observations  {:>3} countries  {:>3} {series_label}  years {span}",
        d.observations, d.countries, d.series
    );
}

pub fn coverage(c: &Coverage) -> String {
    let mut out = String::from("Coverage\n");
    dataset_line(&mut out, "market", "assets", &c.market);
    dataset_line(&mut out, "macro", "indicators", &c.macro_data);
    let join = |set: &std::collections::BTreeSet<String>| {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    let _ = writeln!(out, "  common countries ({}): {}", c.common_countries.len(), join(&c.common_countries));
    let _ = writeln!(out, "  market only ({}): {}", c.market_only.len(), join(&c.market_only));
    let _ = writeln!(out, "  macro only ({}): {}", c.macro_only.len(), join(&c.macro_only));
    let span = match (c.common_years.first(), c.common_years.last()) {
        (Some(a), Some(b)) => format!("{a}-{b}"),
        _ => "-".to_string(),
    };
    let _ = writeln!(out, "  common years: {} ({span})", c.common_years.len());
    if let Some((first, last)) = c.market_dates {
        let _ = writeln!(out, "  trading days: {first} to {last}");
    }

    if c.missing_values.is_empty() {
        let _ = writeln!(out, "  no missing values");
    }
    for m in &c.missing_values {
        let _ = writeln!(
            out,
            "  missing {:<6} {:<14} {:>8} ({:.2}%)",
            m.dataset, m.column, m.missing, m.percent
        );
    }

    let comp = &c.completeness;
    let _ = writeln!(
        out,
        "  macro completeness: {} over {} years, {} of {} countries above {:.0}%",
        opt(comp.global_percent, 1) + "%",
        comp.total_years,
        comp.complete_countries,
        comp.countries.len(),
        COMPLETE_COUNTRY_PERCENT
    );
    out
}

fn descriptive_line(out: &mut String, label: &str, d: &Descriptive) {
    let _ = writeln!(
        out,
        "  {label:<40} n = {:<5} mean = {:>9.3}  median = {:>9.3}  sd = {:>9}  min = {:>9.3}  max = {:>9.3}",
        d.n,
        d.mean,
        d.median,
        opt(d.std_dev, 3),
        d.min,
        d.max
    );
}

pub fn comparison(c: &Comparison) -> String {
    let mut out = coverage(&c.coverage);
    let _ = writeln!(
        out,
        "\nComparison: {} vs {} ({})",
        c.market_label,
        c.macro_label,
        c.aggregation.name()
    );
    let _ = writeln!(out, "  aligned country-years: {}  years {}", c.aligned_pairs, years(c.years));

    let g = &c.global;
    descriptive_line(&mut out, &c.market_label, &g.market);
    descriptive_line(&mut out, &c.macro_label, &g.macro_values);
    if let Some(check) = &g.market_normality {
        outcome_line(&mut out, "normality (market)", &check.outcome);
    }
    if let Some(check) = &g.macro_normality {
        outcome_line(&mut out, "normality (macro)", &check.outcome);
    }
    outcome_line(&mut out, "difference", &g.difference);
    if let Some(corr) = &g.correlation {
        outcome_line(&mut out, "correlation", corr);
    }

    let _ = writeln!(out, "\nPer country (by p-value)");
    let _ = writeln!(
        out,
        "  {:<8} {:>4} {:>10} {:>10} {:>10} {:<14} {:>8} {:>8}",
        "country", "n", "market", "macro", "diff", "test", "p", "r"
    );
    for row in &c.per_country {
        let _ = writeln!(
            out,
            "  {:<8} {:>4} {:>10.3} {:>10.3} {:>10.3} {:<14} {:>8.4} {:>8}",
            row.country,
            row.n,
            row.market_mean,
            row.macro_mean,
            row.mean_difference,
            row.difference.test.name(),
            row.difference.p_value,
            opt(row.correlation, 3)
        );
    }
    for skipped in &c.skipped {
        let _ = writeln!(out, "  {:<8} skipped: {}", skipped.country, skipped.reason);
    }

    let s = &c.summary;
    let _ = writeln!(
        out,
        "\n  {} of {} countries significant ({:.1}%), mean correlation {}",
        s.significant,
        s.countries_tested,
        s.significant_share,
        opt(s.mean_correlation, 4)
    );
    out
}

pub fn exploration(e: &Exploration) -> String {
    let mut out = format!(
        "{} ({})  years {}\n",
        e.indicator_name,
        e.indicator_code,
        years(e.years)
    );
    if let Some(d) = &e.summary {
        descriptive_line(&mut out, "all countries", d);
        let _ = writeln!(
            out,
            "  {:<40} cv = {}%  skewness = {}  excess kurtosis = {}",
            "",
            opt(d.coefficient_of_variation, 1),
            opt(d.skewness, 3),
            opt(d.excess_kurtosis, 3)
        );
    }
    for check in [&e.normality.shapiro_wilk, &e.normality.dagostino_pearson]
        .into_iter()
        .flatten()
    {
        let verdict = if check.normal { "normal" } else { "not normal" };
        outcome_line(&mut out, verdict, &check.outcome);
    }
    let _ = writeln!(
        out,
        "  {:<8} {:<20} {:>4} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "country", "name", "n", "mean", "median", "sd", "min", "max"
    );
    for c in &e.countries {
        let _ = writeln!(
            out,
            "  {:<8} {:<20} {:>4} {:>10.3} {:>10.3} {:>10} {:>10.3} {:>10.3}",
            c.country,
            c.name.unwrap_or("-"),
            c.n,
            c.mean,
            c.median,
            opt(c.std_dev, 3),
            c.min,
            c.max
        );
    }
    if let Some(cmp) = &e.comparison {
        let label = if cmp.parametric { "parametric" } else { "non-parametric" };
        outcome_line(&mut out, label, &cmp.outcome);
    }
    if let Some(reason) = &e.comparison_skipped {
        let _ = writeln!(out, "  no comparison: {reason}");
    }
    out
}

pub fn trends(t: &TrendReport) -> String {
    let mut out = format!("Trend of {} ({})\n", t.indicator_name, t.indicator_code);
    for row in &t.trends {
        let tr = &row.trend;
        let _ = writeln!(
            out,
            "  {:<8} {}-{}  slope = {:>9.4}/yr  r2 = {:.3}  p = {:.4}  {:?}{}",
            row.country,
            row.first_year,
            row.last_year,
            tr.slope,
            tr.r_squared,
            tr.p_value,
            tr.direction,
            if tr.significant { " *" } else { "" }
        );
    }
    for skipped in &t.skipped {
        let _ = writeln!(out, "  {:<8} skipped: {}", skipped.country, skipped.reason);
    }
    out
}

pub fn correlations(m: &CorrelationMatrix, top: usize) -> String {
    let mut out = format!("Indicator correlations for {}\n", m.country);
    for (i, name) in m.indicators.iter().enumerate() {
        let cells: Vec<String> = m.cells[i].iter().map(|c| format!("{:>6}", opt(*c, 2))).collect();
        let _ = writeln!(out, "  [{i:>2}] {} {name}", cells.join(" "));
    }
    let _ = writeln!(out, "\nStrongest pairs");
    for pair in m.strongest.iter().take(top) {
        let _ = writeln!(
            out,
            "  r = {:>6.3}  p = {:.4}  years = {:<3} {} / {}  ({})",
            pair.r, pair.p_value, pair.years, pair.first, pair.second, pair.interpretation
        );
    }
    out
}

pub fn snapshot(rows: &[AssetSnapshot]) -> String {
    let mut out = format!(
        "  {:<10} {:<6} {:<12} {:>12} {:>9} {:>9} {:>9}\n",
        "asset", "iso3", "date", "price", "1m %", "1y %", "vol %"
    );
    for r in rows {
        let _ = writeln!(
            out,
            "  {:<10} {:<6} {:<12} {:>12.2} {:>9} {:>9} {:>9}",
            r.asset,
            r.country,
            r.last_date,
            r.last_price,
            opt(r.return_1m, 2),
            opt(r.return_1y, 2),
            opt(r.volatility, 2)
        );
    }
    out
}

pub fn period(rows: &[PeriodMetrics]) -> String {
    let mut out = format!(
        "  {:<10} {:<6} {:<23} {:>5} {:>9} {:>9} {:>7}\n",
        "asset", "iso3", "window", "obs", "return %", "vol %", "sharpe"
    );
    for r in rows {
        let _ = writeln!(
            out,
            "  {:<10} {:<6} {} {} {:>5} {:>9.2} {:>9} {:>7}",
            r.asset,
            r.country,
            r.first_date,
            r.last_date,
            r.observations,
            r.period_return,
            opt(r.volatility, 2),
            opt(r.sharpe, 2)
        );
    }
    out
}

pub fn test_report(report: &TestReport) -> String {
    let mut out = format!("{}\n", report.input);
    outcome_line(&mut out, "result", &report.outcome);
    out
}

pub fn table_info(info: &TableInfo) -> String {
    let mut out = format!("{}: {} rows\n", info.path.display(), info.rows);
    for (name, ty) in &info.columns {
        let _ = writeln!(out, "  {name:<24} {ty}");
    }
    out
}
