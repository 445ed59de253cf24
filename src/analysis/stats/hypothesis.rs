use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

use super::rank::{average_ranks, tie_term};
use super::{finite, mean, normal_sf, require, students_t_two_sided, TestKind, TestOutcome};
use crate::error::{AnalysisError, Result};

/// Above this larger-sample size the exact Mann-Whitney distribution is
/// not tabulated.
const MWU_EXACT_MAX_LARGE: usize = 1000;

/// The exact Mann-Whitney distribution is used when the smaller sample has
/// at most this many observations and there are no ties.
const MWU_EXACT_MAX_SMALL: usize = 8;

// ---------------------------------------------------------------------------
// Two-sample tests
// ---------------------------------------------------------------------------

/// Student's independent two-sample t-test (pooled variance, two-sided).
pub fn t_test(a: &[f64], b: &[f64]) -> Result<TestOutcome> {
    let name = TestKind::TTest.name();
    let (a, b) = (finite(a), finite(b));
    require(name, "observations per sample", 2, a.len().min(b.len()))?;

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (m1, m2) = (mean(&a), mean(&b));
    let ss1: f64 = a.iter().map(|v| (v - m1).powi(2)).sum();
    let ss2: f64 = b.iter().map(|v| (v - m2).powi(2)).sum();
    let df = n1 + n2 - 2.0;
    let pooled = (ss1 + ss2) / df;
    if pooled == 0.0 {
        return Err(AnalysisError::constant(name, "both samples have zero variance"));
    }

    let t = (m1 - m2) / (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    Ok(TestOutcome::new(
        TestKind::TTest,
        t,
        students_t_two_sided(t, df),
        a.len() + b.len(),
    ))
}

/// Two-sided Mann-Whitney U test. The statistic is U of the first sample.
///
/// Small samples without ties use the exact null distribution; otherwise
/// the normal approximation with tie and continuity correction.
pub fn mann_whitney(a: &[f64], b: &[f64]) -> Result<TestOutcome> {
    let name = TestKind::MannWhitney.name();
    let (a, b) = (finite(a), finite(b));
    require(name, "observations per sample", 1, a.len().min(b.len()))?;
    require(name, "observations", 3, a.len() + b.len())?;

    let (n1, n2) = (a.len(), b.len());
    let combined: Vec<f64> = a.iter().chain(&b).copied().collect();
    let ranks = average_ranks(&combined);
    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u_max = u1.max(u2);
    let ties = tie_term(&combined);

    let small = n1.min(n2);
    let large = n1.max(n2);
    let p_value = if ties == 0.0 && small <= MWU_EXACT_MAX_SMALL && large <= MWU_EXACT_MAX_LARGE {
        let counts = u_distribution(small, large);
        let total: f64 = counts.iter().sum();
        let upper: f64 = counts[u_max.round() as usize..].iter().sum();
        (2.0 * upper / total).min(1.0)
    } else {
        let n = (n1 + n2) as f64;
        let mu = (n1 * n2) as f64 / 2.0;
        let var = (n1 * n2) as f64 / 12.0 * ((n + 1.0) - ties / (n * (n - 1.0)));
        if var <= 0.0 {
            // every value tied: no evidence of a shift
            1.0
        } else {
            let z = (u_max - mu - 0.5) / var.sqrt();
            (2.0 * normal_sf(z)).min(1.0)
        }
    };

    Ok(TestOutcome::new(TestKind::MannWhitney, u1, p_value, n1 + n2))
}

/// Frequencies of U = 0..=m·n over all arrangements of two samples of
/// sizes `m` and `n`; they sum to C(m + n, m).
///
/// f(u; i, j) = f(u − j; i − 1, j) + f(u; i, j − 1), splitting on which
/// sample holds the largest value. Columns over j are rolled to keep memory
/// linear in `n`.
pub(crate) fn u_distribution(m: usize, n: usize) -> Vec<f64> {
    let mut prev: Vec<Vec<f64>> = vec![vec![1.0]; m + 1];
    for j in 1..=n {
        let mut cur: Vec<Vec<f64>> = Vec::with_capacity(m + 1);
        cur.push(vec![1.0]);
        for i in 1..=m {
            let mut counts = vec![0.0; i * j + 1];
            for (u, v) in cur[i - 1].iter().enumerate() {
                counts[u + j] += v;
            }
            for (u, v) in prev[i].iter().enumerate() {
                counts[u] += v;
            }
            cur.push(counts);
        }
        prev = cur;
    }
    prev.swap_remove(m)
}

// ---------------------------------------------------------------------------
// Grouped tests
// ---------------------------------------------------------------------------

/// Drop NaN, then drop groups with fewer than two observations.
fn prepare_groups(test: &'static str, groups: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let groups: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| finite(g))
        .filter(|g| g.len() >= 2)
        .collect();
    require(test, "groups with at least 2 observations", 2, groups.len())?;
    Ok(groups)
}

/// One-way ANOVA F test.
pub fn one_way_anova(groups: &[Vec<f64>]) -> Result<TestOutcome> {
    let name = TestKind::Anova.name();
    let groups = prepare_groups(name, groups)?;

    let k = groups.len() as f64;
    let all: Vec<f64> = groups.iter().flatten().copied().collect();
    let n = all.len() as f64;
    let grand = mean(&all);

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for g in &groups {
        let m = mean(g);
        ss_between += g.len() as f64 * (m - grand).powi(2);
        ss_within += g.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    }
    if ss_within == 0.0 {
        return Err(AnalysisError::constant(name, "every group has zero variance"));
    }

    let (df_between, df_within) = (k - 1.0, n - k);
    let f = (ss_between / df_between) / (ss_within / df_within);
    let p_value = FisherSnedecor::new(df_between, df_within)
        .map(|d| d.sf(f))
        .unwrap_or(f64::NAN);

    Ok(TestOutcome::new(TestKind::Anova, f, p_value, all.len()))
}

/// Kruskal-Wallis H test with tie correction.
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> Result<TestOutcome> {
    let name = TestKind::KruskalWallis.name();
    let groups = prepare_groups(name, groups)?;

    let all: Vec<f64> = groups.iter().flatten().copied().collect();
    let n = all.len() as f64;
    let ranks = average_ranks(&all);

    let mut offset = 0;
    let mut h = 0.0;
    for g in &groups {
        let rank_sum: f64 = ranks[offset..offset + g.len()].iter().sum();
        h += rank_sum * rank_sum / g.len() as f64;
        offset += g.len();
    }
    h = 12.0 / (n * (n + 1.0)) * h - 3.0 * (n + 1.0);

    let correction = 1.0 - tie_term(&all) / (n * n * n - n);
    if correction <= 0.0 {
        return Err(AnalysisError::constant(name, "all values are identical"));
    }
    h /= correction;

    let p_value = ChiSquared::new(groups.len() as f64 - 1.0)
        .map(|d| d.sf(h))
        .unwrap_or(f64::NAN);

    Ok(TestOutcome::new(TestKind::KruskalWallis, h, p_value, all.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_t_test_known_values() {
        // pooled t-test, hand computed: t = -2.0, df = 8
        let outcome = t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[3.0, 4.0, 5.0, 6.0, 7.0]).unwrap();
        assert!((outcome.statistic + 2.0).abs() < 1e-12);
        assert!((outcome.p_value - 0.080516).abs() < 1e-4);
        assert_eq!(outcome.n, 10);
        assert!(!outcome.is_significant());
    }

    #[test]
    fn test_t_test_needs_two_per_sample() {
        let err = t_test(&[1.0], &[2.0, 3.0, 4.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
        let err = t_test(&[1.0, 1.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::ConstantInput { .. }));
    }

    #[test]
    fn test_u_distribution_sums_to_binomial() {
        let counts = u_distribution(3, 4);
        assert_eq!(counts.len(), 13);
        assert_eq!(counts.iter().sum::<f64>(), 35.0);
        // symmetric around m*n/2
        for u in 0..counts.len() {
            assert_eq!(counts[u], counts[counts.len() - 1 - u]);
        }
        assert_eq!(u_distribution(0, 5), vec![1.0]);
    }

    #[test]
    fn test_mann_whitney_exact_separated_samples() {
        // complete separation: U1 = 0, p = 2 / C(9, 4) = 2 / 126
        let outcome = mann_whitney(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0, 9.0]).unwrap();
        assert_eq!(outcome.statistic, 0.0);
        assert!((outcome.p_value - 2.0 / 126.0).abs() < 1e-12);
        assert!(outcome.is_significant());
    }

    #[test]
    fn test_mann_whitney_asymptotic_with_ties() {
        let a = [1.0, 2.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let b = [2.0, 3.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let outcome = mann_whitney(&a, &b).unwrap();
        assert!(outcome.p_value > 0.3 && outcome.p_value <= 1.0);
        // U1 + U2 = n1 * n2
        let reverse = mann_whitney(&b, &a).unwrap();
        assert!((outcome.statistic + reverse.statistic - 100.0).abs() < 1e-9);
        assert!((outcome.p_value - reverse.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_mann_whitney_tie_corrected_reference() {
        // scipy.stats.mannwhitneyu(a, b, method="asymptotic"): U = 16, p = 0.0195318
        let a = [1.2, 3.4, 3.4, 5.0, 2.2, 7.1, 3.4, 8.8, 0.5, 4.4];
        let b = [2.2, 6.0, 7.1, 9.3, 5.0, 10.2, 8.8, 6.6, 11.0];
        let outcome = mann_whitney(&a, &b).unwrap();
        assert!((outcome.statistic - 16.0).abs() < 1e-9);
        assert!((outcome.p_value - 0.019_531_750_8).abs() < 1e-8);
        assert!(outcome.is_significant());
    }

    #[test]
    fn test_mann_whitney_exact_reference() {
        // scipy.stats.mannwhitneyu(males, females): U = 17, p = 0.1111
        let males = [19.0, 22.0, 16.0, 29.0, 24.0];
        let females = [20.0, 11.0, 17.0, 12.0];
        let exact = mann_whitney(&males, &females).unwrap();
        assert!((exact.statistic - 17.0).abs() < 1e-9);
        // exact two-sided p = 2 * 7 / 126
        assert!((exact.p_value - 14.0 / 126.0).abs() < 1e-12);
    }

    #[test]
    fn test_mann_whitney_all_tied() {
        let outcome = mann_whitney(&[2.0, 2.0], &[2.0, 2.0]).unwrap();
        assert_eq!(outcome.p_value, 1.0);
    }

    #[test]
    fn test_anova_known_values() {
        // groups (1,2,3), (2,3,4,5), (6,7,8):
        // SSB = 39.9, SSW = 9, F = (39.9/2)/(9/7) = 15.51667
        let groups = vec![vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0, 5.0], vec![6.0, 7.0, 8.0]];
        let outcome = one_way_anova(&groups).unwrap();
        assert!((outcome.statistic - 139.65 / 9.0).abs() < 1e-9);
        assert!(outcome.p_value < 0.01);
        assert_eq!(outcome.n, 10);
    }

    #[test]
    fn test_grouped_tests_drop_small_groups() {
        let groups = vec![vec![1.0, 2.0, 3.0], vec![f64::NAN, 9.0]];
        let err = one_way_anova(&groups).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                required: 2,
                found: 1,
                ..
            }
        ));
        assert!(kruskal_wallis(&groups).is_err());
    }

    #[test]
    fn test_kruskal_wallis_separated_groups() {
        let groups = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
        let outcome = kruskal_wallis(&groups).unwrap();
        // rank sums 6, 15, 24: H = 12/90 * (12 + 75 + 192) - 30 = 7.2
        assert!((outcome.statistic - 7.2).abs() < 1e-9);
        assert!((outcome.p_value - (-3.6f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_kruskal_wallis_constant() {
        let groups = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        assert!(matches!(
            kruskal_wallis(&groups),
            Err(AnalysisError::ConstantInput { .. })
        ));
    }
}
