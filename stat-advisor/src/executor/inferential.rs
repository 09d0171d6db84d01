//! Hypothesis tests run by the executor.
//!
//! Each function takes already aligned observations and either returns the
//! numeric results or an [`AdvisorError::Execution`] describing why the data
//! cannot support the test.

use std::collections::HashMap;

use crate::error::{AdvisorError, Result};
use crate::model::{
    ContingencyResults, CorrelationMethod, CorrelationResults, GroupStats, NormalityResults,
    TTestResults,
};
use crate::stats::moments::{excess_kurtosis, mean, sample_variance};
use crate::stats::special::{
    chi_square_sf, ln_factorial, normal_quantile, student_t_quantile, student_t_two_sided_p,
};
use crate::stats::{average_ranks, describe};

use super::descriptive::continuous_stats;

/// Relative tolerance when comparing table probabilities in the exact test.
const FISHER_TOLERANCE: f64 = 1e-7;

/// Labels in order of first appearance.
fn ordered_labels<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen: Vec<String> = Vec::new();
    for label in labels {
        if !seen.contains(label) {
            seen.push(label.clone());
        }
    }
    seen
}

/// Normality screen with skewness, excess kurtosis and a Jarque-Bera test.
pub fn normality(numbers: &[f64], missing: usize) -> Result<NormalityResults> {
    if numbers.len() < 3 {
        return Err(AdvisorError::execution(
            "normality-test",
            format!("at least three values are required, found {}", numbers.len()),
        ));
    }
    let descriptive = continuous_stats(numbers, missing)?;
    let moments = describe(numbers)
        .ok_or_else(|| AdvisorError::execution("normality-test", "no numeric values"))?;
    let kurtosis = excess_kurtosis(numbers, moments.mean, moments.sd);
    let n = numbers.len() as f64;
    let jarque_bera = n / 6.0 * (moments.skewness.powi(2) + kurtosis.powi(2) / 4.0);

    Ok(NormalityResults {
        descriptive,
        skewness: moments.skewness,
        kurtosis,
        jarque_bera,
        p_value: chi_square_sf(jarque_bera, 2.0),
        is_normal: moments.is_normal(),
    })
}

/// Welch two-sample t-test over `(group, value)` observations.
///
/// Exactly two groups with at least two observations each are required. The
/// mean difference is group 1 minus group 2, groups ordered by first
/// appearance.
pub fn welch_t_test(observations: &[(String, f64)], confidence_level: f64) -> Result<TTestResults> {
    let labels = ordered_labels(observations.iter().map(|(g, _)| g));
    if labels.len() != 2 {
        return Err(AdvisorError::execution(
            "t-test",
            format!("exactly two groups are required, found {}", labels.len()),
        ));
    }

    let mut groups = Vec::with_capacity(2);
    for label in &labels {
        let values: Vec<f64> = observations
            .iter()
            .filter(|(g, _)| g == label)
            .map(|(_, v)| *v)
            .collect();
        if values.len() < 2 {
            return Err(AdvisorError::execution(
                "t-test",
                format!("group '{label}' has fewer than two observations"),
            ));
        }
        let m = mean(&values).unwrap_or(f64::NAN);
        let v = sample_variance(&values).unwrap_or(f64::NAN);
        groups.push((label.clone(), values.len() as f64, m, v));
    }
    let (label1, n1, m1, v1) = groups.remove(0);
    let (label2, n2, m2, v2) = groups.remove(0);

    let a = v1 / n1;
    let b = v2 / n2;
    let se = (a + b).sqrt();
    if se.is_nan() || se <= 0.0 {
        return Err(AdvisorError::execution("t-test", "no within-group variance"));
    }
    let difference = m1 - m2;
    let t = difference / se;
    let df = (a + b).powi(2) / (a.powi(2) / (n1 - 1.0) + b.powi(2) / (n2 - 1.0));
    let critical = student_t_quantile(1.0 - (1.0 - confidence_level) / 2.0, df);
    let pooled_sd = (((n1 - 1.0) * v1 + (n2 - 1.0) * v2) / (n1 + n2 - 2.0)).sqrt();

    Ok(TTestResults {
        t_statistic: t,
        p_value: student_t_two_sided_p(t, df),
        degrees_of_freedom: df,
        mean_difference: difference,
        confidence_interval: (difference - critical * se, difference + critical * se),
        effect_size: if pooled_sd > 0.0 { difference / pooled_sd } else { 0.0 },
        group1: GroupStats {
            label: label1,
            n: n1 as usize,
            mean: m1,
            sd: v1.sqrt(),
        },
        group2: GroupStats {
            label: label2,
            n: n2 as usize,
            mean: m2,
            sd: v2.sqrt(),
        },
    })
}

/// Cross-tabulates `(row, column)` observations and tests independence.
///
/// A 2×2 table gets the two-sided Fisher exact p-value and an odds ratio
/// with Woolf interval; larger tables get Pearson's chi-square. The boolean
/// is true when the exact test was used.
pub fn contingency(
    observations: &[(String, String)],
    confidence_level: f64,
) -> Result<(ContingencyResults, bool)> {
    let rows = ordered_labels(observations.iter().map(|(r, _)| r));
    let columns = ordered_labels(observations.iter().map(|(_, c)| c));
    if rows.len() < 2 || columns.len() < 2 {
        return Err(AdvisorError::execution(
            "chi-square",
            format!(
                "a table needs at least two rows and two columns, found {}×{}",
                rows.len(),
                columns.len()
            ),
        ));
    }

    let row_index: HashMap<&str, usize> =
        rows.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
    let column_index: HashMap<&str, usize> =
        columns.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
    let mut table = vec![vec![0u64; columns.len()]; rows.len()];
    for (r, c) in observations {
        if let (Some(&i), Some(&j)) = (row_index.get(r.as_str()), column_index.get(c.as_str())) {
            table[i][j] += 1;
        }
    }

    let (chi_square, expected) = pearson_chi_square(&table);
    let degrees_of_freedom = (rows.len() - 1) * (columns.len() - 1);
    let mut results = ContingencyResults {
        row_labels: rows,
        column_labels: columns,
        contingency_table: table,
        p_value: chi_square_sf(chi_square, degrees_of_freedom as f64),
        chi_square: Some(chi_square),
        degrees_of_freedom: Some(degrees_of_freedom),
        expected_frequencies: Some(expected),
        odds_ratio: None,
        odds_ratio_ci: None,
    };

    let two_by_two = match results.contingency_table.as_slice() {
        [r1, r2] => match (r1.as_slice(), r2.as_slice()) {
            ([a, b], [c, d]) => Some([*a, *b, *c, *d]),
            _ => None,
        },
        _ => None,
    };
    if let Some(cells) = two_by_two {
        results.p_value = fisher_exact_two_sided(cells);
        let (odds_ratio, ci) = odds_ratio_with_ci(cells, confidence_level);
        results.odds_ratio = Some(odds_ratio);
        results.odds_ratio_ci = Some(ci);
    }
    let exact = two_by_two.is_some();
    Ok((results, exact))
}

/// Pearson chi-square statistic and expected counts.
fn pearson_chi_square(table: &[Vec<u64>]) -> (f64, Vec<Vec<f64>>) {
    let row_totals: Vec<f64> = table.iter().map(|r| r.iter().sum::<u64>() as f64).collect();
    let columns = table.first().map_or(0, Vec::len);
    let column_totals: Vec<f64> = (0..columns)
        .map(|j| table.iter().map(|r| r.get(j).copied().unwrap_or(0)).sum::<u64>() as f64)
        .collect();
    let total: f64 = row_totals.iter().sum();

    let mut statistic = 0.0;
    let mut expected = Vec::with_capacity(table.len());
    for (row, row_total) in table.iter().zip(&row_totals) {
        let mut expected_row = Vec::with_capacity(columns);
        for (observed, column_total) in row.iter().zip(&column_totals) {
            let e = row_total * column_total / total;
            if e > 0.0 {
                statistic += (*observed as f64 - e).powi(2) / e;
            }
            expected_row.push(e);
        }
        expected.push(expected_row);
    }
    (statistic, expected)
}

/// Two-sided Fisher exact p-value for cells `[a, b, c, d]` of a 2×2 table.
///
/// Sums the hypergeometric probabilities of every table with the observed
/// margins that is no more likely than the observed one.
pub fn fisher_exact_two_sided(cells: [u64; 4]) -> f64 {
    let [a, b, c, d] = cells;
    let row1 = a + b;
    let row2 = c + d;
    let col1 = a + c;
    let total = row1 + row2;
    let ln_choose = |n: u64, k: u64| ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k);
    let denominator = ln_choose(total, col1);
    let probability = |x: u64| (ln_choose(row1, x) + ln_choose(row2, col1 - x) - denominator).exp();

    let observed = probability(a);
    let low = col1.saturating_sub(row2);
    let high = row1.min(col1);
    let p: f64 = (low..=high)
        .map(probability)
        .filter(|&p| p <= observed * (1.0 + FISHER_TOLERANCE))
        .sum();
    p.min(1.0)
}

/// Odds ratio `ad/bc` with a Woolf logit interval.
///
/// A zero cell adds 0.5 to every cell first.
pub fn odds_ratio_with_ci(cells: [u64; 4], confidence_level: f64) -> (f64, (f64, f64)) {
    let correction = if cells.contains(&0) { 0.5 } else { 0.0 };
    let [a, b, c, d] = cells.map(|x| x as f64 + correction);
    let odds_ratio = (a * d) / (b * c);
    let se = (1.0 / a + 1.0 / b + 1.0 / c + 1.0 / d).sqrt();
    let z = normal_quantile(1.0 - (1.0 - confidence_level) / 2.0);
    let log_or = odds_ratio.ln();
    (odds_ratio, ((log_or - z * se).exp(), (log_or + z * se).exp()))
}

/// Pearson or Spearman correlation over `(x, y)` pairs.
pub fn correlation(
    pairs: &[(f64, f64)],
    method: CorrelationMethod,
    confidence_level: f64,
) -> Result<CorrelationResults> {
    let n = pairs.len();
    if n < 3 {
        return Err(AdvisorError::execution(
            "correlation",
            format!("at least three complete pairs are required, found {n}"),
        ));
    }
    let mut xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let mut ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    if method == CorrelationMethod::Spearman {
        xs = average_ranks(&xs);
        ys = average_ranks(&ys);
    }

    let r = pearson_r(&xs, &ys)
        .ok_or_else(|| AdvisorError::execution("correlation", "a variable has no spread"))?;
    let df = n as f64 - 2.0;
    let p_value = if r.abs() >= 1.0 {
        0.0
    } else {
        student_t_two_sided_p(r * (df / (1.0 - r * r)).sqrt(), df)
    };

    let confidence_interval = if r.abs() >= 1.0 {
        (r, r)
    } else if n > 3 {
        let z = r.atanh();
        let se = 1.0 / (n as f64 - 3.0).sqrt();
        let critical = normal_quantile(1.0 - (1.0 - confidence_level) / 2.0);
        ((z - critical * se).tanh(), (z + critical * se).tanh())
    } else {
        (-1.0, 1.0)
    };

    Ok(CorrelationResults {
        method,
        coefficient: r,
        p_value,
        confidence_interval,
        n,
        r2: r * r,
    })
}

fn pearson_r(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}
