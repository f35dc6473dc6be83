//! Per-stratum moments of adjusted plot values.
//!
//! Every plot assigned to a stratum counts toward `n_h`, including plots
//! with no qualifying records; those contribute zeros. Variances use the
//! sample (n − 1) divisor and are zero for single-plot strata.

use std::collections::BTreeMap;

use crate::stratification::StratificationTable;
use crate::tables::PlotId;

/// Zero-filled values of one stratum, in member order.
fn stratum_values(members: &[PlotId], values: Option<&BTreeMap<PlotId, f64>>) -> Vec<f64> {
    members
        .iter()
        .map(|p| values.and_then(|v| v.get(p)).copied().unwrap_or(0.0))
        .collect()
}

fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f64>() / v.len() as f64
    }
}

/// Sample covariance of two equal-length series; zero below two points.
pub fn sample_covariance(a: &[f64], a_mean: f64, b: &[f64], b_mean: f64) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let s: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - a_mean) * (y - b_mean))
        .sum();
    s / (n - 1) as f64
}

pub fn sample_variance(v: &[f64], v_mean: f64) -> f64 {
    sample_covariance(v, v_mean, v, v_mean)
}

/// One stratum's denominator series with its moments.
#[derive(Debug, Clone, PartialEq)]
struct SeriesMoments {
    values: Vec<f64>,
    mean: f64,
    var: f64,
}

impl SeriesMoments {
    fn new(values: Vec<f64>) -> Self {
        let m = mean(&values);
        let var = sample_variance(&values, m);
        Self { values, mean: m, var }
    }
}

/// Denominator moments for every stratum. When the denominator is shared
/// across groups this is computed once and reused for each group.
#[derive(Debug, Clone, PartialEq)]
pub struct DenominatorMoments {
    strata: Vec<SeriesMoments>,
}

impl DenominatorMoments {
    pub fn compute(strat: &StratificationTable, x: Option<&BTreeMap<PlotId, f64>>) -> Self {
        let strata = (0..strat.strata().len())
            .map(|h| SeriesMoments::new(stratum_values(strat.members(h), x)))
            .collect();
        Self { strata }
    }
}

/// Statistics of one stratum for one group.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StratumStats {
    /// Plots assigned to the stratum (`n_h`).
    pub n: usize,
    pub expns: f64,
    pub sum_y: f64,
    pub sum_x: f64,
    pub mean_y: f64,
    pub mean_x: f64,
    pub var_y: f64,
    pub var_x: f64,
    pub cov_xy: f64,
}

impl StratumStats {
    /// Stratum weight `A_h = EXPNS_h · n_h`.
    pub fn weight(&self) -> f64 {
        self.expns * self.n as f64
    }
}

/// Per-stratum statistics of numerator `y` against precomputed denominator
/// moments. Strata follow the stratification table's order.
pub fn stratum_stats(
    strat: &StratificationTable,
    y: Option<&BTreeMap<PlotId, f64>>,
    x: &DenominatorMoments,
) -> Vec<StratumStats> {
    strat
        .strata()
        .iter()
        .zip(&x.strata)
        .enumerate()
        .map(|(h, (stratum, xm))| {
            let ys = stratum_values(strat.members(h), y);
            let mean_y = mean(&ys);
            StratumStats {
                n: ys.len(),
                expns: stratum.expns,
                sum_y: ys.iter().sum(),
                sum_x: xm.values.iter().sum(),
                mean_y,
                mean_x: xm.mean,
                var_y: sample_variance(&ys, mean_y),
                var_x: xm.var,
                cov_xy: sample_covariance(&ys, mean_y, &xm.values, xm.mean),
            }
        })
        .collect()
}
