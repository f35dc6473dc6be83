//! Post-stratified population estimates: totals, the ratio of means, and
//! their variances.
//!
//! Totals are direct expansion, `Ŷ = Σ_h EXPNS_h · Σ_i y_hi`. Never compute
//! them as `Σ_h ȳ_h · A_h`: that is only equal when each stratum's plots
//! share the same expansion, and the two diverge on real data.
//!
//! Variances follow the post-stratified estimator with
//! `A_h = EXPNS_h · n_h`:
//!
//! ```text
//! V(Ŷ)   = Σ_h A_h² · s²_y,h / n_h
//! C(Ŷ,X̂) = Σ_h A_h² · s_xy,h / n_h
//! R      = Ŷ / X̂                       (0 when X̂ = 0)
//! V(R)   = (V(Ŷ) + R²·V(X̂) − 2R·C) / X̂²  (floored at 0)
//! ```

use serde::{Deserialize, Serialize};

use crate::stats::StratumStats;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PopulationEstimate {
    pub numerator_total: f64,
    pub numerator_variance: f64,
    pub denominator_total: f64,
    pub denominator_variance: f64,
    pub covariance: f64,
    pub ratio: f64,
    pub ratio_variance: f64,
}

impl PopulationEstimate {
    pub fn from_strata(strata: &[StratumStats]) -> Self {
        let mut est = PopulationEstimate::default();
        for s in strata.iter().filter(|s| s.n > 0) {
            let a2_over_n = s.weight().powi(2) / s.n as f64;
            est.numerator_total += s.expns * s.sum_y;
            est.denominator_total += s.expns * s.sum_x;
            est.numerator_variance += a2_over_n * s.var_y;
            est.denominator_variance += a2_over_n * s.var_x;
            est.covariance += a2_over_n * s.cov_xy;
        }

        if est.denominator_total != 0.0 {
            let r = est.numerator_total / est.denominator_total;
            let v = (est.numerator_variance + r * r * est.denominator_variance
                - 2.0 * r * est.covariance)
                / est.denominator_total.powi(2);
            est.ratio = r;
            // rounding can push a near-zero variance negative
            est.ratio_variance = v.max(0.0);
        }
        est
    }

    pub fn numerator_std_error(&self) -> f64 {
        self.numerator_variance.sqrt()
    }

    pub fn ratio_std_error(&self) -> f64 {
        self.ratio_variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stratum(expns: f64, ys: &[f64], xs: &[f64]) -> StratumStats {
        let n = ys.len();
        let my = ys.iter().sum::<f64>() / n as f64;
        let mx = xs.iter().sum::<f64>() / n as f64;
        let cov = |a: &[f64], ma: f64, b: &[f64], mb: f64| {
            if n < 2 {
                0.0
            } else {
                a.iter().zip(b).map(|(p, q)| (p - ma) * (q - mb)).sum::<f64>() / (n - 1) as f64
            }
        };
        StratumStats {
            n,
            expns,
            sum_y: ys.iter().sum(),
            sum_x: xs.iter().sum(),
            mean_y: my,
            mean_x: mx,
            var_y: cov(ys, my, ys, my),
            var_x: cov(xs, mx, xs, mx),
            cov_xy: cov(ys, my, xs, mx),
        }
    }

    #[test]
    fn totals_are_direct_expansion() {
        let s = [
            stratum(1000.0, &[1.0, 0.7, 0.0], &[1.0, 1.0, 1.0]),
            stratum(1500.0, &[1.0, 1.0], &[1.0, 1.0]),
        ];
        let e = PopulationEstimate::from_strata(&s);
        assert_relative_eq!(e.numerator_total, 1000.0 * 1.7 + 1500.0 * 2.0);
        assert_relative_eq!(e.denominator_total, 3000.0 + 3000.0);
        assert_relative_eq!(e.ratio, 4700.0 / 6000.0);
    }

    #[test]
    fn zero_denominator_gives_zero_ratio() {
        let s = [stratum(1000.0, &[0.0, 0.0], &[0.0, 0.0])];
        let e = PopulationEstimate::from_strata(&s);
        assert_eq!(e.ratio, 0.0);
        assert_eq!(e.ratio_variance, 0.0);
    }

    #[test]
    fn ratio_variance_matches_formula() {
        let s = [
            stratum(500.0, &[2.0, 4.0, 0.0, 1.0], &[1.0, 1.0, 0.5, 1.0]),
            stratum(800.0, &[3.0, 5.0], &[1.0, 0.8]),
        ];
        let e = PopulationEstimate::from_strata(&s);

        let mut vy = 0.0;
        let mut vx = 0.0;
        let mut c = 0.0;
        for st in &s {
            let a = st.expns * st.n as f64;
            vy += a * a * st.var_y / st.n as f64;
            vx += a * a * st.var_x / st.n as f64;
            c += a * a * st.cov_xy / st.n as f64;
        }
        let r = e.numerator_total / e.denominator_total;
        let expected = (vy + r * r * vx - 2.0 * r * c) / e.denominator_total.powi(2);
        assert_relative_eq!(e.numerator_variance, vy, max_relative = 1e-12);
        assert_relative_eq!(e.ratio_variance, expected.max(0.0), max_relative = 1e-12);
    }

    #[test]
    fn single_plot_strata_have_no_variance() {
        let s = [stratum(1000.0, &[3.0], &[1.0]), stratum(2000.0, &[1.0], &[1.0])];
        let e = PopulationEstimate::from_strata(&s);
        assert_eq!(e.numerator_variance, 0.0);
        assert_eq!(e.ratio_variance, 0.0);
    }
}
