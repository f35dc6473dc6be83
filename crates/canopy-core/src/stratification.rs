//! Stratification resolver: plot → stratum, expansion and adjustment factors
//! for the selected evaluations.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::error::{EstimationError, Result};
use crate::tables::{AdjustmentBasis, EvalId, PlotAssignment, PlotId, StratumId, StratumRecord};

/// One resolved stratum. Immutable once the table is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Stratum {
    pub evalid: EvalId,
    pub key: StratumId,
    /// Acres represented by one plot.
    pub expns: f64,
    pub adj_micr: Option<f64>,
    pub adj_subp: Option<f64>,
    pub adj_macr: Option<f64>,
    /// Number of plots assigned to this stratum (`n_h`).
    pub n_plots: usize,
}

impl Stratum {
    /// Adjustment factor for a record measured on `basis`.
    pub fn adjustment(&self, basis: AdjustmentBasis) -> Result<f64> {
        let factor = match basis {
            AdjustmentBasis::Micr => self.adj_micr,
            AdjustmentBasis::Subp => self.adj_subp,
            AdjustmentBasis::Macr => self.adj_macr,
        };
        factor.ok_or_else(|| {
            EstimationError::DataIntegrity(format!(
                "stratum {} (evaluation {}) has no {} adjustment factor",
                self.key,
                self.evalid,
                basis.code()
            ))
        })
    }

    /// Stratum weight `A_h`: total acres the stratum represents.
    pub fn weight(&self) -> f64 {
        self.expns * self.n_plots as f64
    }
}

/// Plot-to-stratum table for one estimation scope.
#[derive(Debug, Clone, Default)]
pub struct StratificationTable {
    strata: Vec<Stratum>,
    /// Plots of each stratum, ascending; parallel to `strata`.
    members: Vec<Vec<PlotId>>,
    plot_stratum: BTreeMap<PlotId, usize>,
    duplicate_strata: usize,
    duplicate_assignments: usize,
}

impl StratificationTable {
    /// Build the table for `evalids` from raw stratum and assignment rows.
    ///
    /// Duplicate stratum rows (same evaluation and stratum key) keep the
    /// first row; exact duplicate assignment rows collapse to one. Both are
    /// logged. A plot mapped to two strata, or to a stratum with no stratum
    /// row, is a `DataIntegrityError`.
    pub fn resolve(
        evalids: &[EvalId],
        strata: &[StratumRecord],
        assignments: &[PlotAssignment],
    ) -> Result<Self> {
        let wanted: BTreeSet<EvalId> = evalids.iter().copied().collect();

        // ── Strata, deduplicated by key ─────────────────────────────────────
        let mut by_key: BTreeMap<(EvalId, StratumId), &StratumRecord> = BTreeMap::new();
        let mut duplicate_strata = 0usize;
        for rec in strata.iter().filter(|s| wanted.contains(&s.evalid)) {
            if by_key.contains_key(&(rec.evalid, rec.stratum_cn)) {
                duplicate_strata += 1;
            } else {
                by_key.insert((rec.evalid, rec.stratum_cn), rec);
            }
        }
        if duplicate_strata > 0 {
            warn!(
                duplicates = duplicate_strata,
                "duplicate stratum rows dropped; keeping the first row per stratum"
            );
        }
        if by_key.is_empty() {
            return Err(EstimationError::Configuration(format!(
                "no stratification found for evaluation(s) {evalids:?}"
            )));
        }

        let index: BTreeMap<(EvalId, StratumId), usize> =
            by_key.keys().enumerate().map(|(i, k)| (*k, i)).collect();

        // ── Plot assignments ────────────────────────────────────────────────
        let mut plot_stratum: BTreeMap<PlotId, usize> = BTreeMap::new();
        let mut duplicate_assignments = 0usize;
        for a in assignments.iter().filter(|a| wanted.contains(&a.evalid)) {
            let Some(&idx) = index.get(&(a.evalid, a.stratum_cn)) else {
                return Err(EstimationError::DataIntegrity(format!(
                    "plot {} is assigned to stratum {} which has no stratum record in evaluation {}",
                    a.plt_cn, a.stratum_cn, a.evalid
                )));
            };
            match plot_stratum.get(&a.plt_cn) {
                Some(&prev) if prev == idx => duplicate_assignments += 1,
                Some(&prev) => {
                    let (pe, ps) = by_key.keys().nth(prev).copied().unwrap_or_default();
                    return Err(EstimationError::DataIntegrity(format!(
                        "plot {} maps to more than one stratum: {} (evaluation {}) and {} (evaluation {})",
                        a.plt_cn, ps, pe, a.stratum_cn, a.evalid
                    )));
                }
                None => {
                    plot_stratum.insert(a.plt_cn, idx);
                }
            }
        }
        if duplicate_assignments > 0 {
            warn!(duplicates = duplicate_assignments, "duplicate plot assignments dropped");
        }

        let mut members: Vec<Vec<PlotId>> = vec![Vec::new(); by_key.len()];
        for (&plot, &idx) in &plot_stratum {
            members[idx].push(plot);
        }

        let strata: Vec<Stratum> = by_key
            .values()
            .zip(members.iter())
            .map(|(rec, plots)| {
                if let Some(published) = rec.p2pointcnt {
                    if published as usize != plots.len() {
                        warn!(
                            stratum = rec.stratum_cn,
                            published,
                            assigned = plots.len(),
                            "published plot count differs from assignments"
                        );
                    }
                }
                Stratum {
                    evalid: rec.evalid,
                    key: rec.stratum_cn,
                    expns: rec.expns,
                    adj_micr: rec.adj_factor_micr,
                    adj_subp: rec.adj_factor_subp,
                    adj_macr: rec.adj_factor_macr,
                    n_plots: plots.len(),
                }
            })
            .collect();

        debug!(strata = strata.len(), plots = plot_stratum.len(), "stratification resolved");

        Ok(Self {
            strata,
            members,
            plot_stratum,
            duplicate_strata,
            duplicate_assignments,
        })
    }

    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }

    /// Plots assigned to stratum `idx`, ascending.
    pub fn members(&self, idx: usize) -> &[PlotId] {
        &self.members[idx]
    }

    pub fn stratum_index(&self, plot: PlotId) -> Option<usize> {
        self.plot_stratum.get(&plot).copied()
    }

    /// Stratum (with expansion and every adjustment variant) for a plot.
    pub fn get(&self, plot: PlotId) -> Option<&Stratum> {
        self.stratum_index(plot).map(|i| &self.strata[i])
    }

    pub fn contains(&self, plot: PlotId) -> bool {
        self.plot_stratum.contains_key(&plot)
    }

    pub fn n_plots(&self) -> usize {
        self.plot_stratum.len()
    }

    /// Stratum rows dropped as duplicates of an earlier row with the same key.
    pub fn duplicate_strata(&self) -> usize {
        self.duplicate_strata
    }

    /// Repeated plot assignment rows collapsed to one.
    pub fn duplicate_assignments(&self) -> usize {
        self.duplicate_assignments
    }

    /// Total acres represented by the scope.
    pub fn total_weight(&self) -> f64 {
        self.strata.iter().map(Stratum::weight).sum()
    }
}
