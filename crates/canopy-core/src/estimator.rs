//! Estimation pipeline.
//!
//! ```text
//! scope ─┐
//!        ├─► domain indicators ─► two-stage aggregation ─┐
//! config ┘                                              ├─► stratum stats ─► population estimate ─► rows
//!                              denominator moments ─────┘
//! ```
//!
//! Everything before the per-group fan-out is computed once. With the
//! `threading` feature, groups are estimated in parallel; results are
//! collected in key order either way, so output is identical.

use std::collections::BTreeMap;

#[cfg(feature = "threading")]
use rayon::prelude::*;
use tracing::{debug, info};

use crate::aggregate::{aggregate, PlotTotals};
use crate::config::EstimationConfig;
use crate::domain::{DomainBuilder, GroupKey, Grouping};
use crate::error::{EstimationError, Result};
use crate::measure::MeasureSpec;
use crate::output::{EstimateRow, EstimateTable, Uncertainty};
use crate::population::PopulationEstimate;
use crate::scope::EstimationScope;
use crate::stats::{stratum_stats, DenominatorMoments};
use crate::stratification::StratificationTable;
use crate::tables::{InventoryTables, PlotId};

/// Runs estimates over one set of inventory tables.
#[derive(Debug, Clone, Copy)]
pub struct Estimator<'a> {
    tables: &'a InventoryTables,
}

impl<'a> Estimator<'a> {
    pub fn new(tables: &'a InventoryTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &'a InventoryTables {
        self.tables
    }

    /// Estimate `config` within `scope`.
    ///
    /// The scope is only read; the same scope can serve any number of
    /// calls.
    pub fn estimate(&self, scope: &EstimationScope, config: &EstimationConfig) -> Result<EstimateTable> {
        debug!(measure = ?config.measure, mode = ?config.mode, "estimate requested");

        // 1. Scope must have been selected for this measure's purpose.
        let wanted = config.measure.evaluation_purpose();
        if let Some(purpose) = scope.purpose() {
            if purpose != wanted {
                return Err(EstimationError::Configuration(format!(
                    "scope was resolved for {purpose:?} evaluations; {:?} needs {wanted:?}",
                    config.measure
                )));
            }
        }

        // 2. Parse filters and grouping; all expression errors surface here.
        let spec = MeasureSpec::for_kind(config.measure);
        let domain = DomainBuilder::new(config, spec, self.tables)?;
        let grouping = Grouping::resolve(&config.group_by, &spec, self.tables)?;

        // 3. Indicators and both aggregation stages.
        let strat = scope.stratification();
        let totals = aggregate(self.tables, strat, &domain, &grouping, config.mode)?;

        // 4. Shared denominator moments, once.
        let shared = totals
            .denominator
            .is_shared()
            .then(|| DenominatorMoments::compute(strat, totals.denominator.for_group(&GroupKey::new())));

        // 5. Per-group statistics and population estimates.
        let job = GroupJob { strat, totals: &totals, shared: shared.as_ref(), config, spec: &spec };

        #[cfg(feature = "threading")]
        let rows: Vec<EstimateRow> = totals.groups.par_iter().map(|g| job.row(g)).collect();
        #[cfg(not(feature = "threading"))]
        let rows: Vec<EstimateRow> = totals.groups.iter().map(|g| job.row(g)).collect();

        info!(
            measure = ?config.measure,
            evaluations = ?scope.evalids(),
            groups = rows.len(),
            plots = strat.n_plots(),
            "estimate complete"
        );

        Ok(EstimateTable {
            measure: config.measure,
            unit: spec.unit.to_string(),
            group_columns: grouping.names(),
            rows,
        })
    }
}

fn nonzero_plots(values: Option<&BTreeMap<PlotId, f64>>) -> usize {
    values.map_or(0, |m| m.values().filter(|v| **v != 0.0).count())
}

/// Read-only inputs for estimating one group.
struct GroupJob<'j> {
    strat: &'j StratificationTable,
    totals: &'j PlotTotals,
    shared: Option<&'j DenominatorMoments>,
    config: &'j EstimationConfig,
    spec: &'j MeasureSpec,
}

impl GroupJob<'_> {
    fn row(&self, group: &GroupKey) -> EstimateRow {
        let y = self.totals.numerator_for(group);
        let x = self.totals.denominator.for_group(group);
        let own;
        let moments = match self.shared {
            Some(m) => m,
            None => {
                own = DenominatorMoments::compute(self.strat, x);
                &own
            }
        };
        let stats = stratum_stats(self.strat, y, moments);
        let pop = PopulationEstimate::from_strata(&stats);

        debug!(group = ?group, total = pop.numerator_total, ratio = pop.ratio, "group estimated");

        let scale = self.spec.scale;
        let estimate = pop.ratio * scale;
        let mode = self.config.uncertainty;
        let with_totals = self.config.totals;

        EstimateRow {
            group: group.clone(),
            estimate,
            estimate_uncertainty: Uncertainty::from_variance(
                mode,
                pop.ratio_variance * scale * scale,
                estimate,
            ),
            total: with_totals.then_some(pop.numerator_total),
            total_uncertainty: if with_totals {
                Uncertainty::from_variance(mode, pop.numerator_variance, pop.numerator_total)
            } else {
                None
            },
            denominator_total: with_totals.then_some(pop.denominator_total),
            n_plots: nonzero_plots(y),
            n_plots_denominator: nonzero_plots(x),
        }
    }
}
