//! Two-stage aggregation: records → condition/plot sums → adjusted plot
//! values.
//!
//! Stage 1 sums indicator-weighted measurements per plot, kept separate by
//! adjustment basis. Stage 2 applies the stratum adjustment factor for each
//! basis and adds the results. Expansion is not applied here; plot values
//! stay per-plot and the stratum statistics expand them.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::EstimationMode;
use crate::domain::{DomainBuilder, GroupKey, Grouping, Indicators};
use crate::error::{EstimationError, Result};
use crate::measure::{BasisRule, RecordSource};
use crate::stratification::{StratificationTable, Stratum};
use crate::tables::{AdjustmentBasis, Condition, InventoryTables, PlotId, Tree};

/// Per-plot sums split by adjustment basis. A basis counts as used once any
/// record is added under it, even when its values sum to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasisSums {
    sums: [f64; 3],
    used: [bool; 3],
}

impl BasisSums {
    pub fn add(&mut self, basis: AdjustmentBasis, value: f64) {
        self.sums[basis.index()] += value;
        self.used[basis.index()] = true;
    }

    pub fn total(&self) -> f64 {
        self.sums.iter().sum()
    }

    pub fn is_used(&self, basis: AdjustmentBasis) -> bool {
        self.used[basis.index()]
    }

    /// Adjusted value: each basis sum times its stratum factor. With
    /// `single` set, the whole sum is adjusted by that one basis instead.
    /// A used basis without a stratum factor is an error.
    pub fn adjusted(&self, stratum: &Stratum, single: Option<AdjustmentBasis>) -> Result<f64> {
        if let Some(basis) = single {
            if !self.used.contains(&true) {
                return Ok(0.0);
            }
            return Ok(self.total() * stratum.adjustment(basis)?);
        }
        let mut out = 0.0;
        for basis in AdjustmentBasis::ALL {
            if self.is_used(basis) {
                out += self.sums[basis.index()] * stratum.adjustment(basis)?;
            }
        }
        Ok(out)
    }
}

/// Adjusted denominator values.
#[derive(Debug, Clone, PartialEq)]
pub enum Denominator {
    /// One denominator shared by every group.
    Shared(BTreeMap<PlotId, f64>),
    /// Each group restricted to its own slice of the universe.
    ByGroup(BTreeMap<GroupKey, BTreeMap<PlotId, f64>>),
}

impl Denominator {
    /// Denominator plot values for `group`; empty when the group has none.
    pub fn for_group(&self, group: &GroupKey) -> Option<&BTreeMap<PlotId, f64>> {
        match self {
            Denominator::Shared(x) => Some(x),
            Denominator::ByGroup(m) => m.get(group),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Denominator::Shared(_))
    }
}

/// Adjusted, un-expanded plot values for every output group.
#[derive(Debug, Clone)]
pub struct PlotTotals {
    /// Groups to report, ascending. The ungrouped case is one empty key.
    pub groups: Vec<GroupKey>,
    pub numerator: BTreeMap<GroupKey, BTreeMap<PlotId, f64>>,
    pub denominator: Denominator,
    /// Plots whose conditions carried more than one `PROP_BASIS`.
    pub mixed_basis_plots: usize,
}

impl PlotTotals {
    pub fn numerator_for(&self, group: &GroupKey) -> Option<&BTreeMap<PlotId, f64>> {
        self.numerator.get(group)
    }
}

/// Dominant `PROP_BASIS` per plot: the basis covering the largest share of
/// the plot's condition proportion, ties going to the larger basis.
pub fn plot_dominant_basis<'c>(
    conditions: impl IntoIterator<Item = &'c Condition>,
) -> (BTreeMap<PlotId, AdjustmentBasis>, usize) {
    let mut shares: BTreeMap<PlotId, [Option<f64>; 3]> = BTreeMap::new();
    for c in conditions {
        let slot = &mut shares.entry(c.plt_cn).or_default()[c.prop_basis.index()];
        *slot = Some(slot.unwrap_or(0.0) + c.condprop_unadj);
    }

    let mut mixed = 0;
    let dominant = shares
        .into_iter()
        .map(|(plot, s)| {
            if s.iter().filter(|v| v.is_some()).count() > 1 {
                mixed += 1;
            }
            let basis = AdjustmentBasis::ALL
                .into_iter()
                .filter(|b| s[b.index()].is_some())
                .max_by(|a, b| {
                    let (sa, sb) = (s[a.index()].unwrap_or(0.0), s[b.index()].unwrap_or(0.0));
                    sa.total_cmp(&sb).then(a.cmp(b))
                })
                .unwrap_or_default();
            (plot, basis)
        })
        .collect();
    (dominant, mixed)
}

fn stratum_of(strat: &StratificationTable, plot: PlotId) -> Result<&Stratum> {
    strat
        .get(plot)
        .ok_or_else(|| EstimationError::DataIntegrity(format!("plot {plot} has no stratum assignment")))
}

/// Run both aggregation stages for one estimation call.
pub fn aggregate(
    tables: &InventoryTables,
    strat: &StratificationTable,
    domain: &DomainBuilder<'_>,
    grouping: &Grouping,
    mode: EstimationMode,
) -> Result<PlotTotals> {
    let spec = domain.spec();
    let in_scope: Vec<&Condition> = tables
        .conditions
        .iter()
        .filter(|c| strat.contains(c.plt_cn))
        .collect();
    let cond_index: BTreeMap<(PlotId, u8), &Condition> =
        in_scope.iter().map(|c| (c.key(), *c)).collect();

    let (dominant, mixed_basis_plots) = plot_dominant_basis(in_scope.iter().copied());
    if mixed_basis_plots > 0 {
        warn!(
            plots = mixed_basis_plots,
            "plots with mixed condition adjustment bases; using the dominant basis"
        );
    }

    let scoped_trees: Vec<&Tree> = tables
        .trees
        .iter()
        .filter(|t| strat.contains(t.plt_cn))
        .collect();
    let indicators =
        domain.condition_indicators(in_scope.iter().copied(), scoped_trees.iter().copied());

    // Group-restricted denominators only for single-mode condition groups;
    // breakdown and tree-level keys share one universe.
    let by_group = mode == EstimationMode::Single && !grouping.is_empty() && !grouping.has_tree_columns();
    let condition_keyed = !grouping.has_tree_columns();

    // 1. Stage one: plot sums by basis.
    let mut num_sums: BTreeMap<GroupKey, BTreeMap<PlotId, BasisSums>> = BTreeMap::new();
    let mut den_shared: BTreeMap<PlotId, f64> = BTreeMap::new();
    let mut den_groups: BTreeMap<GroupKey, BTreeMap<PlotId, f64>> = BTreeMap::new();
    let mut groups: BTreeSet<GroupKey> = BTreeSet::new();

    for c in &in_scope {
        let ind = indicators.get(&c.key()).copied().unwrap_or_default();
        if ind.denominator == 0.0 {
            continue;
        }
        let area = ind.denominator * c.condprop_unadj;
        let key = if condition_keyed { grouping.condition_key(c) } else { GroupKey::new() };
        if by_group {
            *den_groups.entry(key.clone()).or_default().entry(c.plt_cn).or_default() += area;
        } else {
            *den_shared.entry(c.plt_cn).or_default() += area;
        }
        if condition_keyed {
            groups.insert(key.clone());
        }
        if spec.source == RecordSource::Condition && ind.numerator > 0.0 {
            num_sums
                .entry(key)
                .or_default()
                .entry(c.plt_cn)
                .or_default()
                .add(c.prop_basis, ind.numerator * c.condprop_unadj);
        }
    }

    if spec.source == RecordSource::Tree {
        let mut orphans = 0usize;
        for t in &scoped_trees {
            let Some(cond) = cond_index.get(&t.condition_key()) else {
                orphans += 1;
                continue;
            };
            let ind: Indicators = indicators.get(&t.condition_key()).copied().unwrap_or_default();
            if ind.numerator == 0.0 || !domain.tree_qualifies(t) {
                continue;
            }
            let key = grouping.tree_key(t, cond);
            groups.insert(key.clone());
            num_sums
                .entry(key)
                .or_default()
                .entry(t.plt_cn)
                .or_default()
                .add(t.tree_basis, ind.numerator * spec.tree_value(t));
        }
        if orphans > 0 {
            return Err(EstimationError::DataIntegrity(format!(
                "{orphans} tree records reference conditions that do not exist"
            )));
        }
    }

    if grouping.is_empty() {
        groups.insert(GroupKey::new());
    }

    // 2. Stage two: adjustment factors.
    let plot_basis = |plot: PlotId| dominant.get(&plot).copied().unwrap_or_default();

    let single_basis = spec.basis == BasisRule::PlotDominant;
    let mut numerator = BTreeMap::new();
    for (key, plots) in num_sums {
        let mut adjusted = BTreeMap::new();
        for (plot, sums) in plots {
            let basis = single_basis.then(|| plot_basis(plot));
            adjusted.insert(plot, sums.adjusted(stratum_of(strat, plot)?, basis)?);
        }
        numerator.insert(key, adjusted);
    }

    let adjust_area = |values: BTreeMap<PlotId, f64>| -> Result<BTreeMap<PlotId, f64>> {
        values
            .into_iter()
            .map(|(plot, area)| {
                let factor = stratum_of(strat, plot)?.adjustment(plot_basis(plot))?;
                Ok((plot, area * factor))
            })
            .collect()
    };
    let denominator = if by_group {
        Denominator::ByGroup(
            den_groups
                .into_iter()
                .map(|(k, v)| Ok((k, adjust_area(v)?)))
                .collect::<Result<_>>()?,
        )
    } else {
        Denominator::Shared(adjust_area(den_shared)?)
    };

    debug!(
        groups = groups.len(),
        numerator_plots = numerator.values().map(BTreeMap::len).sum::<usize>(),
        shared_denominator = denominator.is_shared(),
        "aggregation complete"
    );

    Ok(PlotTotals {
        groups: groups.into_iter().collect(),
        numerator,
        denominator,
        mixed_basis_plots,
    })
}
