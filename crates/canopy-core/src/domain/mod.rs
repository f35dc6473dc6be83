//! Domain indicator construction.
//!
//! Every condition gets a numerator indicator `N` and a denominator
//! indicator `D`, with `N ≤ D` always. `D` marks the comparison universe;
//! `N` marks the subset being estimated.
//!
//! | measure | mode      | D                                  | N                          |
//! |---------|-----------|------------------------------------|----------------------------|
//! | area    | single    | universe ∧ cond_filter             | D ∧ land_type ∧ any(tree)  |
//! | area    | breakdown | universe ∧ land_type ∧ cond_filter | D ∧ any(tree)              |
//! | tree    | both      | universe ∧ land_type ∧ cond_filter | D (trees filtered after)   |
//!
//! `any(tree)` is the tree filter promoted to the condition: true when at
//! least one tree on the condition satisfies it.

pub mod expr;
pub mod grouping;
pub mod land;

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::config::{EstimationConfig, EstimationMode};
use crate::error::Result;
use crate::measure::{DenominatorRule, MeasureSpec, RecordSource};
use crate::tables::{Condition, InventoryTables, PlotId, Tree};

use expr::FilterExpr;

pub use grouping::{GroupKey, Grouping};

/// Numerator/denominator membership of one condition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Indicators {
    pub numerator: f64,
    pub denominator: f64,
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Parsed and validated domain rules for one estimation call.
#[derive(Debug, Clone)]
pub struct DomainBuilder<'a> {
    config: &'a EstimationConfig,
    spec: MeasureSpec,
    cond_filter: Option<FilterExpr>,
    tree_filter: Option<FilterExpr>,
}

impl<'a> DomainBuilder<'a> {
    /// Parse both filters and check them against the available columns.
    /// Fails before any record is touched.
    pub fn new(config: &'a EstimationConfig, spec: MeasureSpec, tables: &InventoryTables) -> Result<Self> {
        let cond_filter = config
            .cond_filter
            .as_deref()
            .map(|src| FilterExpr::parse_for(src, &tables.condition_columns(), "condition"))
            .transpose()?;
        let tree_filter = config
            .tree_filter
            .as_deref()
            .map(|src| FilterExpr::parse_for(src, &tables.tree_columns(), "tree"))
            .transpose()?;
        Ok(Self { config, spec, cond_filter, tree_filter })
    }

    pub fn spec(&self) -> &MeasureSpec {
        &self.spec
    }

    fn in_denominator(&self, cond: &Condition) -> bool {
        let cfg = self.config;
        let land_restricted = self.spec.denominator == DenominatorRule::LandType
            || cfg.mode == EstimationMode::Breakdown;
        cfg.universe.contains(cond)
            && (!land_restricted || cfg.land_type.matches(cond, &cfg.universe))
            && self.cond_filter.as_ref().map_or(true, |f| f.matches(cond))
    }

    fn in_numerator(&self, cond: &Condition, in_denominator: bool, promoted: bool) -> bool {
        let cfg = self.config;
        in_denominator
            && promoted
            && (cfg.mode == EstimationMode::Breakdown || cfg.land_type.matches(cond, &cfg.universe))
    }

    /// Indicators for every condition, keyed by `(PLT_CN, CONDID)`.
    pub fn condition_indicators<'c, 't>(
        &self,
        conditions: impl IntoIterator<Item = &'c Condition>,
        trees: impl IntoIterator<Item = &'t Tree>,
    ) -> BTreeMap<(PlotId, u8), Indicators> {
        // Tree filter promoted to the condition level (area only; tree
        // measures apply it per tree).
        let promoted: Option<BTreeSet<(PlotId, u8)>> = match (&self.tree_filter, self.spec.source) {
            (Some(f), RecordSource::Condition) => Some(
                trees
                    .into_iter()
                    .filter(|t| f.matches(*t))
                    .map(Tree::condition_key)
                    .collect(),
            ),
            _ => None,
        };

        let out: BTreeMap<(PlotId, u8), Indicators> = conditions
            .into_iter()
            .map(|c| {
                let d = self.in_denominator(c);
                let promoted_ok = promoted.as_ref().map_or(true, |set| set.contains(&c.key()));
                let n = self.in_numerator(c, d, promoted_ok);
                (c.key(), Indicators { numerator: flag(n), denominator: flag(d) })
            })
            .collect();

        debug!(
            conditions = out.len(),
            in_denominator = out.values().filter(|i| i.denominator > 0.0).count(),
            in_numerator = out.values().filter(|i| i.numerator > 0.0).count(),
            "domain indicators built"
        );
        out
    }

    /// Whether a tree on a numerator condition counts toward a tree measure.
    pub fn tree_qualifies(&self, tree: &Tree) -> bool {
        self.spec.tree_in_domain(tree) && self.tree_filter.as_ref().map_or(true, |f| f.matches(tree))
    }
}
