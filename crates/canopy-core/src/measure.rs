//! Measurement rules, one small table entry per `MeasureKind`.
//!
//! The estimator is generic; what differs between area, volume, biomass and
//! the rest is captured here as data: which records carry the measurement,
//! how a record's value is extracted, which trees are in the default domain,
//! how the denominator is defined and how the adjustment basis is chosen.

use crate::config::MeasureKind;
use crate::tables::{GrmComponent, Tree};

/// Pounds per short ton.
const LBS_PER_TON: f64 = 2000.0;

/// Where the numerator measurement comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Condition area proportion.
    Condition,
    /// Tree records aggregated to their condition.
    Tree,
}

/// Universe the ratio denominator covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenominatorRule {
    /// The comparison universe (e.g. all land), so the ratio is a share of it.
    Universe,
    /// The requested land type's own area, so the ratio is per acre of it.
    LandType,
}

/// How a numerator record's adjustment basis is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisRule {
    /// One basis per plot: the dominant condition `PROP_BASIS`.
    PlotDominant,
    /// Each record's declared basis (`TREE_BASIS`).
    PerRecord,
}

#[derive(Debug, Clone, Copy)]
pub struct MeasureSpec {
    pub kind: MeasureKind,
    pub source: RecordSource,
    pub denominator: DenominatorRule,
    pub basis: BasisRule,
    /// Multiplier applied to the ratio (100 for percentages).
    pub scale: f64,
    pub unit: &'static str,
    value: fn(&Tree) -> f64,
    domain: fn(&Tree) -> bool,
}

impl MeasureSpec {
    pub fn for_kind(kind: MeasureKind) -> Self {
        match kind {
            MeasureKind::Area => MeasureSpec {
                kind,
                source: RecordSource::Condition,
                denominator: DenominatorRule::Universe,
                basis: BasisRule::PlotDominant,
                scale: 100.0,
                unit: "percent",
                value: |_| 0.0,
                domain: |_| false,
            },
            MeasureKind::VolumeNet => Self::tree_measure(
                kind,
                |t| tpa(t) * t.volcfnet.unwrap_or(0.0),
                is_live,
                "cubic feet per acre",
            ),
            MeasureKind::VolumeGross => Self::tree_measure(
                kind,
                |t| tpa(t) * t.volcfgrs.unwrap_or(0.0),
                is_live,
                "cubic feet per acre",
            ),
            MeasureKind::Biomass => Self::tree_measure(
                kind,
                |t| tpa(t) * t.drybio_ag.unwrap_or(0.0) / LBS_PER_TON,
                is_live,
                "tons per acre",
            ),
            MeasureKind::TreesPerAcre => Self::tree_measure(kind, tpa, is_live, "trees per acre"),
            MeasureKind::Growth => Self::tree_measure(
                kind,
                |t| t.tpagrow_unadj.unwrap_or(0.0) * t.growcfal.unwrap_or(0.0),
                |t| {
                    matches!(
                        t.component,
                        Some(GrmComponent::Survivor | GrmComponent::Ingrowth | GrmComponent::Reversion)
                    )
                },
                "cubic feet per acre per year",
            ),
            MeasureKind::Mortality => Self::tree_measure(
                kind,
                |t| t.tpamort_unadj.unwrap_or(0.0) * t.volcfnet.unwrap_or(0.0),
                |t| t.component == Some(GrmComponent::Mortality),
                "cubic feet per acre per year",
            ),
        }
    }

    fn tree_measure(
        kind: MeasureKind,
        value: fn(&Tree) -> f64,
        domain: fn(&Tree) -> bool,
        unit: &'static str,
    ) -> Self {
        MeasureSpec {
            kind,
            source: RecordSource::Tree,
            denominator: DenominatorRule::LandType,
            basis: BasisRule::PerRecord,
            scale: 1.0,
            unit,
            value,
            domain,
        }
    }

    /// Unadjusted per-acre contribution of one tree. Missing values count as
    /// zero.
    pub fn tree_value(&self, tree: &Tree) -> f64 {
        (self.value)(tree)
    }

    /// Whether a tree belongs to the measure's default domain (live trees for
    /// inventory measures, the matching GRM components for change measures).
    pub fn tree_in_domain(&self, tree: &Tree) -> bool {
        (self.domain)(tree)
    }
}

fn tpa(t: &Tree) -> f64 {
    t.tpa_unadj.unwrap_or(0.0)
}

fn is_live(t: &Tree) -> bool {
    t.statuscd == 1
}
