//! Input records handed over by the I/O collaborator.
//!
//! Field names serialise to the inventory program's upper-case column names
//! (`PLT_CN`, `CONDPROP_UNADJ`, ...), so JSON exported from the source
//! database deserialises without a mapping layer. Columns the engine does not
//! model explicitly land in `extra` and stay available to filters.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::columns;
use crate::domain::land::LandCategory;
use crate::value::Value;

pub type EvalId = u32;
pub type PlotId = u64;
pub type StratumId = u64;

// ── Enumerations ─────────────────────────────────────────────────────────────

/// Estimation purpose an evaluation was published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvalType {
    ExpAll,
    ExpCurr,
    ExpVol,
    ExpGrow,
    ExpMort,
    ExpRemv,
}

/// Whether an evaluation covers its whole geography or a sub-region of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Coverage {
    #[default]
    Full,
    Partial,
}

/// Plot protocol a record was measured on; selects the stratum adjustment
/// factor. Ordered by plot size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentBasis {
    Micr,
    #[default]
    Subp,
    Macr,
}

impl AdjustmentBasis {
    pub const ALL: [AdjustmentBasis; 3] =
        [AdjustmentBasis::Micr, AdjustmentBasis::Subp, AdjustmentBasis::Macr];

    pub fn index(self) -> usize {
        match self {
            AdjustmentBasis::Micr => 0,
            AdjustmentBasis::Subp => 1,
            AdjustmentBasis::Macr => 2,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            AdjustmentBasis::Micr => "MICR",
            AdjustmentBasis::Subp => "SUBP",
            AdjustmentBasis::Macr => "MACR",
        }
    }
}

/// Growth-removal-mortality component of a remeasured tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GrmComponent {
    Survivor,
    Ingrowth,
    #[serde(alias = "REVERSION1", alias = "REVERSION2")]
    Reversion,
    #[serde(alias = "MORTALITY1", alias = "MORTALITY2")]
    Mortality,
    #[serde(alias = "CUT1", alias = "CUT2")]
    Cut,
    #[serde(alias = "DIVERSION1", alias = "DIVERSION2")]
    Diversion,
}

impl GrmComponent {
    pub fn code(self) -> &'static str {
        match self {
            GrmComponent::Survivor => "SURVIVOR",
            GrmComponent::Ingrowth => "INGROWTH",
            GrmComponent::Reversion => "REVERSION",
            GrmComponent::Mortality => "MORTALITY",
            GrmComponent::Cut => "CUT",
            GrmComponent::Diversion => "DIVERSION",
        }
    }
}

// ── Population tables ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Evaluation {
    pub evalid: EvalId,
    pub statecd: u16,
    pub eval_typ: EvalType,
    /// Last inventory year of the sampling cycle.
    pub end_invyr: u16,
    #[serde(default)]
    pub coverage: Coverage,
    #[serde(default)]
    pub location_nm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StratumRecord {
    pub evalid: EvalId,
    pub stratum_cn: StratumId,
    /// Acres represented by one plot in this stratum.
    pub expns: f64,
    #[serde(default)]
    pub adj_factor_micr: Option<f64>,
    #[serde(default)]
    pub adj_factor_subp: Option<f64>,
    #[serde(default)]
    pub adj_factor_macr: Option<f64>,
    /// Published phase-2 plot count, when the source carries it.
    #[serde(default)]
    pub p2pointcnt: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PlotAssignment {
    pub evalid: EvalId,
    pub plt_cn: PlotId,
    pub stratum_cn: StratumId,
}

// ── Measurement tables ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Condition {
    pub plt_cn: PlotId,
    pub condid: u8,
    pub cond_status_cd: i32,
    #[serde(default)]
    pub condprop_unadj: f64,
    #[serde(default)]
    pub prop_basis: AdjustmentBasis,
    #[serde(default)]
    pub siteclcd: Option<i32>,
    #[serde(default)]
    pub reservcd: Option<i32>,
    #[serde(default)]
    pub owngrpcd: Option<i32>,
    #[serde(default)]
    pub fortypcd: Option<i32>,
    #[serde(default)]
    pub stdszcd: Option<i32>,
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Tree {
    pub plt_cn: PlotId,
    pub condid: u8,
    pub tree: u32,
    pub statuscd: i32,
    pub spcd: i32,
    #[serde(default)]
    pub dia: Option<f64>,
    #[serde(default)]
    pub tree_basis: AdjustmentBasis,
    #[serde(default)]
    pub tpa_unadj: Option<f64>,
    #[serde(default)]
    pub volcfnet: Option<f64>,
    #[serde(default)]
    pub volcfgrs: Option<f64>,
    #[serde(default)]
    pub drybio_ag: Option<f64>,
    #[serde(default)]
    pub tpagrow_unadj: Option<f64>,
    #[serde(default)]
    pub tpamort_unadj: Option<f64>,
    #[serde(default)]
    pub growcfal: Option<f64>,
    #[serde(default)]
    pub component: Option<GrmComponent>,
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, Value>,
}

impl Condition {
    pub fn key(&self) -> (PlotId, u8) {
        (self.plt_cn, self.condid)
    }
}

impl Tree {
    pub fn condition_key(&self) -> (PlotId, u8) {
        (self.plt_cn, self.condid)
    }
}

// ── Column access ────────────────────────────────────────────────────────────

/// Name-based column access used by filter expressions and grouping.
///
/// `column` returns `None` only for names the record type does not know;
/// a known column with a missing value is `Some(Value::Null)`.
pub trait Record {
    fn column(&self, name: &str) -> Option<Value>;
}

fn extra_column(extra: &BTreeMap<String, Value>, name: &str) -> Option<Value> {
    extra
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

impl Record for Condition {
    fn column(&self, name: &str) -> Option<Value> {
        let v = match name.to_ascii_uppercase().as_str() {
            columns::cond::PLT_CN => Value::from(self.plt_cn),
            columns::cond::CONDID => Value::from(self.condid),
            columns::cond::COND_STATUS_CD => Value::from(self.cond_status_cd),
            columns::cond::CONDPROP_UNADJ => Value::from(self.condprop_unadj),
            columns::cond::PROP_BASIS => Value::from(self.prop_basis.code()),
            columns::cond::SITECLCD => Value::from(self.siteclcd),
            columns::cond::RESERVCD => Value::from(self.reservcd),
            columns::cond::OWNGRPCD => Value::from(self.owngrpcd),
            columns::cond::FORTYPCD => Value::from(self.fortypcd),
            columns::cond::STDSZCD => Value::from(self.stdszcd),
            columns::cond::LAND_TYPE => Value::from(LandCategory::classify(self).label()),
            _ => return extra_column(&self.extra, name),
        };
        Some(v)
    }
}

impl Record for Tree {
    fn column(&self, name: &str) -> Option<Value> {
        let v = match name.to_ascii_uppercase().as_str() {
            columns::tree::PLT_CN => Value::from(self.plt_cn),
            columns::tree::CONDID => Value::from(self.condid),
            columns::tree::TREE => Value::from(self.tree),
            columns::tree::STATUSCD => Value::from(self.statuscd),
            columns::tree::SPCD => Value::from(self.spcd),
            columns::tree::DIA => Value::from(self.dia),
            columns::tree::TREE_BASIS => Value::from(self.tree_basis.code()),
            columns::tree::TPA_UNADJ => Value::from(self.tpa_unadj),
            columns::tree::VOLCFNET => Value::from(self.volcfnet),
            columns::tree::VOLCFGRS => Value::from(self.volcfgrs),
            columns::tree::DRYBIO_AG => Value::from(self.drybio_ag),
            columns::tree::TPAGROW_UNADJ => Value::from(self.tpagrow_unadj),
            columns::tree::TPAMORT_UNADJ => Value::from(self.tpamort_unadj),
            columns::tree::GROWCFAL => Value::from(self.growcfal),
            columns::tree::COMPONENT => Value::from(self.component.map(GrmComponent::code)),
            _ => return extra_column(&self.extra, name),
        };
        Some(v)
    }
}

// ── Inventory bundle ─────────────────────────────────────────────────────────

/// All source tables for one estimation session. Read-only to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryTables {
    pub evaluations: Vec<Evaluation>,
    pub strata: Vec<StratumRecord>,
    pub assignments: Vec<PlotAssignment>,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub trees: Vec<Tree>,
}

impl InventoryTables {
    /// Upper-cased names of every condition column, including extra columns
    /// seen on any record.
    pub fn condition_columns(&self) -> BTreeSet<String> {
        let mut cols: BTreeSet<String> =
            columns::cond::ALL.iter().map(|c| c.to_string()).collect();
        for c in &self.conditions {
            cols.extend(c.extra.keys().map(|k| k.to_ascii_uppercase()));
        }
        cols
    }

    /// Upper-cased names of every tree column, including extra columns.
    pub fn tree_columns(&self) -> BTreeSet<String> {
        let mut cols: BTreeSet<String> =
            columns::tree::ALL.iter().map(|c| c.to_string()).collect();
        for t in &self.trees {
            cols.extend(t.extra.keys().map(|k| k.to_ascii_uppercase()));
        }
        cols
    }
}
