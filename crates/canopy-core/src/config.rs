//! Estimation configuration surface.
//!
//! An orchestration layer hands the engine a resolved `EstimationConfig`;
//! `EstimationJob` bundles it with the evaluation request for TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EstimationError, Result};
use crate::evaluation::EvaluationRequest;
use crate::tables::{Condition, EvalType};

/// Attribute being estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureKind {
    Area,
    VolumeNet,
    VolumeGross,
    Biomass,
    TreesPerAcre,
    Growth,
    Mortality,
}

impl MeasureKind {
    /// Evaluation purpose whose stratification applies to this measure.
    pub fn evaluation_purpose(self) -> EvalType {
        match self {
            MeasureKind::Area => EvalType::ExpAll,
            MeasureKind::VolumeNet
            | MeasureKind::VolumeGross
            | MeasureKind::Biomass
            | MeasureKind::TreesPerAcre => EvalType::ExpVol,
            MeasureKind::Growth => EvalType::ExpGrow,
            MeasureKind::Mortality => EvalType::ExpMort,
        }
    }
}

/// Land category the numerator is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandType {
    Forest,
    Timber,
    All,
}

/// Single-category ratio vs. a breakdown whose groups share one universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMode {
    Single,
    Breakdown,
}

/// Which sampling-error figure accompanies each estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyOutput {
    None,
    Variance,
    StdError,
    /// Standard error as a percentage of the estimate.
    Cv,
}

/// Membership rule for the comparison universe.
///
/// Held as data because the exact in-universe status codes belong to the
/// inventory program's methodology, not to this engine. The default is the
/// land universe: forest (1) and non-forest land (2). Water (3, 4) and
/// non-sampled (5) conditions are measured but excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniverseRule {
    pub land_statuses: Vec<i32>,
}

impl Default for UniverseRule {
    fn default() -> Self {
        Self { land_statuses: vec![1, 2] }
    }
}

impl UniverseRule {
    pub fn contains(&self, cond: &Condition) -> bool {
        self.land_statuses.contains(&cond.cond_status_cd)
    }
}

/// Full option set for one estimation call.
///
/// Two configurations that differ in any field must never share a cached
/// result; see `cache::CacheKey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub measure: MeasureKind,
    pub land_type: LandType,
    pub mode: EstimationMode,
    /// Condition or tree columns to group by, in output order.
    pub group_by: Vec<String>,
    /// Condition-level filter expression.
    pub cond_filter: Option<String>,
    /// Tree-level filter. Promoted to the condition level for area.
    pub tree_filter: Option<String>,
    /// Include population totals alongside the ratio estimate.
    pub totals: bool,
    pub uncertainty: UncertaintyOutput,
    pub universe: UniverseRule,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            measure: MeasureKind::Area,
            land_type: LandType::Forest,
            mode: EstimationMode::Single,
            group_by: Vec::new(),
            cond_filter: None,
            tree_filter: None,
            totals: true,
            uncertainty: UncertaintyOutput::StdError,
            universe: UniverseRule::default(),
        }
    }
}

impl EstimationConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| EstimationError::Configuration(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn for_measure(measure: MeasureKind) -> Self {
        Self { measure, ..Self::default() }
    }
}

/// Evaluation request plus estimation options, as stored in a job file:
///
/// ```toml
/// [evaluation]
/// geography = [13]
/// most_recent = true
///
/// [estimate]
/// measure = "volume-net"
/// group_by = ["OWNGRPCD"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimationJob {
    pub evaluation: EvaluationRequest,
    #[serde(default)]
    pub estimate: EstimationConfig,
}

impl EstimationJob {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| EstimationError::Configuration(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
