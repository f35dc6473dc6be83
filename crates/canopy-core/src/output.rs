//! Estimation results.

use serde::{Deserialize, Serialize};

use crate::config::{MeasureKind, UncertaintyOutput};
use crate::value::Value;

/// Uncertainty attached to an estimate, in the form the caller requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Uncertainty {
    Variance(f64),
    StdError(f64),
    /// `100 · SE / |estimate|`; undefined (`None`) for a zero estimate.
    CvPercent(Option<f64>),
}

impl Uncertainty {
    pub fn from_variance(output: UncertaintyOutput, variance: f64, estimate: f64) -> Option<Self> {
        match output {
            UncertaintyOutput::None => None,
            UncertaintyOutput::Variance => Some(Uncertainty::Variance(variance)),
            UncertaintyOutput::StdError => Some(Uncertainty::StdError(variance.sqrt())),
            UncertaintyOutput::Cv => Some(Uncertainty::CvPercent(
                (estimate != 0.0).then(|| 100.0 * variance.sqrt() / estimate.abs()),
            )),
        }
    }
}

/// One output row: a group's ratio estimate and, optionally, its totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateRow {
    /// Group values, parallel to [`EstimateTable::group_columns`]. Empty
    /// when ungrouped.
    pub group: Vec<Value>,
    /// Ratio of means, scaled (percent for area).
    pub estimate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_uncertainty: Option<Uncertainty>,
    /// Expanded numerator total.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_uncertainty: Option<Uncertainty>,
    /// Expanded denominator total (acres).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator_total: Option<f64>,
    /// Plots with a nonzero numerator value.
    pub n_plots: usize,
    /// Plots with a nonzero denominator value.
    pub n_plots_denominator: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateTable {
    pub measure: MeasureKind,
    pub unit: String,
    pub group_columns: Vec<String>,
    pub rows: Vec<EstimateRow>,
}

impl EstimateTable {
    /// Row for an exact group key.
    pub fn row(&self, group: &[Value]) -> Option<&EstimateRow> {
        self.rows.iter().find(|r| r.group == group)
    }

    /// Sum of expanded totals across rows; `None` if totals were not requested.
    pub fn sum_totals(&self) -> Option<f64> {
        self.rows.iter().map(|r| r.total).sum()
    }

    pub fn sum_estimates(&self) -> f64 {
        self.rows.iter().map(|r| r.estimate).sum()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
