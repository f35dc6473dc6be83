//! Estimator invariants checked against one synthetic inventory.

use anyhow::{Context, Result};
use serde::Serialize;

use canopy_core::synthetic::{generate_inventory, SyntheticParams};
use canopy_core::{
    EstimateTable, EstimationConfig, EstimationMode, EstimationScope, Estimator,
    EvaluationRequest, InventoryTables, LandType, MeasureKind, Uncertainty, UncertaintyOutput,
};

/// Outcome of one check on one seed.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub check: &'static str,
    pub seed: u64,
    pub passed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

type Outcome = std::result::Result<(), String>;
type Check = fn(&Fixture, f64) -> Result<Outcome>;

pub const CHECKS: [(&str, Check); 7] = [
    ("subset_within_universe", subset_within_universe),
    ("breakdown_sums_to_100", breakdown_sums_to_100),
    ("groups_partition_total", groups_partition_total),
    ("tree_filter_monotone", tree_filter_monotone),
    ("uncertainty_well_formed", uncertainty_well_formed),
    ("zero_match_filter", zero_match_filter),
    ("deterministic", deterministic),
];

pub struct Fixture {
    params: SyntheticParams,
    tables: InventoryTables,
}

impl Fixture {
    pub fn new(params: SyntheticParams) -> Self {
        let tables = generate_inventory(&params);
        Self { params, tables }
    }

    fn estimate(&self, config: &EstimationConfig) -> Result<EstimateTable> {
        let request = EvaluationRequest::most_recent(&[self.params.statecd]);
        let scope = EstimationScope::resolve(&self.tables, &request, config.measure.evaluation_purpose())
            .with_context(|| format!("resolving scope for {:?}", config.measure))?;
        Estimator::new(&self.tables)
            .estimate(&scope, config)
            .with_context(|| format!("estimating {:?}", config.measure))
    }
}

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * a.abs().max(b.abs()).max(1.0)
}

fn first_total(t: &EstimateTable) -> f64 {
    t.rows.first().and_then(|r| r.total).unwrap_or(0.0)
}

fn subset_within_universe(f: &Fixture, tol: f64) -> Result<Outcome> {
    for land_type in [LandType::Forest, LandType::Timber, LandType::All] {
        let table = f.estimate(&EstimationConfig { land_type, ..Default::default() })?;
        for row in &table.rows {
            let (n, d) = (row.total.unwrap_or(0.0), row.denominator_total.unwrap_or(0.0));
            if n > d * (1.0 + tol) {
                return Ok(Err(format!("{land_type:?}: numerator {n} exceeds denominator {d}")));
            }
        }
    }
    Ok(Ok(()))
}

fn breakdown_sums_to_100(f: &Fixture, tol: f64) -> Result<Outcome> {
    for group in ["LAND_TYPE", "OWNGRPCD", "FORTYPCD"] {
        let table = f.estimate(&EstimationConfig {
            land_type: LandType::All,
            mode: EstimationMode::Breakdown,
            group_by: vec![group.to_string()],
            ..Default::default()
        })?;
        let sum = table.sum_estimates();
        if !close(sum, 100.0, tol) {
            return Ok(Err(format!("breakdown by {group} sums to {sum}")));
        }
    }
    Ok(Ok(()))
}

fn groups_partition_total(f: &Fixture, tol: f64) -> Result<Outcome> {
    for (measure, group) in [
        (MeasureKind::Area, "OWNGRPCD"),
        (MeasureKind::Area, "STDSZCD"),
        (MeasureKind::VolumeNet, "SPCD"),
        (MeasureKind::Biomass, "FORTYPCD"),
        (MeasureKind::Mortality, "SPCD"),
    ] {
        let base = EstimationConfig::for_measure(measure);
        let whole = f.estimate(&base)?.sum_totals().unwrap_or(0.0);
        let parts = f
            .estimate(&EstimationConfig { group_by: vec![group.to_string()], ..base })?
            .sum_totals()
            .unwrap_or(0.0);
        if !close(whole, parts, tol) {
            return Ok(Err(format!("{measure:?} by {group}: {parts} vs ungrouped {whole}")));
        }
    }
    Ok(Ok(()))
}

fn tree_filter_monotone(f: &Fixture, tol: f64) -> Result<Outcome> {
    for measure in [MeasureKind::Area, MeasureKind::VolumeNet, MeasureKind::TreesPerAcre] {
        let mut previous = f64::INFINITY;
        for threshold in [1.0, 5.0, 9.0, 15.0, 21.0, 29.0] {
            let total = first_total(&f.estimate(&EstimationConfig {
                tree_filter: Some(format!("DIA >= {threshold}")),
                ..EstimationConfig::for_measure(measure)
            })?);
            if total > previous * (1.0 + tol) {
                return Ok(Err(format!(
                    "{measure:?}: DIA >= {threshold} gives {total}, more than {previous}"
                )));
            }
            previous = total;
        }
    }
    Ok(Ok(()))
}

fn uncertainty_well_formed(f: &Fixture, _tol: f64) -> Result<Outcome> {
    let table = f.estimate(&EstimationConfig {
        group_by: vec!["FORTYPCD".into()],
        uncertainty: UncertaintyOutput::Cv,
        ..Default::default()
    })?;
    for row in &table.rows {
        match row.estimate_uncertainty {
            Some(Uncertainty::CvPercent(None)) if row.estimate == 0.0 => {}
            Some(Uncertainty::CvPercent(Some(cv))) if row.estimate != 0.0 && cv >= 0.0 && cv.is_finite() => {}
            other => {
                return Ok(Err(format!(
                    "group {:?}: estimate {} with uncertainty {other:?}",
                    row.group, row.estimate
                )))
            }
        }
        match row.total_uncertainty {
            Some(Uncertainty::CvPercent(_)) => {}
            other => return Ok(Err(format!("group {:?}: total uncertainty {other:?}", row.group))),
        }
    }
    Ok(Ok(()))
}

fn zero_match_filter(f: &Fixture, _tol: f64) -> Result<Outcome> {
    let table = f.estimate(&EstimationConfig {
        tree_filter: Some("DIA > 1000".into()),
        ..Default::default()
    })?;
    match table.rows.as_slice() {
        [row] if row.total == Some(0.0) && row.estimate == 0.0 => Ok(Ok(())),
        rows => Ok(Err(format!("expected one zero row, got {rows:?}"))),
    }
}

fn deterministic(f: &Fixture, _tol: f64) -> Result<Outcome> {
    let config = EstimationConfig {
        group_by: vec!["OWNGRPCD".into(), "SPCD".into()],
        ..EstimationConfig::for_measure(MeasureKind::VolumeNet)
    };
    let a = serde_json::to_string(&f.estimate(&config)?)?;
    let b = serde_json::to_string(&f.estimate(&config)?)?;
    Ok(if a == b {
        Ok(())
    } else {
        Err("repeated estimate differs".into())
    })
}

/// Run every check against the inventory generated from `seed`.
pub fn run_seed(seed: u64, tol: f64) -> Vec<CheckResult> {
    let fixture = Fixture::new(SyntheticParams::with_seed(seed));
    CHECKS
        .iter()
        .map(|(name, check)| {
            let (passed, detail) = match check(&fixture, tol) {
                Ok(Ok(())) => (true, String::new()),
                Ok(Err(msg)) => (false, msg),
                Err(e) => (false, format!("{e:#}")),
            };
            CheckResult { check: *name, seed, passed, detail }
        })
        .collect()
}
