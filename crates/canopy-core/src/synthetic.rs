//! Seeded synthetic inventories.
//!
//! Produces a complete, internally consistent set of inventory tables for
//! one state: a current and a previous area evaluation, a volume evaluation
//! and a change evaluation carrying both growth and mortality types. All
//! evaluations share one plot set; each has its own strata. The same seed
//! always yields identical tables.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tables::{
    AdjustmentBasis, Condition, Coverage, EvalId, EvalType, Evaluation, GrmComponent,
    InventoryTables, PlotAssignment, PlotId, StratumRecord, Tree,
};
use crate::value::Value;

/// Trees per acre represented by one tally tree on each plot protocol.
const TPA_MICR: f64 = 74.965;
const TPA_SUBP: f64 = 6.018;
const TPA_MACR: f64 = 0.999;

/// Years between change-evaluation measurements.
const REMEASUREMENT_YEARS: f64 = 5.0;

const SPECIES: [i32; 6] = [131, 202, 316, 611, 802, 833];
const FOREST_TYPES: [i32; 5] = [161, 221, 503, 801, 920];
const OWNER_GROUPS: [i32; 4] = [10, 20, 30, 40];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    pub seed: u64,
    pub statecd: u16,
    /// Last inventory year of the current evaluations.
    pub end_invyr: u16,
    pub n_strata: usize,
    pub min_plots_per_stratum: usize,
    pub max_plots_per_stratum: usize,
    /// Share of plots that are entirely non-forest land.
    pub nonforest_share: f64,
    /// Share of plots that are entirely water.
    pub water_share: f64,
    /// Share of plots split into two conditions.
    pub split_share: f64,
    /// Share of plots measured on the macroplot protocol.
    pub macroplot_share: f64,
    pub max_trees_per_condition: usize,
    /// Repeat the first stratum row of the current area evaluation with a
    /// different expansion factor.
    pub duplicate_stratum_row: bool,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            seed: 42,
            statecd: 41,
            end_invyr: 2019,
            n_strata: 4,
            min_plots_per_stratum: 6,
            max_plots_per_stratum: 18,
            nonforest_share: 0.25,
            water_share: 0.05,
            split_share: 0.25,
            macroplot_share: 0.1,
            max_trees_per_condition: 12,
            duplicate_stratum_row: false,
        }
    }
}

impl SyntheticParams {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, ..Self::default() }
    }

    /// Evaluation id in the `SSYYTT` layout (state, two-digit year, type).
    pub fn evalid(&self, end_invyr: u16, type_code: u32) -> EvalId {
        u32::from(self.statecd) * 10_000 + u32::from(end_invyr % 100) * 100 + type_code
    }
}

pub fn generate_inventory(params: &SyntheticParams) -> InventoryTables {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut tables = InventoryTables::default();

    // Plots per stratum; the same layout backs every evaluation.
    let plot_base = PlotId::from(params.statecd) * 1_000_000;
    let mut layout: Vec<Vec<PlotId>> = Vec::with_capacity(params.n_strata);
    let mut next_plot = plot_base;
    for _ in 0..params.n_strata {
        let lo = params.min_plots_per_stratum.max(1);
        let hi = params.max_plots_per_stratum.max(lo);
        let n = rng.gen_range(lo..=hi);
        layout.push((0..n).map(|i| next_plot + i as PlotId).collect());
        next_plot += n as PlotId;
    }

    let previous_yr = params.end_invyr.saturating_sub(REMEASUREMENT_YEARS as u16);
    let evaluations = [
        (params.evalid(previous_yr, 0), vec![EvalType::ExpAll], previous_yr),
        (params.evalid(params.end_invyr, 0), vec![EvalType::ExpAll], params.end_invyr),
        (params.evalid(params.end_invyr, 1), vec![EvalType::ExpVol, EvalType::ExpCurr], params.end_invyr),
        (params.evalid(params.end_invyr, 3), vec![EvalType::ExpGrow, EvalType::ExpMort], params.end_invyr),
    ];

    for (e_idx, (evalid, types, yr)) in evaluations.iter().enumerate() {
        for eval_typ in types {
            tables.evaluations.push(Evaluation {
                evalid: *evalid,
                statecd: params.statecd,
                eval_typ: *eval_typ,
                end_invyr: *yr,
                coverage: Coverage::Full,
                location_nm: Some(format!("STATE {} {}", params.statecd, yr)),
            });
        }
        for (h, plots) in layout.iter().enumerate() {
            let stratum_cn = u64::from(*evalid) * 100 + h as u64 + 1;
            tables.strata.push(StratumRecord {
                evalid: *evalid,
                stratum_cn,
                expns: rng.gen_range(800.0..6000.0_f64).round(),
                adj_factor_micr: Some(rng.gen_range(1.0..1.15)),
                adj_factor_subp: Some(rng.gen_range(1.0..1.1)),
                adj_factor_macr: Some(rng.gen_range(1.0..1.1)),
                p2pointcnt: Some(plots.len() as u32),
            });
            tables.assignments.extend(plots.iter().map(|&plt_cn| PlotAssignment {
                evalid: *evalid,
                plt_cn,
                stratum_cn,
            }));
        }
        if params.duplicate_stratum_row && e_idx == 1 {
            if let Some(first) = tables.strata.iter().find(|s| s.evalid == *evalid).cloned() {
                tables.strata.push(StratumRecord { expns: first.expns * 2.0, ..first });
            }
        }
    }

    for plot in layout.iter().flatten().copied() {
        let conditions = plot_conditions(&mut rng, params, plot);
        for cond in &conditions {
            if cond.cond_status_cd == 1 {
                let n = rng.gen_range(0..=params.max_trees_per_condition);
                let n = (n as f64 * cond.condprop_unadj).round() as u32;
                tables.trees.extend((0..n).map(|_| random_tree(&mut rng, cond)));
            }
        }
        tables.conditions.extend(conditions);
    }

    // Tree numbers unique within a plot.
    let mut per_plot: BTreeMap<PlotId, u32> = BTreeMap::new();
    for t in &mut tables.trees {
        let n = per_plot.entry(t.plt_cn).or_default();
        *n += 1;
        t.tree = *n;
    }

    tables
}

fn plot_conditions(rng: &mut StdRng, params: &SyntheticParams, plot: PlotId) -> Vec<Condition> {
    let prop_basis = if rng.gen_bool(params.macroplot_share.clamp(0.0, 1.0)) {
        AdjustmentBasis::Macr
    } else {
        AdjustmentBasis::Subp
    };
    let u: f64 = rng.gen();
    let status = if u < params.water_share {
        3
    } else if u < params.water_share + params.nonforest_share {
        2
    } else {
        1
    };

    if !rng.gen_bool(params.split_share.clamp(0.0, 1.0)) {
        return vec![condition(rng, plot, 1, status, 1.0, prop_basis)];
    }

    let first = [0.25, 0.5, 0.7, 0.75][rng.gen_range(0..4)];
    // The second condition differs in status most of the time; a few are
    // non-sampled (denied access) or measured on the other protocol.
    let second_status = match rng.gen_range(0..10) {
        0 => 5,
        1..=4 => 1,
        5 => 3,
        _ => 2,
    };
    let second_basis = if rng.gen_bool(0.15) {
        AdjustmentBasis::Macr
    } else {
        prop_basis
    };
    vec![
        condition(rng, plot, 1, status, first, prop_basis),
        condition(rng, plot, 2, second_status, 1.0 - first, second_basis),
    ]
}

fn condition(
    rng: &mut StdRng,
    plot: PlotId,
    condid: u8,
    status: i32,
    prop: f64,
    basis: AdjustmentBasis,
) -> Condition {
    let forest = status == 1;
    let mut extra = BTreeMap::new();
    extra.insert("COUNTYCD".to_string(), Value::from(rng.gen_range(1..=9_i32) * 2 - 1));
    Condition {
        plt_cn: plot,
        condid,
        cond_status_cd: status,
        condprop_unadj: prop,
        prop_basis: basis,
        siteclcd: forest.then(|| rng.gen_range(1..=7)),
        reservcd: forest.then(|| i32::from(rng.gen_bool(0.1))),
        owngrpcd: (status <= 2).then(|| OWNER_GROUPS[rng.gen_range(0..OWNER_GROUPS.len())]),
        fortypcd: forest.then(|| FOREST_TYPES[rng.gen_range(0..FOREST_TYPES.len())]),
        stdszcd: forest.then(|| rng.gen_range(1..=3)),
        extra,
    }
}

fn random_tree(rng: &mut StdRng, cond: &Condition) -> Tree {
    let dia: f64 = (rng.gen_range(1.0..32.0_f64) * 10.0).round() / 10.0;
    let tree_basis = if dia < 5.0 {
        AdjustmentBasis::Micr
    } else if dia >= 24.0 && cond.prop_basis == AdjustmentBasis::Macr {
        AdjustmentBasis::Macr
    } else {
        AdjustmentBasis::Subp
    };
    let tpa = match tree_basis {
        AdjustmentBasis::Micr => TPA_MICR,
        AdjustmentBasis::Subp => TPA_SUBP,
        AdjustmentBasis::Macr => TPA_MACR,
    };
    let live = rng.gen_bool(0.9);
    let merch = dia >= 5.0;
    let volcfnet = merch.then(|| 0.0045 * dia.powf(2.6) * rng.gen_range(0.8..1.2_f64));
    let component = if live {
        if rng.gen_bool(0.1) {
            GrmComponent::Ingrowth
        } else {
            GrmComponent::Survivor
        }
    } else if rng.gen_bool(0.7) {
        GrmComponent::Mortality
    } else {
        GrmComponent::Cut
    };

    Tree {
        plt_cn: cond.plt_cn,
        condid: cond.condid,
        tree: 0,
        statuscd: if live { 1 } else { 2 },
        spcd: SPECIES[rng.gen_range(0..SPECIES.len())],
        dia: Some(dia),
        tree_basis,
        tpa_unadj: Some(tpa),
        volcfnet,
        volcfgrs: volcfnet.map(|v| v * 1.08),
        drybio_ag: Some(0.12 * dia.powf(2.4) * 10.0),
        tpagrow_unadj: live.then_some(tpa / REMEASUREMENT_YEARS),
        tpamort_unadj: (component == GrmComponent::Mortality).then_some(tpa / REMEASUREMENT_YEARS),
        growcfal: (live && merch).then(|| rng.gen_range(0.05..2.5)),
        component: Some(component),
        extra: BTreeMap::new(),
    }
}
