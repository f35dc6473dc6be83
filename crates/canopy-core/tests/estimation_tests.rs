//! End-to-end estimates over a small hand-built inventory.
//!
//! Five plots in two strata (EXPNS 1000 and 1500). Plots 1, 2 and 4 are
//! fully forest, plot 3 is non-forest, plot 5 is split 0.7 forest / 0.3
//! non-forest. Every expected number below is written out by direct
//! summation.

use approx::assert_relative_eq;

use canopy_core::tables::{
    AdjustmentBasis, Condition, Coverage, EvalType, Evaluation, GrmComponent, PlotAssignment,
    PlotId, StratumRecord, Tree,
};
use canopy_core::{
    EstimationConfig, EstimationError, EstimationMode, EstimationScope, Estimator,
    EvaluationRequest, InventoryTables, LandType, MeasureKind, Uncertainty, UncertaintyOutput,
    Value,
};

const EVALID: u32 = 12001;
const ADJ_A: f64 = 1.02;
const ADJ_B: f64 = 1.1;

fn condition(plot: PlotId, condid: u8, status: i32, prop: f64, owner: i32) -> Condition {
    let forest = status == 1;
    Condition {
        plt_cn: plot,
        condid,
        cond_status_cd: status,
        condprop_unadj: prop,
        prop_basis: AdjustmentBasis::Subp,
        siteclcd: forest.then_some(3),
        reservcd: forest.then_some(0),
        owngrpcd: Some(owner),
        fortypcd: forest.then_some(503),
        stdszcd: None,
        extra: Default::default(),
    }
}

fn tree(plot: PlotId, spcd: i32, dia: f64, volcfnet: Option<f64>) -> Tree {
    let basis = if dia < 5.0 {
        AdjustmentBasis::Micr
    } else {
        AdjustmentBasis::Subp
    };
    Tree {
        plt_cn: plot,
        condid: 1,
        tree: 1,
        statuscd: 1,
        spcd,
        dia: Some(dia),
        tree_basis: basis,
        tpa_unadj: Some(if dia < 5.0 { 74.965 } else { 6.018 }),
        volcfnet,
        volcfgrs: volcfnet,
        drybio_ag: None,
        tpagrow_unadj: None,
        tpamort_unadj: None,
        growcfal: None,
        component: Some(GrmComponent::Survivor),
        extra: Default::default(),
    }
}

fn stratum(cn: u64, expns: f64, subp: f64) -> StratumRecord {
    StratumRecord {
        evalid: EVALID,
        stratum_cn: cn,
        expns,
        adj_factor_micr: Some(subp + 0.2),
        adj_factor_subp: Some(subp),
        adj_factor_macr: Some(1.0),
        p2pointcnt: None,
    }
}

fn inventory() -> InventoryTables {
    let evaluation = |eval_typ| Evaluation {
        evalid: EVALID,
        statecd: 12,
        eval_typ,
        end_invyr: 2020,
        coverage: Coverage::Full,
        location_nm: None,
    };
    let mut dead = tree(4, 131, 14.0, Some(40.0));
    dead.statuscd = 2;
    dead.tree = 2;

    InventoryTables {
        evaluations: vec![evaluation(EvalType::ExpAll), evaluation(EvalType::ExpVol)],
        strata: vec![stratum(1, 1000.0, ADJ_A), stratum(2, 1500.0, ADJ_B)],
        assignments: [(1, 1), (2, 1), (3, 1), (4, 2), (5, 2)]
            .into_iter()
            .map(|(plt_cn, stratum_cn)| PlotAssignment { evalid: EVALID, plt_cn, stratum_cn })
            .collect(),
        conditions: vec![
            condition(1, 1, 1, 1.0, 10),
            condition(2, 1, 1, 1.0, 40),
            condition(3, 1, 2, 1.0, 40),
            condition(4, 1, 1, 1.0, 40),
            condition(5, 1, 1, 0.7, 10),
            condition(5, 2, 2, 0.3, 10),
        ],
        trees: vec![
            tree(1, 131, 12.0, Some(20.0)),
            tree(2, 316, 3.0, None),
            tree(4, 131, 8.0, Some(10.0)),
            dead,
            tree(5, 316, 15.0, Some(30.0)),
        ],
    }
}

fn scope(tables: &InventoryTables, purpose: EvalType) -> EstimationScope {
    EstimationScope::resolve(tables, &EvaluationRequest::most_recent(&[12]), purpose).unwrap()
}

fn sample_var(v: &[f64]) -> f64 {
    sample_cov(v, v)
}

fn sample_cov(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let (ma, mb) = (a.iter().sum::<f64>() / n, b.iter().sum::<f64>() / n);
    a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / (n - 1.0)
}

#[test]
fn forest_area_total_is_direct_expansion() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let table = Estimator::new(&tables)
        .estimate(&scope, &EstimationConfig::default())
        .unwrap();

    assert_eq!(table.rows.len(), 1);
    let row = &table.rows[0];

    let expected_total = 1000.0 * ADJ_A * (1.0 + 1.0) + 1500.0 * ADJ_B * (1.0 + 0.7);
    let expected_land = 1000.0 * ADJ_A * 3.0 + 1500.0 * ADJ_B * 2.0;
    assert_relative_eq!(row.total.unwrap(), expected_total, max_relative = 1e-12);
    assert_relative_eq!(row.denominator_total.unwrap(), expected_land, max_relative = 1e-12);
    assert_relative_eq!(row.estimate, 100.0 * expected_total / expected_land, max_relative = 1e-12);
    assert_eq!(row.n_plots, 4);
    assert_eq!(row.n_plots_denominator, 5);

    // The stratum-mean shortcut disagrees on these unbalanced strata.
    let mean_a = ADJ_A * 2.0 / 3.0;
    let mean_b = ADJ_B * 1.7 / 2.0;
    let shortcut = mean_a * 1000.0 + mean_b * 1500.0;
    assert!((row.total.unwrap() - shortcut).abs() > 1.0);
}

#[test]
fn forest_area_standard_errors_follow_the_ratio_estimator() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let row = Estimator::new(&tables)
        .estimate(&scope, &EstimationConfig::default())
        .unwrap()
        .rows
        .remove(0);

    let y_a = [ADJ_A, ADJ_A, 0.0];
    let x_a = [ADJ_A, ADJ_A, ADJ_A];
    let y_b = [ADJ_B, 0.7 * ADJ_B];
    let x_b = [ADJ_B, ADJ_B];
    let (w_a, w_b) = (3000.0_f64, 3000.0_f64);

    let v_y = w_a.powi(2) * sample_var(&y_a) / 3.0 + w_b.powi(2) * sample_var(&y_b) / 2.0;
    let v_x = w_a.powi(2) * sample_var(&x_a) / 3.0 + w_b.powi(2) * sample_var(&x_b) / 2.0;
    let c = w_a.powi(2) * sample_cov(&y_a, &x_a) / 3.0 + w_b.powi(2) * sample_cov(&y_b, &x_b) / 2.0;
    let y = 1000.0 * y_a.iter().sum::<f64>() + 1500.0 * y_b.iter().sum::<f64>();
    let x = 1000.0 * x_a.iter().sum::<f64>() + 1500.0 * x_b.iter().sum::<f64>();
    let r = y / x;
    let v_r = ((v_y + r * r * v_x - 2.0 * r * c) / (x * x)).max(0.0);

    match row.total_uncertainty {
        Some(Uncertainty::StdError(se)) => assert_relative_eq!(se, v_y.sqrt(), max_relative = 1e-10),
        other => panic!("unexpected total uncertainty {other:?}"),
    }
    match row.estimate_uncertainty {
        Some(Uncertainty::StdError(se)) => {
            assert_relative_eq!(se, 100.0 * v_r.sqrt(), max_relative = 1e-10)
        }
        other => panic!("unexpected estimate uncertainty {other:?}"),
    }
}

#[test]
fn zero_match_tree_filter_gives_zero_not_error() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let config = EstimationConfig {
        tree_filter: Some("DIA > 100".into()),
        uncertainty: UncertaintyOutput::Cv,
        ..Default::default()
    };
    let table = Estimator::new(&tables).estimate(&scope, &config).unwrap();
    let row = &table.rows[0];
    assert_eq!(row.total, Some(0.0));
    assert_eq!(row.estimate, 0.0);
    assert_eq!(row.estimate_uncertainty, Some(Uncertainty::CvPercent(None)));
    assert!(row.denominator_total.unwrap() > 0.0);
}

#[test]
fn promoted_tree_filter_selects_conditions() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let config = EstimationConfig {
        tree_filter: Some("SPCD == 316".into()),
        ..Default::default()
    };
    let row = Estimator::new(&tables).estimate(&scope, &config).unwrap().rows.remove(0);
    // plots 2 and 5 carry species 316
    let expected = 1000.0 * ADJ_A + 1500.0 * ADJ_B * 0.7;
    assert_relative_eq!(row.total.unwrap(), expected, max_relative = 1e-12);
}

#[test]
fn breakdown_by_land_type_sums_to_one_hundred() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let config = EstimationConfig {
        land_type: LandType::All,
        mode: EstimationMode::Breakdown,
        group_by: vec!["LAND_TYPE".into()],
        ..Default::default()
    };
    let table = Estimator::new(&tables).estimate(&scope, &config).unwrap();

    assert_eq!(table.group_columns, vec!["LAND_TYPE"]);
    assert_eq!(table.rows.len(), 2);
    assert_relative_eq!(table.sum_estimates(), 100.0, max_relative = 1e-12);

    let nonforest = table.row(&[Value::from("NonForest")]).unwrap();
    assert_relative_eq!(
        nonforest.total.unwrap(),
        1000.0 * ADJ_A + 1500.0 * ADJ_B * 0.3,
        max_relative = 1e-12
    );
    // water and non-sampled categories never appear
    assert!(table.row(&[Value::from("Water")]).is_none());
}

#[test]
fn grouped_totals_partition_the_ungrouped_total() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let est = Estimator::new(&tables);
    let all = est.estimate(&scope, &EstimationConfig::default()).unwrap();
    let by_owner = est
        .estimate(
            &scope,
            &EstimationConfig { group_by: vec!["owngrpcd".into()], ..Default::default() },
        )
        .unwrap();

    assert_eq!(by_owner.rows.len(), 2);
    assert_relative_eq!(
        by_owner.sum_totals().unwrap(),
        all.sum_totals().unwrap(),
        max_relative = 1e-12
    );
    // single mode: each owner group is compared against its own land area
    let public = by_owner.row(&[Value::from(40)]).unwrap();
    let land_40 = 1000.0 * ADJ_A * 2.0 + 1500.0 * ADJ_B;
    assert_relative_eq!(public.denominator_total.unwrap(), land_40, max_relative = 1e-12);
}

#[test]
fn net_volume_per_forest_acre() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpVol);
    let config = EstimationConfig::for_measure(MeasureKind::VolumeNet);
    let table = Estimator::new(&tables).estimate(&scope, &config).unwrap();
    let row = &table.rows[0];

    let total = 1000.0 * ADJ_A * 6.018 * 20.0
        + 1500.0 * ADJ_B * 6.018 * 10.0
        + 1500.0 * ADJ_B * 6.018 * 30.0;
    let forest = 1000.0 * ADJ_A * 2.0 + 1500.0 * ADJ_B * 1.7;
    assert_relative_eq!(row.total.unwrap(), total, max_relative = 1e-12);
    assert_relative_eq!(row.estimate, total / forest, max_relative = 1e-12);
    assert_eq!(table.unit, "cubic feet per acre");
    assert_eq!(row.n_plots, 3);
}

#[test]
fn trees_per_acre_uses_per_tree_basis() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpVol);
    let config = EstimationConfig::for_measure(MeasureKind::TreesPerAcre);
    let row = Estimator::new(&tables).estimate(&scope, &config).unwrap().rows.remove(0);

    // the 3" sapling on plot 2 uses the microplot factor
    let total = 1000.0 * ADJ_A * 6.018
        + 1000.0 * (ADJ_A + 0.2) * 74.965
        + 1500.0 * ADJ_B * 6.018 * 2.0;
    assert_relative_eq!(row.total.unwrap(), total, max_relative = 1e-12);
}

#[test]
fn species_groups_share_the_forest_denominator() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpVol);
    let est = Estimator::new(&tables);
    let all = est.estimate(&scope, &EstimationConfig::for_measure(MeasureKind::VolumeNet)).unwrap();
    let config = EstimationConfig {
        group_by: vec!["SPCD".into()],
        ..EstimationConfig::for_measure(MeasureKind::VolumeNet)
    };
    let by_species = est.estimate(&scope, &config).unwrap();

    assert_relative_eq!(
        by_species.sum_estimates(),
        all.rows[0].estimate,
        max_relative = 1e-12
    );
    for row in &by_species.rows {
        assert_eq!(row.denominator_total, all.rows[0].denominator_total);
    }
}

#[test]
fn scope_for_another_purpose_is_rejected() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let err = Estimator::new(&tables)
        .estimate(&scope, &EstimationConfig::for_measure(MeasureKind::VolumeNet))
        .unwrap_err();
    assert!(matches!(err, EstimationError::Configuration(_)));
}

#[test]
fn missing_factor_for_a_used_basis_is_a_data_integrity_error() {
    let mut tables = inventory();
    tables.strata[0].adj_factor_micr = None;
    let scope = scope(&tables, EvalType::ExpVol);

    let err = Estimator::new(&tables)
        .estimate(&scope, &EstimationConfig::for_measure(MeasureKind::TreesPerAcre))
        .unwrap_err();
    assert!(matches!(err, EstimationError::DataIntegrity(_)));

    // the live sapling has no volume but still declares the microplot basis
    let err = Estimator::new(&tables)
        .estimate(&scope, &EstimationConfig::for_measure(MeasureKind::VolumeNet))
        .unwrap_err();
    assert!(matches!(err, EstimationError::DataIntegrity(_)));

    // filtering the sapling out leaves no microplot records
    assert!(Estimator::new(&tables)
        .estimate(
            &scope,
            &EstimationConfig {
                tree_filter: Some("DIA >= 5".into()),
                ..EstimationConfig::for_measure(MeasureKind::VolumeNet)
            },
        )
        .is_ok());
}

#[test]
fn bad_expressions_fail_before_aggregation() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let est = Estimator::new(&tables);
    for config in [
        EstimationConfig { cond_filter: Some("NOT_A_COLUMN > 1".into()), ..Default::default() },
        EstimationConfig { cond_filter: Some("DIA > 5".into()), ..Default::default() },
        EstimationConfig { tree_filter: Some("DIA >".into()), ..Default::default() },
        EstimationConfig { group_by: vec!["SPCD".into()], ..Default::default() },
    ] {
        let err = est.estimate(&scope, &config).unwrap_err();
        assert!(matches!(err, EstimationError::DomainExpression { .. }), "{err}");
    }
}

#[test]
fn repeated_calls_are_bit_identical() {
    let tables = inventory();
    let scope = scope(&tables, EvalType::ExpAll);
    let config = EstimationConfig {
        group_by: vec!["OWNGRPCD".into(), "LAND_TYPE".into()],
        uncertainty: UncertaintyOutput::Variance,
        ..Default::default()
    };
    let est = Estimator::new(&tables);
    let a = serde_json::to_string(&est.estimate(&scope, &config).unwrap()).unwrap();
    let b = serde_json::to_string(&est.estimate(&scope, &config).unwrap()).unwrap();
    assert_eq!(a, b);
}
