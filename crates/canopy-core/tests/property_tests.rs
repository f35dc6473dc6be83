//! Invariants of the estimator over seeded synthetic inventories.

use approx::assert_relative_eq;

use canopy_core::synthetic::{generate_inventory, SyntheticParams};
use canopy_core::{
    EstimateCache, EstimationConfig, EstimationMode, EstimationScope, Estimator,
    EvaluationRequest, InventoryTables, LandType, MeasureKind, Uncertainty, UncertaintyOutput,
};

const SEEDS: [u64; 4] = [1, 7, 42, 2024];

fn scope_for(tables: &InventoryTables, params: &SyntheticParams, measure: MeasureKind) -> EstimationScope {
    EstimationScope::resolve(
        tables,
        &EvaluationRequest::most_recent(&[params.statecd]),
        measure.evaluation_purpose(),
    )
    .unwrap()
}

fn run(tables: &InventoryTables, params: &SyntheticParams, config: &EstimationConfig) -> canopy_core::EstimateTable {
    let scope = scope_for(tables, params, config.measure);
    Estimator::new(tables).estimate(&scope, config).unwrap()
}

#[test]
fn subset_never_outweighs_universe() {
    for seed in SEEDS {
        let params = SyntheticParams::with_seed(seed);
        let tables = generate_inventory(&params);
        for land_type in [LandType::Forest, LandType::Timber, LandType::All] {
            let config = EstimationConfig { land_type, ..Default::default() };
            let row = &run(&tables, &params, &config).rows[0];
            assert!(row.total.unwrap() <= row.denominator_total.unwrap() * (1.0 + 1e-12));
            assert!(row.estimate >= 0.0 && row.estimate <= 100.0 + 1e-9);
        }
    }
}

#[test]
fn breakdown_percentages_sum_to_one_hundred() {
    for seed in SEEDS {
        let params = SyntheticParams::with_seed(seed);
        let tables = generate_inventory(&params);
        for group in ["LAND_TYPE", "OWNGRPCD", "COUNTYCD"] {
            let config = EstimationConfig {
                land_type: LandType::All,
                mode: EstimationMode::Breakdown,
                group_by: vec![group.into()],
                ..Default::default()
            };
            let table = run(&tables, &params, &config);
            assert_relative_eq!(table.sum_estimates(), 100.0, max_relative = 1e-9);
        }
    }
}

#[test]
fn grouped_totals_sum_to_ungrouped_total() {
    for seed in SEEDS {
        let params = SyntheticParams::with_seed(seed);
        let tables = generate_inventory(&params);
        for (measure, group) in [
            (MeasureKind::Area, "FORTYPCD"),
            (MeasureKind::Area, "OWNGRPCD"),
            (MeasureKind::VolumeNet, "SPCD"),
            (MeasureKind::Biomass, "STDSZCD"),
            (MeasureKind::Growth, "SPCD"),
            (MeasureKind::Mortality, "OWNGRPCD"),
        ] {
            let base = EstimationConfig::for_measure(measure);
            let whole = run(&tables, &params, &base).sum_totals().unwrap();
            let grouped = EstimationConfig { group_by: vec![group.into()], ..base };
            let parts = run(&tables, &params, &grouped).sum_totals().unwrap();
            assert_relative_eq!(parts, whole, max_relative = 1e-9, epsilon = 1e-9);
        }
    }
}

#[test]
fn tightening_the_tree_filter_never_increases_the_total() {
    for seed in SEEDS {
        let params = SyntheticParams::with_seed(seed);
        let tables = generate_inventory(&params);
        for measure in [MeasureKind::Area, MeasureKind::VolumeNet, MeasureKind::TreesPerAcre] {
            let mut previous = f64::INFINITY;
            for threshold in [0.0, 5.0, 10.0, 20.0, 40.0] {
                let config = EstimationConfig {
                    tree_filter: Some(format!("DIA >= {threshold}")),
                    ..EstimationConfig::for_measure(measure)
                };
                let total = run(&tables, &params, &config).rows[0].total.unwrap();
                assert!(total <= previous * (1.0 + 1e-12), "{measure:?} DIA >= {threshold}");
                previous = total;
            }
            assert_eq!(previous, 0.0);
        }
    }
}

#[test]
fn uncertainty_is_well_formed() {
    for seed in SEEDS {
        let params = SyntheticParams::with_seed(seed);
        let tables = generate_inventory(&params);
        let config = EstimationConfig {
            group_by: vec!["FORTYPCD".into()],
            uncertainty: UncertaintyOutput::Cv,
            ..Default::default()
        };
        for row in run(&tables, &params, &config).rows {
            match row.estimate_uncertainty {
                Some(Uncertainty::CvPercent(None)) => assert_eq!(row.estimate, 0.0),
                Some(Uncertainty::CvPercent(Some(cv))) => {
                    assert!(row.estimate != 0.0);
                    assert!(cv >= 0.0 && cv.is_finite());
                }
                other => panic!("expected a CV, got {other:?}"),
            }
        }

        let config = EstimationConfig::for_measure(MeasureKind::VolumeGross);
        for row in run(&tables, &params, &config).rows {
            match row.estimate_uncertainty {
                Some(Uncertainty::StdError(se)) => assert!(se >= 0.0),
                other => panic!("expected a standard error, got {other:?}"),
            }
        }
    }
}

#[test]
fn identical_calls_give_identical_output() {
    let params = SyntheticParams::with_seed(11);
    let tables = generate_inventory(&params);
    let config = EstimationConfig {
        group_by: vec!["OWNGRPCD".into(), "SPCD".into()],
        ..EstimationConfig::for_measure(MeasureKind::VolumeNet)
    };
    let a = serde_json::to_string(&run(&tables, &params, &config)).unwrap();
    let b = serde_json::to_string(&run(&tables, &params, &config)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn duplicate_stratum_rows_do_not_change_estimates() {
    let params = SyntheticParams::with_seed(5);
    let dup = SyntheticParams { duplicate_stratum_row: true, ..params.clone() };
    let clean_tables = generate_inventory(&params);
    let dup_tables = generate_inventory(&dup);
    assert_eq!(dup_tables.strata.len(), clean_tables.strata.len() + 1);

    let clean_scope = scope_for(&clean_tables, &params, MeasureKind::Area);
    let dup_scope = scope_for(&dup_tables, &dup, MeasureKind::Area);
    assert_eq!(clean_scope.stratification().duplicate_strata(), 0);
    assert_eq!(dup_scope.stratification().duplicate_strata(), 1);

    let config = EstimationConfig::default();
    assert_eq!(
        run(&clean_tables, &params, &config),
        run(&dup_tables, &dup, &config)
    );
}

#[test]
fn one_scope_serves_many_calls_through_the_cache() {
    let params = SyntheticParams::with_seed(3);
    let tables = generate_inventory(&params);
    let scope = scope_for(&tables, &params, MeasureKind::Area);
    let est = Estimator::new(&tables);
    let cache = EstimateCache::new();

    let configs = [
        EstimationConfig::default(),
        EstimationConfig { land_type: LandType::Timber, ..Default::default() },
        EstimationConfig { cond_filter: Some("OWNGRPCD == 40".into()), ..Default::default() },
    ];
    for _ in 0..2 {
        for config in &configs {
            let cached = cache
                .get_or_compute(&scope, config, || est.estimate(&scope, config))
                .unwrap();
            assert_eq!(*cached, est.estimate(&scope, config).unwrap());
        }
    }
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.stats(), (3, 3));
}
