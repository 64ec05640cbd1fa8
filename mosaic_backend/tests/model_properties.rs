//! Property-based checks on randomly generated strip catalogs.

mod support;

use proptest::prelude::*;

use mosaic_backend::algorithms::greedy::{build_mosaics, days_apart};
use mosaic_backend::algorithms::selection::{exclusivity_violations, select};
use mosaic_backend::algorithms::solver::MicroLpSolver;
use mosaic_backend::core::domain::Scene;
use mosaic_backend::preprocessing::score_catalog;
use mosaic_backend::{MosaicOptimizer, OptimizerConfig};

use support::*;

// (day, x0, width, cloud)
fn catalog_strategy() -> impl Strategy<Value = Vec<Scene>> {
    prop::collection::vec((0i64..20, 0.0..9.0f64, 0.5..6.0f64, 0.0..0.4f64), 1..8).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (day, x0, width, cloud))| {
                strip(&format!("s{:02}", i), day, x0, (x0 + width).min(10.0), cloud)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_accepted_mosaics_respect_window_and_minimum(scenes in catalog_strategy()) {
        let config = OptimizerConfig::default();
        let aoi = square_aoi();
        let scored = score_catalog(scenes, &aoi, config.scoring.central_threshold).scored;
        let outcome = build_mosaics(&scored, &aoi, &config.greedy);

        for mosaic in &outcome.mosaics {
            prop_assert!(mosaic.coverage >= config.greedy.min_coverage - 1e-9);
            prop_assert!(mosaic.span_days() <= config.greedy.max_days_apart);

            let dates: Vec<_> = mosaic
                .members
                .iter()
                .map(|id| scored.iter().find(|s| s.id() == id.as_str()).unwrap().scene.acquired)
                .collect();
            for a in &dates {
                for b in &dates {
                    prop_assert!(days_apart(*a, *b) <= config.greedy.max_days_apart);
                }
            }
        }
    }

    #[test]
    fn prop_second_order_never_exceeds_first_order(scenes in catalog_strategy()) {
        let optimizer = MosaicOptimizer::new();
        let aoi = square_aoi();
        let build = optimizer.build_candidates(scenes, &aoi).unwrap();

        for candidate in &build.candidates.mosaics {
            let m = candidate.metrics;
            prop_assert!(m.individual_sum.min(1.0) >= m.coverage - 1e-9);
            prop_assert!((0.0..=1.0).contains(&m.coverage));
            prop_assert!(m.max_cloud <= 0.4 + 1e-12);
        }
        for pair in &build.candidates.pairs {
            prop_assert!(pair.first < pair.second);
            prop_assert!(pair.intersection > 0.0);
        }
    }

    #[test]
    fn prop_decoded_pairs_match_selection(scenes in catalog_strategy()) {
        let mut config = OptimizerConfig::default();
        config.selection.min_net_coverage = 0.0;
        let optimizer = MosaicOptimizer::with_config(config).unwrap();
        let aoi = square_aoi();
        let build = optimizer.build_candidates(scenes, &aoi).unwrap();
        let set = &build.candidates;

        let result = select(set, &optimizer.config().selection, &MicroLpSolver::new()).unwrap();
        let y = &result.assignment.selected;

        prop_assert!(result.selected.len() <= optimizer.config().selection.max_mosaics);
        prop_assert!(exclusivity_violations(set, &result.selected).is_empty());
        for flag in &result.assignment.pairs {
            prop_assert_eq!(flag.both_selected, y[flag.first] && y[flag.second]);
        }
    }
}
