//! End-to-end orchestration.
//!
//! [`MosaicOptimizer`] owns the configuration and the selection solver and
//! chains the two phases:
//!
//! 1. cloud filter, scoring, greedy mosaics and coverage estimation
//!    ([`MosaicOptimizer::build_candidates`])
//! 2. the selection model under the solver budget ([`MosaicOptimizer::select`])
//!
//! [`MosaicOptimizer::optimize`] runs both and attaches the exact-union
//! validation report.

use std::sync::Arc;

use log::{info, warn};

use crate::algorithms::coverage::CoverageEstimator;
use crate::algorithms::greedy::{GreedyMosaicBuilder, GreedyOutcome};
use crate::algorithms::selection::{self, SelectionResult};
use crate::algorithms::solver::{run_with_budget, MicroLpSolver, SelectionSolver};
use crate::algorithms::validation::{validate_selection, CoverageReport};
use crate::config::OptimizerConfig;
use crate::core::domain::{Aoi, CandidateSet, Scene, ScoredScene};
use crate::error::{OptimizationError, OptimizerResult};
use crate::preprocessing::{filter_by_cloud_ceiling, score_catalog, CloudRejection, ScoringFailure};

/// Result of Phase 1 (filter, score, greedy, estimate)
#[derive(Debug, Clone)]
pub struct CandidateBuild {
    pub candidates: CandidateSet,
    /// Scored scenes with their clipped footprints, for validation.
    pub scored: Vec<ScoredScene>,
    pub cloud_rejected: Vec<CloudRejection>,
    pub scoring_failures: Vec<ScoringFailure>,
    pub greedy: GreedyOutcome,
    /// Mosaics dropped by the estimator for geometry failures.
    pub excluded_mosaics: Vec<String>,
}

/// Result of a full run
#[derive(Debug, Clone)]
pub struct OptimizationRun {
    pub build: CandidateBuild,
    pub selection: SelectionResult,
    /// `None` when the exact union could not be computed.
    pub report: Option<CoverageReport>,
}

/// End-to-end mosaic optimizer
pub struct MosaicOptimizer {
    config: OptimizerConfig,
    solver: Arc<dyn SelectionSolver>,
}

impl Default for MosaicOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MosaicOptimizer {
    /// Create an optimizer with default configuration and the microlp solver
    pub fn new() -> Self {
        Self {
            config: OptimizerConfig::default(),
            solver: Arc::new(MicroLpSolver::new()),
        }
    }

    /// Create an optimizer with custom configuration
    ///
    /// The configuration is validated before any phase runs.
    pub fn with_config(config: OptimizerConfig) -> OptimizerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            solver: Arc::new(MicroLpSolver::new()),
        })
    }

    /// Replace the selection solver
    pub fn with_solver(mut self, solver: Arc<dyn SelectionSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Phase 1: filter, score, build and estimate candidate mosaics
    pub fn build_candidates(&self, scenes: Vec<Scene>, aoi: &Aoi) -> OptimizerResult<CandidateBuild> {
        let total = scenes.len();

        // Step 1: Cloud ceiling
        let filtered = filter_by_cloud_ceiling(scenes, self.config.filter.max_cloud_fraction);

        // Step 2: Score against the AOI
        let scoring = score_catalog(filtered.eligible, aoi, self.config.scoring.central_threshold);

        // Step 3: Greedy mosaics
        let greedy = GreedyMosaicBuilder::new(&scoring.scored, aoi, &self.config.greedy).build();

        // Step 4: Second-order metrics and pair intersections
        let estimate = CoverageEstimator::new(aoi, &scoring.scored).estimate(&greedy.mosaics)?;
        let excluded_mosaics = estimate.excluded.clone();
        let candidates = estimate.into_candidate_set(aoi, &scoring.scored);

        info!(
            "Phase 1 complete: {} scenes in, {} scored, {} candidate mosaics, {} overlapping pairs",
            total,
            scoring.scored.len(),
            candidates.mosaics.len(),
            candidates.pairs.len()
        );

        Ok(CandidateBuild {
            candidates,
            scored: scoring.scored,
            cloud_rejected: filtered.rejected,
            scoring_failures: scoring.failures,
            greedy,
            excluded_mosaics,
        })
    }

    /// Phase 2: solve the selection model under the configured budget
    pub async fn select(&self, candidates: &CandidateSet) -> OptimizerResult<SelectionResult> {
        let limit = self.config.solver.time_limit();
        let candidates = candidates.clone();
        let settings = self.config.selection.clone();
        let solver = Arc::clone(&self.solver);

        let outcome = run_with_budget(limit, move || {
            selection::select(&candidates, &settings, solver.as_ref())
        })
        .await?;

        let budget_secs = limit.map(|d| d.as_secs_f64());
        match outcome {
            Some(Err(OptimizationError::SolverTimeout { budget_secs: None })) => {
                Err(OptimizationError::SolverTimeout { budget_secs })
            }
            Some(result) => result,
            None => Err(OptimizationError::SolverTimeout { budget_secs }),
        }
    }

    /// Run both phases and validate the selection against the exact union
    pub async fn optimize(&self, scenes: Vec<Scene>, aoi: &Aoi) -> OptimizerResult<OptimizationRun> {
        let build = self.build_candidates(scenes, aoi)?;
        self.select_and_validate(build, aoi).await
    }

    /// Phase 2 and validation on an existing Phase 1 result
    pub async fn select_and_validate(
        &self,
        build: CandidateBuild,
        aoi: &Aoi,
    ) -> OptimizerResult<OptimizationRun> {
        let selection = self.select(&build.candidates).await?;

        let report = match validate_selection(
            aoi,
            &build.scored,
            &build.candidates,
            &selection,
            &self.config.selection,
        ) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Coverage validation skipped: {}", e);
                None
            }
        };

        Ok(OptimizationRun {
            build,
            selection,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::solver::SolverOutcome;
    use crate::algorithms::SelectionModel;
    use crate::core::geometry::multipolygon_from_coords;
    use crate::error::ConfigError;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn rect_scene(id: &str, x0: f64, x1: f64, cloud: f64) -> Scene {
        Scene {
            id: id.into(),
            acquired: Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
            footprint: multipolygon_from_coords(&[vec![vec![
                [x0, 0.0],
                [x1, 0.0],
                [x1, 10.0],
                [x0, 10.0],
            ]]]),
            valid_pixel_fraction: 1.0,
            cloud_fraction: cloud,
        }
    }

    fn aoi() -> Aoi {
        Aoi::new(
            None,
            multipolygon_from_coords(&[vec![vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]]]),
        )
        .unwrap()
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let mut config = OptimizerConfig::default();
        config.greedy.min_coverage = 0.99;
        let err = MosaicOptimizer::with_config(config).err().unwrap();
        assert!(matches!(
            err,
            OptimizationError::Config(ConfigError::MinAboveTarget { .. })
        ));
    }

    #[test]
    fn test_build_candidates_reports_rejections() {
        let optimizer = MosaicOptimizer::new();
        let scenes = vec![
            rect_scene("a", 0.0, 6.0, 0.0),
            rect_scene("b", 5.0, 9.0, 0.0),
            rect_scene("c", 9.0, 9.5, 0.45),
        ];
        let build = optimizer.build_candidates(scenes, &aoi()).unwrap();

        assert_eq!(build.cloud_rejected.len(), 1);
        assert_eq!(build.scored.len(), 2);
        assert_eq!(build.candidates.mosaics.len(), 1);
        assert!(build.scoring_failures.is_empty());
    }

    #[tokio::test]
    async fn test_select_and_validate_matches_optimize() {
        let optimizer = MosaicOptimizer::new();
        let scenes = || {
            vec![
                rect_scene("a", 0.0, 6.0, 0.0),
                rect_scene("b", 5.0, 9.0, 0.0),
            ]
        };

        let build = optimizer.build_candidates(scenes(), &aoi()).unwrap();
        let staged = optimizer.select_and_validate(build, &aoi()).await.unwrap();
        let direct = optimizer.optimize(scenes(), &aoi()).await.unwrap();

        assert_eq!(staged.selection, direct.selection);
        assert_eq!(staged.report, direct.report);
    }

    struct StuckSolver;

    impl SelectionSolver for StuckSolver {
        fn name(&self) -> &str {
            "stuck"
        }

        fn solve(&self, _model: &SelectionModel) -> OptimizerResult<SolverOutcome> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(SolverOutcome::Infeasible)
        }
    }

    #[tokio::test]
    async fn test_select_times_out_without_incumbent() {
        let mut config = OptimizerConfig::default();
        config.solver.time_limit_secs = Some(0.01);
        let optimizer = MosaicOptimizer::with_config(config)
            .unwrap()
            .with_solver(Arc::new(StuckSolver));

        let build = optimizer
            .build_candidates(vec![rect_scene("a", 0.0, 10.0, 0.0)], &aoi())
            .unwrap();
        let err = optimizer.select(&build.candidates).await.unwrap_err();
        assert!(matches!(
            err,
            OptimizationError::SolverTimeout { budget_secs: Some(b) } if (b - 0.01).abs() < 1e-12
        ));
    }

    struct GaveUpSolver;

    impl SelectionSolver for GaveUpSolver {
        fn name(&self) -> &str {
            "gave-up"
        }

        fn solve(&self, _model: &SelectionModel) -> OptimizerResult<SolverOutcome> {
            Ok(SolverOutcome::TimedOut { incumbent: None })
        }
    }

    #[tokio::test]
    async fn test_timeout_reports_configured_budget() {
        let mut config = OptimizerConfig::default();
        config.solver.time_limit_secs = Some(42.0);
        let optimizer = MosaicOptimizer::with_config(config)
            .unwrap()
            .with_solver(Arc::new(GaveUpSolver));

        let build = optimizer
            .build_candidates(vec![rect_scene("a", 0.0, 10.0, 0.0)], &aoi())
            .unwrap();
        let err = optimizer.select(&build.candidates).await.unwrap_err();
        assert!(matches!(
            err,
            OptimizationError::SolverTimeout { budget_secs: Some(b) } if b == 42.0
        ));
        assert!(err.to_string().contains("budget of 42.0s"));
    }

    struct IncumbentSolver;

    impl SelectionSolver for IncumbentSolver {
        fn name(&self) -> &str {
            "incumbent"
        }

        fn solve(&self, model: &SelectionModel) -> OptimizerResult<SolverOutcome> {
            let values = vec![1.0; model.variables.len()];
            Ok(SolverOutcome::TimedOut {
                incumbent: Some(crate::algorithms::solver::RawSolution {
                    objective: model.objective_value(&values),
                    values,
                }),
            })
        }
    }

    #[tokio::test]
    async fn test_incumbent_is_a_degraded_result() {
        let optimizer = MosaicOptimizer::new().with_solver(Arc::new(IncumbentSolver));
        let run = optimizer
            .optimize(vec![rect_scene("a", 0.0, 10.0, 0.0)], &aoi())
            .await
            .unwrap();

        assert_eq!(run.selection.status, selection::SolveStatus::BestIncumbent);
        assert_eq!(run.selection.selected, vec![0]);
        assert!(run.report.is_some());
    }
}
