//! Adapter between [`SelectionModel`] and an external MILP engine.
//!
//! The default engine is `good_lp` with the pure-Rust `microlp` backend.
//! [`solve_with_budget`] runs any [`SelectionSolver`] on the blocking pool
//! under a wall-clock limit.

use std::sync::Arc;
use std::time::Duration;

use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
};
use log::{debug, warn};

use crate::algorithms::selection::{Comparison, SelectionModel};
use crate::error::{OptimizationError, OptimizerResult};

/// Variable values returned by a solver, indexed like
/// [`SelectionModel::variables`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    pub values: Vec<f64>,
    pub objective: f64,
}

/// Response of a solver to one model.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverOutcome {
    Optimal(RawSolution),
    /// Budget exhausted; engines that track an incumbent return it.
    TimedOut { incumbent: Option<RawSolution> },
    Infeasible,
}

/// Trait for engines that can solve a binary selection model
pub trait SelectionSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, model: &SelectionModel) -> OptimizerResult<SolverOutcome>;

    /// Internal budget of the engine, if it enforces one.
    fn time_limit(&self) -> Option<Duration> {
        None
    }
}

/// `good_lp` + `microlp` branch-and-bound.
#[derive(Debug, Clone, Default)]
pub struct MicroLpSolver;

impl MicroLpSolver {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionSolver for MicroLpSolver {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(&self, model: &SelectionModel) -> OptimizerResult<SolverOutcome> {
        let mut vars = ProblemVariables::new();
        let xs: Vec<good_lp::Variable> = model
            .variables
            .iter()
            .map(|_| vars.add(variable().binary()))
            .collect();

        let mut objective = Expression::with_capacity(model.objective.len());
        for &(v, coef) in &model.objective {
            objective += coef * xs[v];
        }

        let mut problem = vars.maximise(objective).using(good_lp::microlp);
        for row in &model.constraints {
            let mut lhs = Expression::with_capacity(row.terms.len());
            for &(v, coef) in &row.terms {
                lhs += coef * xs[v];
            }
            let rhs = row.rhs;
            problem = problem.with(match row.comparison {
                Comparison::LessEq => constraint!(lhs <= rhs),
                Comparison::GreaterEq => constraint!(lhs >= rhs),
                Comparison::Equal => constraint!(lhs == rhs),
            });
        }

        match problem.solve() {
            Ok(solution) => {
                let values: Vec<f64> = xs.iter().map(|&x| solution.value(x)).collect();
                let objective = model.objective_value(&values);
                debug!("microlp solved model, objective {:.6}", objective);
                Ok(SolverOutcome::Optimal(RawSolution { values, objective }))
            }
            Err(ResolutionError::Infeasible) => Ok(SolverOutcome::Infeasible),
            Err(e) => Err(OptimizationError::Solver(e.to_string())),
        }
    }
}

/// Runs `f` on the blocking pool, bounded by `limit` when given.
///
/// Returns `Ok(None)` when the limit elapsed before `f` returned. The blocking
/// task is not cancelled; its result is dropped.
pub async fn run_with_budget<T, F>(limit: Option<Duration>, f: F) -> OptimizerResult<Option<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("Solver budget of {:.1}s exhausted", limit.as_secs_f64());
                return Ok(None);
            }
        },
        None => handle.await,
    };
    joined
        .map(Some)
        .map_err(|e| OptimizationError::Internal(format!("solver task failed: {}", e)))
}

/// Solves one model under a wall-clock budget.
///
/// An elapsed budget yields [`SolverOutcome::TimedOut`] without an incumbent.
pub async fn solve_with_budget(
    solver: Arc<dyn SelectionSolver>,
    model: SelectionModel,
    limit: Option<Duration>,
) -> OptimizerResult<SolverOutcome> {
    match run_with_budget(limit, move || solver.solve(&model)).await? {
        Some(outcome) => outcome,
        None => Ok(SolverOutcome::TimedOut { incumbent: None }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::selection::{LinearConstraint, Variable};
    use crate::error::ConstraintClass;

    fn knapsack(capacity: f64) -> SelectionModel {
        // maximise 3a + 2b + 2c s.t. a + b + c <= capacity
        SelectionModel {
            variables: vec![Variable::Select(0), Variable::Select(1), Variable::Select(2)],
            objective: vec![(0, 3.0), (1, 2.0), (2, 2.0)],
            constraints: vec![LinearConstraint {
                name: "cardinality".into(),
                class: ConstraintClass::Cardinality,
                terms: vec![(0, 1.0), (1, 1.0), (2, 1.0)],
                comparison: Comparison::LessEq,
                rhs: capacity,
            }],
        }
    }

    #[test]
    fn test_microlp_solves_small_model() {
        let outcome = MicroLpSolver::new().solve(&knapsack(2.0)).unwrap();
        match outcome {
            SolverOutcome::Optimal(solution) => {
                assert!((solution.objective - 5.0).abs() < 1e-6);
                assert!(solution.values[0] > 0.5);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_microlp_reports_infeasible() {
        let mut model = knapsack(0.0);
        model.constraints.push(LinearConstraint {
            name: "at_least_one".into(),
            class: ConstraintClass::Coverage,
            terms: vec![(0, 1.0), (1, 1.0), (2, 1.0)],
            comparison: Comparison::GreaterEq,
            rhs: 1.0,
        });
        let outcome = MicroLpSolver::new().solve(&model).unwrap();
        assert_eq!(outcome, SolverOutcome::Infeasible);
    }

    struct SlowSolver;

    impl SelectionSolver for SlowSolver {
        fn name(&self) -> &str {
            "slow"
        }

        fn solve(&self, _model: &SelectionModel) -> OptimizerResult<SolverOutcome> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(SolverOutcome::Infeasible)
        }
    }

    #[tokio::test]
    async fn test_budget_exhaustion_has_no_incumbent() {
        let outcome = solve_with_budget(
            Arc::new(SlowSolver),
            knapsack(1.0),
            Some(Duration::from_millis(20)),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SolverOutcome::TimedOut { incumbent: None });
    }

    #[tokio::test]
    async fn test_unbounded_budget_waits_for_solver() {
        let outcome = solve_with_budget(Arc::new(MicroLpSolver::new()), knapsack(1.0), None)
            .await
            .unwrap();
        assert!(matches!(outcome, SolverOutcome::Optimal(_)));
    }
}
