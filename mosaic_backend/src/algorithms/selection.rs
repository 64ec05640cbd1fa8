//! Phase 2: mixed-integer selection of candidate mosaics.
//!
//! The model is kept solver-agnostic: binary variables, a linear objective
//! and tagged linear rows. [`select`] builds it, hands it to a
//! [`SelectionSolver`], decodes the assignment and, on infeasibility, probes
//! relaxed models to name the constraint family at fault.
//!
//! Pair variables `o_{j,k}` exist only for pairs with a positive intersection.
//! For the other pairs the coverage row has a zero coefficient, and the
//! decoded flag is `y_j ∧ y_k`.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::algorithms::solver::{RawSolution, SelectionSolver, SolverOutcome};
use crate::config::SelectionSettings;
use crate::core::domain::CandidateSet;
use crate::error::{ConstraintClass, InfeasibilityDiagnostic, OptimizationError, OptimizerResult};

/// Decision variable of the selection model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// `y_j`: candidate `j` is selected.
    Select(usize),
    /// `o_{j,k}`: both candidates are selected, `j < k`.
    Both(usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LessEq,
    GreaterEq,
    Equal,
}

/// One linear row `Σ coef·var (cmp) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub class: ConstraintClass,
    /// `(variable index, coefficient)` pairs.
    pub terms: Vec<(usize, f64)>,
    pub comparison: Comparison,
    pub rhs: f64,
}

impl LinearConstraint {
    /// Evaluates the row against an assignment.
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs: f64 = self.terms.iter().map(|&(v, c)| c * values[v]).sum();
        match self.comparison {
            Comparison::LessEq => lhs <= self.rhs + tolerance,
            Comparison::GreaterEq => lhs >= self.rhs - tolerance,
            Comparison::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// A binary maximisation model.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionModel {
    /// All variables are binary.
    pub variables: Vec<Variable>,
    pub objective: Vec<(usize, f64)>,
    pub constraints: Vec<LinearConstraint>,
}

impl SelectionModel {
    /// Builds the model for a candidate set.
    pub fn build(candidates: &CandidateSet, settings: &SelectionSettings) -> Self {
        let n = candidates.mosaics.len();
        let mut variables: Vec<Variable> = (0..n).map(Variable::Select).collect();
        let mut constraints = Vec::new();

        let objective = candidates
            .mosaics
            .iter()
            .enumerate()
            .map(|(j, c)| {
                let m = &c.metrics;
                (j, m.effectiveness - settings.alpha - settings.gamma * m.max_cloud)
            })
            .collect();

        constraints.push(LinearConstraint {
            name: "cardinality".to_string(),
            class: ConstraintClass::Cardinality,
            terms: (0..n).map(|j| (j, 1.0)).collect(),
            comparison: Comparison::LessEq,
            rhs: settings.max_mosaics as f64,
        });

        // scene id -> candidates containing it, in candidate order
        let mut claims: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (j, c) in candidates.mosaics.iter().enumerate() {
            for member in &c.mosaic.members {
                let entry = claims.entry(member.as_str()).or_default();
                if entry.last() != Some(&j) {
                    entry.push(j);
                }
            }
        }
        for (scene, holders) in &claims {
            if holders.len() < 2 {
                continue;
            }
            constraints.push(LinearConstraint {
                name: format!("exclusive_{}", scene),
                class: ConstraintClass::Exclusivity,
                terms: holders.iter().map(|&j| (j, 1.0)).collect(),
                comparison: Comparison::LessEq,
                rhs: 1.0,
            });
        }

        let mut coverage_terms: Vec<(usize, f64)> = candidates
            .mosaics
            .iter()
            .enumerate()
            .map(|(j, c)| (j, c.metrics.coverage))
            .collect();
        for pair in candidates.pairs.iter().filter(|p| p.intersection > 0.0) {
            let (j, k) = (pair.first, pair.second);
            let o = variables.len();
            variables.push(Variable::Both(j, k));
            coverage_terms.push((o, -pair.intersection));

            constraints.push(LinearConstraint {
                name: format!("both_{}_{}_lower", j, k),
                class: ConstraintClass::Linearization,
                terms: vec![(j, 1.0), (k, 1.0), (o, -1.0)],
                comparison: Comparison::LessEq,
                rhs: 1.0,
            });
            constraints.push(LinearConstraint {
                name: format!("both_{}_{}_first", j, k),
                class: ConstraintClass::Linearization,
                terms: vec![(o, 1.0), (j, -1.0)],
                comparison: Comparison::LessEq,
                rhs: 0.0,
            });
            constraints.push(LinearConstraint {
                name: format!("both_{}_{}_second", j, k),
                class: ConstraintClass::Linearization,
                terms: vec![(o, 1.0), (k, -1.0)],
                comparison: Comparison::LessEq,
                rhs: 0.0,
            });
        }
        constraints.push(LinearConstraint {
            name: "net_coverage".to_string(),
            class: ConstraintClass::Coverage,
            terms: coverage_terms,
            comparison: Comparison::GreaterEq,
            rhs: settings.min_net_coverage,
        });

        if let Some(ceiling) = settings.mosaic_cloud_ceiling {
            for (j, c) in candidates.mosaics.iter().enumerate() {
                if c.metrics.max_cloud > ceiling {
                    constraints.push(LinearConstraint {
                        name: format!("cloud_ceiling_{}", c.mosaic.id),
                        class: ConstraintClass::CloudCeiling,
                        terms: vec![(j, 1.0)],
                        comparison: Comparison::Equal,
                        rhs: 0.0,
                    });
                }
            }
        }

        Self {
            variables,
            objective,
            constraints,
        }
    }

    /// Copy of the model without the rows of one constraint family.
    pub fn without(&self, class: ConstraintClass) -> Self {
        Self {
            variables: self.variables.clone(),
            objective: self.objective.clone(),
            constraints: self
                .constraints
                .iter()
                .filter(|c| c.class != class)
                .cloned()
                .collect(),
        }
    }

    pub fn constraint_counts(&self) -> Vec<(ConstraintClass, usize)> {
        let mut counts: BTreeMap<ConstraintClass, usize> = BTreeMap::new();
        for c in &self.constraints {
            *counts.entry(c.class).or_default() += 1;
        }
        counts.into_iter().collect()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.iter().map(|&(v, c)| c * values[v]).sum()
    }
}

/// How the returned assignment was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    /// The solver budget ran out; the best assignment found so far.
    BestIncumbent,
}

/// Decoded `o_{j,k}` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFlag {
    pub first: usize,
    pub second: usize,
    pub both_selected: bool,
}

/// Decoded solver assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionAssignment {
    /// `y_j` per candidate.
    pub selected: Vec<bool>,
    /// `o_{j,k}` for the pairs modelled with their own variable.
    pub pairs: Vec<PairFlag>,
}

impl SelectionAssignment {
    fn decode(model: &SelectionModel, values: &[f64], candidates: usize) -> Self {
        let mut selected = vec![false; candidates];
        let mut pairs = Vec::new();
        for (v, var) in model.variables.iter().enumerate() {
            let on = values.get(v).copied().unwrap_or(0.0) > 0.5;
            match *var {
                Variable::Select(j) => selected[j] = on,
                Variable::Both(first, second) => pairs.push(PairFlag {
                    first,
                    second,
                    both_selected: on,
                }),
            }
        }
        Self { selected, pairs }
    }

    /// `o_{j,k}`; derived from `y` when the pair has no variable.
    pub fn both_selected(&self, j: usize, k: usize) -> bool {
        let (first, second) = if j < k { (j, k) } else { (k, j) };
        self.pairs
            .iter()
            .find(|p| p.first == first && p.second == second)
            .map(|p| p.both_selected)
            .unwrap_or(self.selected[first] && self.selected[second])
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.selected
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .map(|(j, _)| j)
            .collect()
    }
}

/// Objective split into its three terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBreakdown {
    /// `Σ E_j y_j`
    pub coverage_quality: f64,
    /// `α Σ y_j`
    pub count_penalty: f64,
    /// `γ Σ N_j y_j`
    pub cloud_penalty: f64,
    pub total: f64,
}

impl ObjectiveBreakdown {
    pub fn compute(candidates: &CandidateSet, selected: &[usize], settings: &SelectionSettings) -> Self {
        let coverage_quality: f64 = selected
            .iter()
            .map(|&j| candidates.mosaics[j].metrics.effectiveness)
            .sum();
        let count_penalty = settings.alpha * selected.len() as f64;
        let cloud_penalty: f64 = settings.gamma
            * selected
                .iter()
                .map(|&j| candidates.mosaics[j].metrics.max_cloud)
                .sum::<f64>();
        Self {
            coverage_quality,
            count_penalty,
            cloud_penalty,
            total: coverage_quality - count_penalty - cloud_penalty,
        }
    }
}

/// Estimated net coverage `Σ A_j y_j − Σ I_{j,k} o_{j,k}` of a selection.
pub fn net_coverage(candidates: &CandidateSet, selected: &[usize]) -> f64 {
    let gross: f64 = selected
        .iter()
        .map(|&j| candidates.mosaics[j].metrics.coverage)
        .sum();
    let mut overlap = 0.0;
    for (a, &j) in selected.iter().enumerate() {
        for &k in &selected[a + 1..] {
            overlap += candidates.intersection(j, k);
        }
    }
    gross - overlap
}

/// Outcome of a successful selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub status: SolveStatus,
    pub assignment: SelectionAssignment,
    /// Indices of the selected candidates.
    pub selected: Vec<usize>,
    pub objective: ObjectiveBreakdown,
    pub estimated_net_coverage: f64,
}

/// Builds, solves and decodes the selection model.
pub fn select(
    candidates: &CandidateSet,
    settings: &SelectionSettings,
    solver: &dyn SelectionSolver,
) -> OptimizerResult<SelectionResult> {
    let model = SelectionModel::build(candidates, settings);
    let n = candidates.mosaics.len();
    info!(
        "Selection model: {} candidates, {} variables, {} constraints (solver: {})",
        n,
        model.variables.len(),
        model.constraints.len(),
        solver.name()
    );

    if n == 0 && settings.min_net_coverage > 0.0 {
        return Err(OptimizationError::Infeasible(InfeasibilityDiagnostic {
            bottleneck: ConstraintClass::Coverage,
            constraint_counts: model.constraint_counts(),
            candidates: 0,
            max_mosaics: settings.max_mosaics,
            min_net_coverage: settings.min_net_coverage,
        }));
    }
    if n == 0 {
        let empty = RawSolution {
            values: Vec::new(),
            objective: 0.0,
        };
        return Ok(decode(&model, candidates, settings, SolveStatus::Optimal, &empty));
    }

    let (status, solution) = match solver.solve(&model)? {
        SolverOutcome::Optimal(solution) => (SolveStatus::Optimal, solution),
        SolverOutcome::TimedOut {
            incumbent: Some(solution),
        } => {
            warn!("Solver budget exhausted, using best incumbent");
            (SolveStatus::BestIncumbent, solution)
        }
        SolverOutcome::TimedOut { incumbent: None } => {
            return Err(OptimizationError::SolverTimeout {
                budget_secs: solver.time_limit().map(|d| d.as_secs_f64()),
            })
        }
        SolverOutcome::Infeasible => {
            let diagnostic = diagnose(&model, candidates, settings, solver);
            warn!("Selection infeasible: {}", diagnostic);
            return Err(OptimizationError::Infeasible(diagnostic));
        }
    };

    Ok(decode(&model, candidates, settings, status, &solution))
}

fn decode(
    model: &SelectionModel,
    candidates: &CandidateSet,
    settings: &SelectionSettings,
    status: SolveStatus,
    solution: &RawSolution,
) -> SelectionResult {
    let assignment = SelectionAssignment::decode(model, &solution.values, candidates.mosaics.len());
    let selected = assignment.selected_indices();
    let objective = ObjectiveBreakdown::compute(candidates, &selected, settings);
    let estimated_net_coverage = net_coverage(candidates, &selected);

    for &j in &selected {
        debug!(
            "Selected {} (A={:.4}, E={:.4}, N={:.4})",
            candidates.mosaics[j].mosaic.id,
            candidates.mosaics[j].metrics.coverage,
            candidates.mosaics[j].metrics.effectiveness,
            candidates.mosaics[j].metrics.max_cloud
        );
    }
    info!(
        "Selected {} of {} mosaics, objective {:.4}, estimated net coverage {:.4} ({:?})",
        selected.len(),
        candidates.mosaics.len(),
        objective.total,
        estimated_net_coverage,
        status
    );

    SelectionResult {
        status,
        assignment,
        selected,
        objective,
        estimated_net_coverage,
    }
}

/// Names the constraint family that makes the model infeasible by re-solving
/// with one family relaxed at a time.
pub fn diagnose(
    model: &SelectionModel,
    candidates: &CandidateSet,
    settings: &SelectionSettings,
    solver: &dyn SelectionSolver,
) -> InfeasibilityDiagnostic {
    let probes = [ConstraintClass::Cardinality, ConstraintClass::Exclusivity];
    let bottleneck = probes
        .iter()
        .copied()
        .find(|&class| {
            let relaxed = model.without(class);
            match solver.solve(&relaxed) {
                Ok(SolverOutcome::Optimal(_)) => true,
                Ok(SolverOutcome::TimedOut { incumbent }) => incumbent.is_some(),
                Ok(SolverOutcome::Infeasible) => false,
                Err(e) => {
                    warn!("Diagnostic solve without {} failed: {}", class, e);
                    false
                }
            }
        })
        .unwrap_or(ConstraintClass::Coverage);

    InfeasibilityDiagnostic {
        bottleneck,
        constraint_counts: model.constraint_counts(),
        candidates: candidates.mosaics.len(),
        max_mosaics: settings.max_mosaics,
        min_net_coverage: settings.min_net_coverage,
    }
}

/// Scene ids claimed by more than one selected mosaic.
pub fn exclusivity_violations(candidates: &CandidateSet, selected: &[usize]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for &j in selected {
        for member in &candidates.mosaics[j].mosaic.members {
            *seen.entry(member.as_str()).or_default() += 1;
        }
    }
    let mut violations: Vec<String> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    violations.sort();
    violations
}
