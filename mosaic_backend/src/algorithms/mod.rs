//! Mosaic construction, estimation, selection and validation.
//!
//! # Components
//!
//! - [`greedy`]: Phase 1 greedy mosaic builder
//! - [`coverage`]: second-order coverage and pair intersection estimator
//! - [`selection`]: Phase 2 selection model and decoding
//! - [`solver`]: MILP engine adapter and solver budget
//! - [`validation`]: exact-union cross-check of a final selection

pub mod coverage;
pub mod greedy;
pub mod selection;
pub mod solver;
pub mod validation;

pub use coverage::{second_order_coverage, CoverageEstimate, CoverageEstimator};
pub use greedy::{build_mosaics, GreedyMosaicBuilder, GreedyOutcome};
pub use selection::{select, SelectionAssignment, SelectionModel, SelectionResult, SolveStatus};
pub use solver::{solve_with_budget, MicroLpSolver, SelectionSolver, SolverOutcome};
pub use validation::{validate_selection, CoverageReport};
