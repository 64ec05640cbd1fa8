//! Error types for the mosaic optimizer.
//!
//! Errors are split by the stage that owns the recovery decision:
//!
//! - [`GeometryError`]: scoped to one scene or one mosaic pair; callers recover
//!   by excluding the scene or treating the pair intersection as zero.
//! - [`ConfigError`]: contradictory or out-of-range thresholds, rejected before
//!   Phase 1 starts.
//! - [`CatalogError`]: malformed scene catalog / AOI / candidate documents.
//! - [`OptimizationError`]: terminal failures of a run (infeasible model,
//!   exhausted solver budget, solver engine failures).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizationError>;

/// Error raised by geometry validation or polygon operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("geometry is empty")]
    Empty,

    #[error("geometry contains a non-finite coordinate")]
    NonFiniteCoordinate,

    #[error("ring {ring} of polygon {polygon} has {points} points, at least 4 are required")]
    DegenerateRing {
        polygon: usize,
        ring: usize,
        points: usize,
    },

    #[error("ring {ring} of polygon {polygon} intersects itself")]
    SelfIntersection { polygon: usize, ring: usize },

    #[error("geometry has zero area")]
    ZeroArea,

    #[error("polygon {operation} failed: {message}")]
    OperationFailed {
        operation: &'static str,
        message: String,
    },
}

/// Error raised when the optimizer configuration is inconsistent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must lie in [0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("greedy.min_coverage ({min}) exceeds greedy.target_coverage ({target})")]
    MinAboveTarget { min: f64, target: f64 },

    #[error("solver.time_limit_secs must be a positive number of seconds within Duration range, got {0}")]
    InvalidTimeLimit(f64),

    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("No mosaic.toml found in standard locations")]
    NotFound,
}

/// Error raised while reading scene catalogs, AOIs or candidate artifacts.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON at `{path}`: {message}")]
    Json { path: String, message: String },

    #[error("Invalid timestamp `{value}` for scene {scene_id}: {message}")]
    Timestamp {
        scene_id: String,
        value: String,
        message: String,
    },

    #[error("`{path}` must lie in [0, 1], got {value}")]
    FractionOutOfRange { path: String, value: f64 },

    #[error("Duplicate scene id: {0}")]
    DuplicateScene(String),

    #[error("Invalid AOI geometry: {0}")]
    Aoi(#[from] GeometryError),
}

/// Constraint families of the selection model.
///
/// Used to tag every model row and to report the suspected bottleneck of an
/// infeasible run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintClass {
    Cardinality,
    Exclusivity,
    Coverage,
    Linearization,
    CloudCeiling,
}

impl ConstraintClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintClass::Cardinality => "cardinality",
            ConstraintClass::Exclusivity => "exclusivity",
            ConstraintClass::Coverage => "coverage",
            ConstraintClass::Linearization => "linearization",
            ConstraintClass::CloudCeiling => "cloud_ceiling",
        }
    }
}

impl fmt::Display for ConstraintClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic attached to an infeasible selection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfeasibilityDiagnostic {
    /// Constraint family believed to make the model infeasible.
    pub bottleneck: ConstraintClass,
    /// Number of model rows per constraint family.
    pub constraint_counts: Vec<(ConstraintClass, usize)>,
    /// Number of candidate mosaics in the model.
    pub candidates: usize,
    /// Cardinality bound that was in force.
    pub max_mosaics: usize,
    /// Net coverage that was required.
    pub min_net_coverage: f64,
}

impl fmt::Display for InfeasibilityDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self
            .constraint_counts
            .iter()
            .map(|(class, n)| format!("{}={}", class, n))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "suspected bottleneck: {} [candidates={}, max_mosaics={}, min_net_coverage={:.4}, rows: {}]",
            self.bottleneck, self.candidates, self.max_mosaics, self.min_net_coverage, counts
        )
    }
}

/// Terminal failure of an optimization run.
#[derive(Debug, thiserror::Error)]
pub enum OptimizationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Selection model is infeasible: {0}")]
    Infeasible(InfeasibilityDiagnostic),

    #[error("Solver exceeded its budget{} without an incumbent", budget_suffix(.budget_secs))]
    SolverTimeout { budget_secs: Option<f64> },

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn budget_suffix(budget_secs: &Option<f64>) -> String {
    budget_secs
        .map(|secs| format!(" of {:.1}s", secs))
        .unwrap_or_default()
}

impl OptimizationError {
    /// Returns `true` for the failures a caller may fix by relaxing the
    /// selection parameters (infeasibility or an exhausted budget).
    pub fn is_selection_failure(&self) -> bool {
        matches!(
            self,
            OptimizationError::Infeasible(_) | OptimizationError::SolverTimeout { .. }
        )
    }
}
