//! Mosaic coverage optimizer.
//!
//! Selects, from a pool of overlapping optical satellite scenes, a small set
//! of temporally compatible scene groups ("mosaics") that cover an area of
//! interest above a coverage threshold while limiting cloud contamination.
//!
//! Phase 1 filters, scores and greedily groups scenes, then estimates each
//! group's coverage by second-order inclusion-exclusion. Phase 2 picks the
//! final groups with a binary linear program.

pub mod algorithms;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod preprocessing;

pub use config::OptimizerConfig;
pub use error::{ConfigError, GeometryError, OptimizationError, OptimizerResult};
pub use pipeline::{CandidateBuild, MosaicOptimizer, OptimizationRun};
