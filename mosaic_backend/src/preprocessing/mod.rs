//! Catalog preprocessing: cloud filtering and per-scene scoring.

pub mod filter;
pub mod scorer;

pub use filter::{filter_by_cloud_ceiling, CloudRejection, FilterOutcome};
pub use scorer::{score_catalog, score_scene, ScoringFailure, ScoringOutcome};
