//! Optimizer configuration file support.
//!
//! Thresholds and weights for every phase are read from a TOML document with
//! one table per stage (`[filter]`, `[scoring]`, `[greedy]`, `[selection]`,
//! `[solver]`). Every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Full optimizer configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub filter: FilterSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub greedy: GreedySettings,
    #[serde(default)]
    pub selection: SelectionSettings,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// Scene catalog filter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Cloud-fraction ceiling `N_M^max`; scenes above it are dropped.
    #[serde(default = "default_max_cloud_fraction")]
    pub max_cloud_fraction: f64,
}

/// Scene scoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSettings {
    /// Effective coverage at or above which a scene is reported as central.
    #[serde(default = "default_central_threshold")]
    pub central_threshold: f64,
}

/// Greedy mosaic builder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreedySettings {
    /// Temporal window `ΔT_max` in whole days.
    #[serde(default = "default_max_days_apart")]
    pub max_days_apart: i64,
    /// Minimum marginal coverage gain `ΔA_min` for an extension step.
    #[serde(default = "default_min_contribution")]
    pub min_contribution: f64,
    /// Target mosaic coverage `A_M^target`.
    #[serde(default = "default_target_coverage")]
    pub target_coverage: f64,
    /// Minimum mosaic coverage `A_M^min` for acceptance.
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
    /// Global covered fraction at which mosaic construction stops.
    #[serde(default = "default_full_coverage_fraction")]
    pub full_coverage_fraction: f64,
    #[serde(default = "default_prune_redundant")]
    pub prune_redundant: bool,
    /// Overlap, relative to the smaller member, that marks a pair as redundant.
    #[serde(default = "default_redundancy_overlap_ratio")]
    pub redundancy_overlap_ratio: f64,
    /// Unique AOI contribution a redundant member needs to be kept.
    #[serde(default = "default_redundancy_min_unique")]
    pub redundancy_min_unique: f64,
}

/// Selection model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Cardinality bound `N_max`.
    #[serde(default = "default_max_mosaics")]
    pub max_mosaics: usize,
    /// Penalty per selected mosaic.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Penalty per unit of peak cloud fraction of a selected mosaic.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_min_net_coverage")]
    pub min_net_coverage: f64,
    /// Mosaics whose peak cloud fraction exceeds this are fixed to unselected.
    #[serde(default)]
    pub mosaic_cloud_ceiling: Option<f64>,
}

/// External solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Wall-clock budget for one solve; `None` means unbounded.
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: Option<f64>,
}

fn default_max_cloud_fraction() -> f64 {
    0.40
}

fn default_central_threshold() -> f64 {
    0.30
}

fn default_max_days_apart() -> i64 {
    5
}

fn default_min_contribution() -> f64 {
    0.05
}

fn default_target_coverage() -> f64 {
    0.85
}

fn default_min_coverage() -> f64 {
    0.02
}

fn default_full_coverage_fraction() -> f64 {
    0.999
}

fn default_prune_redundant() -> bool {
    true
}

fn default_redundancy_overlap_ratio() -> f64 {
    0.90
}

fn default_redundancy_min_unique() -> f64 {
    0.05
}

fn default_max_mosaics() -> usize {
    6
}

fn default_alpha() -> f64 {
    0.4
}

fn default_gamma() -> f64 {
    0.8
}

fn default_min_net_coverage() -> f64 {
    0.85
}

fn default_time_limit_secs() -> Option<f64> {
    Some(300.0)
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            max_cloud_fraction: default_max_cloud_fraction(),
        }
    }
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            central_threshold: default_central_threshold(),
        }
    }
}

impl Default for GreedySettings {
    fn default() -> Self {
        Self {
            max_days_apart: default_max_days_apart(),
            min_contribution: default_min_contribution(),
            target_coverage: default_target_coverage(),
            min_coverage: default_min_coverage(),
            full_coverage_fraction: default_full_coverage_fraction(),
            prune_redundant: default_prune_redundant(),
            redundancy_overlap_ratio: default_redundancy_overlap_ratio(),
            redundancy_min_unique: default_redundancy_min_unique(),
        }
    }
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            max_mosaics: default_max_mosaics(),
            alpha: default_alpha(),
            gamma: default_gamma(),
            min_net_coverage: default_min_net_coverage(),
            mosaic_cloud_ceiling: None,
        }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit_secs(),
        }
    }
}

impl SolverSettings {
    /// Solver budget; `None` when unset or not representable as a duration.
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::FractionOutOfRange { field, value });
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value >= 0.0) || !value.is_finite() {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

impl OptimizerConfig {
    /// Load optimizer configuration from a TOML file.
    ///
    /// The parsed configuration is validated before it is returned.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: OptimizerConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load optimizer configuration from the default location.
    ///
    /// Searches for `mosaic.toml` in:
    /// 1. Current directory
    /// 2. `mosaic_backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Self, ConfigError> {
        let search_paths = [
            PathBuf::from("mosaic.toml"),
            PathBuf::from("mosaic_backend/mosaic.toml"),
            PathBuf::from("../mosaic.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(ConfigError::NotFound)
    }

    /// Reject contradictory or out-of-range thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("filter.max_cloud_fraction", self.filter.max_cloud_fraction)?;
        check_fraction("scoring.central_threshold", self.scoring.central_threshold)?;

        let g = &self.greedy;
        if g.max_days_apart < 0 {
            return Err(ConfigError::Negative {
                field: "greedy.max_days_apart",
                value: g.max_days_apart as f64,
            });
        }
        check_fraction("greedy.min_contribution", g.min_contribution)?;
        check_fraction("greedy.target_coverage", g.target_coverage)?;
        check_fraction("greedy.min_coverage", g.min_coverage)?;
        check_fraction("greedy.full_coverage_fraction", g.full_coverage_fraction)?;
        check_fraction("greedy.redundancy_overlap_ratio", g.redundancy_overlap_ratio)?;
        check_fraction("greedy.redundancy_min_unique", g.redundancy_min_unique)?;
        if g.min_coverage > g.target_coverage {
            return Err(ConfigError::MinAboveTarget {
                min: g.min_coverage,
                target: g.target_coverage,
            });
        }

        let s = &self.selection;
        check_non_negative("selection.alpha", s.alpha)?;
        check_non_negative("selection.gamma", s.gamma)?;
        check_fraction("selection.min_net_coverage", s.min_net_coverage)?;
        if let Some(ceiling) = s.mosaic_cloud_ceiling {
            check_fraction("selection.mosaic_cloud_ceiling", ceiling)?;
        }

        if let Some(limit) = self.solver.time_limit_secs {
            if !(limit > 0.0) || Duration::try_from_secs_f64(limit).is_err() {
                return Err(ConfigError::InvalidTimeLimit(limit));
            }
        }

        Ok(())
    }
}
