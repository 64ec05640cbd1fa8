//! Post-selection diagnostics.
//!
//! Compares the second-order estimate used by the model with the exact union
//! of the selected mosaics and re-checks the model constraints on the decoded
//! assignment. Nothing here feeds back into selection.

use std::collections::HashMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::algorithms::selection::{
    exclusivity_violations, net_coverage, ObjectiveBreakdown, SelectionResult,
};
use crate::config::SelectionSettings;
use crate::core::domain::{Aoi, CandidateSet, ScoredScene};
use crate::core::geometry;
use crate::error::GeometryError;

/// One row of the incremental coverage table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementRow {
    pub mosaic_id: String,
    pub coverage: f64,
    /// `max(0, A_j − Σ I` with the rows above`)`.
    pub increment: f64,
    pub cumulative: f64,
}

/// Validation report for a final selection.
///
/// `errors` collects constraint violations of the decoded assignment;
/// `warnings` collects notes that do not invalidate it.
///
/// # Examples
///
/// ```
/// use mosaic_backend::algorithms::validation::CoverageReport;
///
/// let mut report = CoverageReport::default();
/// assert!(report.is_valid);
/// report.add_error("scene x claimed twice".to_string());
/// assert!(!report.is_valid);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub is_valid: bool,
    /// Exact union coverage of the selection.
    pub true_coverage: f64,
    /// Second-order estimate used by the coverage row.
    pub estimated_coverage: f64,
    /// `true − estimated`, in percentage points.
    pub difference_pp: f64,
    /// Estimated coverage minus the required threshold.
    pub coverage_slack: f64,
    pub objective: ObjectiveBreakdown,
    pub exclusivity_violations: Vec<String>,
    /// Pairs whose decoded `o` differs from `y_j ∧ y_k`.
    pub pair_inconsistencies: Vec<(String, String)>,
    pub cloud_ceiling_violations: Vec<String>,
    pub incremental: Vec<IncrementRow>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for CoverageReport {
    fn default() -> Self {
        Self {
            is_valid: true,
            true_coverage: 0.0,
            estimated_coverage: 0.0,
            difference_pp: 0.0,
            coverage_slack: 0.0,
            objective: ObjectiveBreakdown {
                coverage_quality: 0.0,
                count_penalty: 0.0,
                cloud_penalty: 0.0,
                total: 0.0,
            },
            exclusivity_violations: Vec::new(),
            pair_inconsistencies: Vec::new(),
            cloud_ceiling_violations: Vec::new(),
            incremental: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl CoverageReport {
    pub fn add_error(&mut self, message: String) {
        self.is_valid = false;
        self.errors.push(message);
    }

    pub fn add_warning(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Incremental coverage table, largest `A_j` first.
pub fn incremental_table(candidates: &CandidateSet, selected: &[usize]) -> Vec<IncrementRow> {
    let mut ordered = selected.to_vec();
    ordered.sort_by(|&a, &b| {
        candidates.mosaics[b]
            .metrics
            .coverage
            .partial_cmp(&candidates.mosaics[a].metrics.coverage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut rows = Vec::with_capacity(ordered.len());
    let mut cumulative = 0.0;
    for (pos, &j) in ordered.iter().enumerate() {
        let coverage = candidates.mosaics[j].metrics.coverage;
        let overlap: f64 = ordered[..pos]
            .iter()
            .map(|&prev| candidates.intersection(prev, j))
            .sum();
        let increment = (coverage - overlap).max(0.0);
        cumulative += increment;
        rows.push(IncrementRow {
            mosaic_id: candidates.mosaics[j].mosaic.id.clone(),
            coverage,
            increment,
            cumulative,
        });
    }
    rows
}

/// Exact union coverage of the selected mosaics' member footprints.
pub fn true_coverage(
    aoi: &Aoi,
    scenes: &[ScoredScene],
    candidates: &CandidateSet,
    selected: &[usize],
) -> Result<(f64, Vec<String>), GeometryError> {
    let by_id: HashMap<&str, &ScoredScene> = scenes.iter().map(|s| (s.id(), s)).collect();
    let mut missing = Vec::new();
    let mut footprints = Vec::new();
    for &j in selected {
        for id in &candidates.mosaics[j].mosaic.members {
            match by_id.get(id.as_str()) {
                Some(scene) => footprints.push(&scene.clipped),
                None => missing.push(id.clone()),
            }
        }
    }
    let union = geometry::union_all(footprints)?;
    Ok((aoi.fraction(geometry::area(&union)).clamp(0.0, 1.0), missing))
}

/// Builds the full diagnostic report for a selection.
pub fn validate_selection(
    aoi: &Aoi,
    scenes: &[ScoredScene],
    candidates: &CandidateSet,
    result: &SelectionResult,
    settings: &SelectionSettings,
) -> Result<CoverageReport, GeometryError> {
    let selected = &result.selected;
    let mut report = CoverageReport::default();

    let (true_cov, missing) = true_coverage(aoi, scenes, candidates, selected)?;
    for id in missing {
        report.add_warning(format!("Scene {} has no footprint; left out of the exact union", id));
    }
    report.true_coverage = true_cov;
    report.estimated_coverage = net_coverage(candidates, selected);
    report.difference_pp = (report.true_coverage - report.estimated_coverage) * 100.0;
    report.coverage_slack = report.estimated_coverage - settings.min_net_coverage;
    report.objective = ObjectiveBreakdown::compute(candidates, selected, settings);
    report.incremental = incremental_table(candidates, selected);

    if report.coverage_slack < -1e-6 {
        report.add_error(format!(
            "Estimated coverage {:.4} below required {:.4}",
            report.estimated_coverage, settings.min_net_coverage
        ));
    }

    if selected.len() > settings.max_mosaics {
        report.add_error(format!(
            "{} mosaics selected, limit is {}",
            selected.len(),
            settings.max_mosaics
        ));
    }

    report.exclusivity_violations = exclusivity_violations(candidates, selected);
    for scene in report.exclusivity_violations.clone() {
        report.add_error(format!("Scene {} is claimed by more than one selected mosaic", scene));
    }

    let assignment = &result.assignment;
    for flag in &assignment.pairs {
        let expected = assignment.selected[flag.first] && assignment.selected[flag.second];
        if flag.both_selected != expected {
            let pair = (
                candidates.mosaics[flag.first].mosaic.id.clone(),
                candidates.mosaics[flag.second].mosaic.id.clone(),
            );
            report.add_error(format!(
                "Pair flag for {} and {} is {} but should be {}",
                pair.0, pair.1, flag.both_selected, expected
            ));
            report.pair_inconsistencies.push(pair);
        }
    }

    if let Some(ceiling) = settings.mosaic_cloud_ceiling {
        for &j in selected {
            let c = &candidates.mosaics[j];
            if c.metrics.max_cloud > ceiling {
                report.add_error(format!(
                    "{} selected with peak cloud {:.4} above ceiling {:.4}",
                    c.mosaic.id, c.metrics.max_cloud, ceiling
                ));
                report.cloud_ceiling_violations.push(c.mosaic.id.clone());
            }
        }
    }

    if report.difference_pp.abs() > 2.0 {
        report.add_warning(format!(
            "Estimate differs from the exact union by {:+.2} pp",
            report.difference_pp
        ));
    }

    if report.is_valid {
        info!(
            "Selection validated: true coverage {:.4}, estimated {:.4} ({:+.2} pp)",
            report.true_coverage, report.estimated_coverage, report.difference_pp
        );
    } else {
        warn!("Selection validation found {} problems", report.errors.len());
    }

    Ok(report)
}
