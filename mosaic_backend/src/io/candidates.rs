//! Candidate-set artifact and selection output documents.
//!
//! The candidate set is the Phase 1 → Phase 2 boundary: selection can run
//! from this file alone. The selection output adds the decoded assignment
//! and a flat download manifest of the scenes to fetch.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::algorithms::selection::{ObjectiveBreakdown, SelectionAssignment, SelectionResult, SolveStatus};
use crate::algorithms::validation::CoverageReport;
use crate::core::domain::{CandidateSet, MosaicMetrics};
use crate::io::catalog::from_json_str;

/// One selected mosaic in the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedMosaic {
    pub id: String,
    pub members: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub metrics: MosaicMetrics,
}

/// Output document of a selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutput {
    pub aoi_name: Option<String>,
    pub status: SolveStatus,
    pub objective: ObjectiveBreakdown,
    pub estimated_net_coverage: f64,
    pub selected: Vec<SelectedMosaic>,
    pub assignment: SelectionAssignment,
    /// Sorted, de-duplicated scene ids of every selected mosaic.
    pub download_manifest: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<CoverageReport>,
}

impl SelectionOutput {
    pub fn new(candidates: &CandidateSet, result: &SelectionResult, validation: Option<CoverageReport>) -> Self {
        let selected: Vec<SelectedMosaic> = result
            .selected
            .iter()
            .map(|&j| {
                let c = &candidates.mosaics[j];
                SelectedMosaic {
                    id: c.mosaic.id.clone(),
                    members: c.mosaic.members.clone(),
                    start: c.mosaic.start,
                    end: c.mosaic.end,
                    metrics: c.metrics,
                }
            })
            .collect();

        let download_manifest = selected
            .iter()
            .flat_map(|m| m.members.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            aoi_name: candidates.aoi_name.clone(),
            status: result.status,
            objective: result.objective,
            estimated_net_coverage: result.estimated_net_coverage,
            selected,
            assignment: result.assignment.clone(),
            download_manifest,
            validation,
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize document")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn save_candidates(path: &Path, candidates: &CandidateSet) -> Result<()> {
    write_json(path, candidates)
}

pub fn load_candidates(path: &Path) -> Result<CandidateSet> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let set: CandidateSet = from_json_str(&content)
        .with_context(|| format!("Failed to parse candidate set {}", path.display()))?;

    let n = set.mosaics.len();
    if let Some(p) = set.pairs.iter().find(|p| p.first >= p.second || p.second >= n) {
        anyhow::bail!(
            "Candidate set {} has an invalid pair ({}, {}) for {} mosaics",
            path.display(),
            p.first,
            p.second,
            n
        );
    }
    Ok(set)
}

pub fn save_selection(path: &Path, output: &SelectionOutput) -> Result<()> {
    write_json(path, output)
}
