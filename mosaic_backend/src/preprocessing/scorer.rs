//! Per-scene scoring against the AOI.
//!
//! Each footprint is validated and clipped to the AOI before the
//! [`SceneMetrics`] are derived. Scenes whose effective coverage `A · P`
//! reaches the central threshold are classed [`ImageClass::Central`], the
//! rest [`ImageClass::Complement`].

use log::{info, warn};
use rayon::prelude::*;

use crate::core::domain::{Aoi, ImageClass, Scene, SceneMetrics, ScoredScene};
use crate::core::geometry;
use crate::error::GeometryError;

/// A scene that could not be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringFailure {
    pub scene_id: String,
    pub error: GeometryError,
}

/// Result of scoring a whole catalog
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// Scored scenes in input order.
    pub scored: Vec<ScoredScene>,
    pub failures: Vec<ScoringFailure>,
}

/// Scores one scene against the AOI.
///
/// The footprint is validated and clipped to the AOI; the clipped geometry is
/// kept on the result so later phases never clip again.
pub fn score_scene(
    scene: Scene,
    aoi: &Aoi,
    central_threshold: f64,
) -> Result<ScoredScene, GeometryError> {
    geometry::validate_footprint(&scene.footprint)?;
    let clipped = aoi.clip(&scene.footprint)?;
    let coverage = aoi.fraction(geometry::area(&clipped)).clamp(0.0, 1.0);
    let metrics = SceneMetrics::new(coverage, scene.valid_pixel_fraction, scene.cloud_fraction);
    let class = if metrics.effective_coverage >= central_threshold {
        ImageClass::Central
    } else {
        ImageClass::Complement
    };

    Ok(ScoredScene {
        scene,
        clipped,
        metrics,
        class,
    })
}

/// Scores every scene in parallel, excluding those with invalid geometry.
pub fn score_catalog(scenes: Vec<Scene>, aoi: &Aoi, central_threshold: f64) -> ScoringOutcome {
    let results: Vec<(String, Result<ScoredScene, GeometryError>)> = scenes
        .into_par_iter()
        .map(|scene| {
            let id = scene.id.clone();
            (id, score_scene(scene, aoi, central_threshold))
        })
        .collect();

    let mut scored = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (scene_id, result) in results {
        match result {
            Ok(s) => scored.push(s),
            Err(error) => {
                warn!("Scene {} excluded: {}", scene_id, error);
                failures.push(ScoringFailure { scene_id, error });
            }
        }
    }

    let central = scored
        .iter()
        .filter(|s| s.class == ImageClass::Central)
        .count();
    info!(
        "Scored {} scenes ({} central, {} complement, {} excluded)",
        scored.len(),
        central,
        scored.len() - central,
        failures.len()
    );

    ScoringOutcome { scored, failures }
}
