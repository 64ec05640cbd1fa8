//! Scene-level cloud ceiling.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::domain::Scene;

/// A scene dropped by the cloud ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudRejection {
    pub scene_id: String,
    pub cloud_fraction: f64,
}

/// Outcome of filtering a catalog
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub eligible: Vec<Scene>,
    pub rejected: Vec<CloudRejection>,
}

/// Keep scenes whose cloud fraction is at most `max_cloud_fraction`.
///
/// No other checks are performed here; geometry problems are handled by the
/// scorer. Input order is preserved.
pub fn filter_by_cloud_ceiling(scenes: Vec<Scene>, max_cloud_fraction: f64) -> FilterOutcome {
    let total = scenes.len();
    let mut eligible = Vec::with_capacity(total);
    let mut rejected = Vec::new();

    for scene in scenes {
        if scene.cloud_fraction <= max_cloud_fraction {
            eligible.push(scene);
        } else {
            debug!(
                "Scene {} rejected: cloud fraction {:.3} above ceiling {:.3}",
                scene.id, scene.cloud_fraction, max_cloud_fraction
            );
            rejected.push(CloudRejection {
                scene_id: scene.id,
                cloud_fraction: scene.cloud_fraction,
            });
        }
    }

    info!(
        "Cloud filter kept {}/{} scenes (ceiling {:.2})",
        eligible.len(),
        total,
        max_cloud_fraction
    );

    FilterOutcome { eligible, rejected }
}
