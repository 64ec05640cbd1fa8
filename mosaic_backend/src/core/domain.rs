//! Domain models for scenes, the area of interest and mosaic candidates.
//!
//! Scenes are owned by the catalog and referenced everywhere else by id.
//! Mosaics produced by the greedy builder hold scene ids, never scenes, so the
//! same scene may appear in several candidate mosaics. Exclusivity is only
//! enforced by the selection model.

use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use super::geometry;
use crate::error::GeometryError;

/// A single optical satellite acquisition.
///
/// # Examples
///
/// ```
/// use mosaic_backend::core::domain::Scene;
/// use mosaic_backend::core::geometry::multipolygon_from_coords;
/// use chrono::{TimeZone, Utc};
///
/// let scene = Scene {
///     id: "S2A_20230101".to_string(),
///     acquired: Utc.with_ymd_and_hms(2023, 1, 1, 10, 30, 0).unwrap(),
///     footprint: multipolygon_from_coords(&[vec![vec![
///         [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
///     ]]]),
///     valid_pixel_fraction: 0.95,
///     cloud_fraction: 0.1,
/// };
/// assert!((scene.quality() - 0.855).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub footprint: MultiPolygon<f64>,
    /// Valid-pixel fraction `P_i` inside the AOI.
    pub valid_pixel_fraction: f64,
    /// Cloud fraction `N_i` inside the AOI.
    pub cloud_fraction: f64,
}

impl Scene {
    /// Quality `Q_i = (1 − N_i) · P_i`.
    pub fn quality(&self) -> f64 {
        (1.0 - self.cloud_fraction) * self.valid_pixel_fraction
    }
}

/// The area of interest to be covered.
///
/// Holds the geometry together with its cached planar area. Construction
/// fails for invalid or zero-area geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Aoi {
    pub name: Option<String>,
    geometry: MultiPolygon<f64>,
    area: f64,
}

impl Aoi {
    /// Creates an AOI after validating its geometry.
    ///
    /// # Examples
    ///
    /// ```
    /// use mosaic_backend::core::domain::Aoi;
    /// use mosaic_backend::core::geometry::multipolygon_from_coords;
    ///
    /// let aoi = Aoi::new(None, multipolygon_from_coords(&[vec![vec![
    ///     [0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0],
    /// ]]])).unwrap();
    /// assert_eq!(aoi.area(), 100.0);
    /// assert_eq!(aoi.fraction(25.0), 0.25);
    /// ```
    pub fn new(name: Option<String>, geometry: MultiPolygon<f64>) -> Result<Self, GeometryError> {
        geometry::validate_footprint(&geometry)?;
        let area = geometry::area(&geometry);
        Ok(Self {
            name,
            geometry,
            area,
        })
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Expresses a planar area as a fraction of the AOI area.
    pub fn fraction(&self, area: f64) -> f64 {
        area / self.area
    }

    /// Clips a geometry to the AOI.
    pub fn clip(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
        geometry::intersection(geometry, &self.geometry)
    }
}

/// Reporting class of a scene by its effective coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageClass {
    /// Large enough to anchor a mosaic on its own.
    Central,
    Complement,
}

/// Derived per-scene metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneMetrics {
    /// Geographic coverage `A_i`.
    pub coverage: f64,
    /// Effective coverage `A_i^eff = A_i · P_i`.
    pub effective_coverage: f64,
    /// Quality `Q_i = (1 − N_i) · P_i`.
    pub quality: f64,
    /// Effectiveness `E_i = A_i^eff · Q_i`.
    pub effectiveness: f64,
}

impl SceneMetrics {
    pub fn new(coverage: f64, valid_pixel_fraction: f64, cloud_fraction: f64) -> Self {
        let effective_coverage = coverage * valid_pixel_fraction;
        let quality = (1.0 - cloud_fraction) * valid_pixel_fraction;
        Self {
            coverage,
            effective_coverage,
            quality,
            effectiveness: effective_coverage * quality,
        }
    }
}

/// A scene that passed scoring, with its AOI-clipped footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredScene {
    pub scene: Scene,
    pub clipped: MultiPolygon<f64>,
    pub metrics: SceneMetrics,
    pub class: ImageClass,
}

impl ScoredScene {
    pub fn id(&self) -> &str {
        &self.scene.id
    }

    pub fn summary(&self) -> SceneSummary {
        SceneSummary {
            id: self.scene.id.clone(),
            acquired: self.scene.acquired,
            cloud_fraction: self.scene.cloud_fraction,
            valid_pixel_fraction: self.scene.valid_pixel_fraction,
            metrics: self.metrics,
            class: self.class,
        }
    }
}

/// Serializable view of a scored scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSummary {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub cloud_fraction: f64,
    pub valid_pixel_fraction: f64,
    pub metrics: SceneMetrics,
    pub class: ImageClass,
}

/// How a mosaic qualified for acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceKind {
    TargetReached,
    /// Accepted below target because no compatible scene could extend it.
    Partial,
}

/// A group of temporally compatible scenes emitted by the greedy builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mosaic {
    pub id: String,
    pub seed: String,
    /// Member scene ids in insertion order; the seed comes first.
    pub members: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Exact covered AOI fraction at emission time.
    pub coverage: f64,
    pub acceptance: AcceptanceKind,
}

impl Mosaic {
    pub fn contains(&self, scene_id: &str) -> bool {
        self.members.iter().any(|m| m == scene_id)
    }

    /// Temporal span of the members in whole days.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Estimator output for one mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MosaicMetrics {
    /// Second-order coverage `A_j`, clamped to `[0, 1]`.
    pub coverage: f64,
    /// `Σ a_i / area(AOI)` before any subtraction.
    pub individual_sum: f64,
    /// `Σ_{i<k} a_{i∩k} / area(AOI)`.
    pub pairwise_overlap: f64,
    /// Exact union coverage of the members.
    pub union_coverage: f64,
    /// Mean member quality `Q_j`.
    pub quality: f64,
    /// Peak member cloud fraction `N_j`.
    pub max_cloud: f64,
    /// Cloud fraction weighted by each member's unique AOI contribution.
    pub weighted_cloud: f64,
    /// Qualified effective coverage `E_j = A_j · Q_j`.
    pub effectiveness: f64,
}

/// A mosaic together with its estimator metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMosaic {
    #[serde(flatten)]
    pub mosaic: Mosaic,
    pub metrics: MosaicMetrics,
}

/// AOI-relative intersection `I_{j,k}` between two candidate mosaics.
///
/// Indices refer to positions in [`CandidateSet::mosaics`] with `first < second`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairIntersection {
    pub first: usize,
    pub second: usize,
    pub intersection: f64,
}

/// Phase 1 output consumed by the selection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub aoi_name: Option<String>,
    pub aoi_area: f64,
    pub scenes: Vec<SceneSummary>,
    pub mosaics: Vec<CandidateMosaic>,
    /// Only pairs with a strictly positive intersection.
    pub pairs: Vec<PairIntersection>,
}

impl CandidateSet {
    /// Intersection between two candidates, zero when no pair is recorded.
    pub fn intersection(&self, j: usize, k: usize) -> f64 {
        let (first, second) = if j < k { (j, k) } else { (k, j) };
        self.pairs
            .iter()
            .find(|p| p.first == first && p.second == second)
            .map(|p| p.intersection)
            .unwrap_or(0.0)
    }
}
