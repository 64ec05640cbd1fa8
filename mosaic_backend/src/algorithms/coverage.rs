//! Pairwise coverage estimation for candidate mosaics.
//!
//! Mosaic coverage uses inclusion-exclusion truncated at order two:
//!
//! ```text
//! A_j = clamp((Σ a_i − Σ_{i<k} a_{i∩k}) / area(AOI), 0, 1)
//! ```
//!
//! Third and higher order terms are ignored. With many three-way overlaps the
//! estimate undershoots the true union; the exact union is still computed per
//! mosaic (for pair intersections and reporting) and the validator compares
//! both figures on the final selection.

use std::collections::HashMap;

use geo::MultiPolygon;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::core::domain::{
    Aoi, CandidateMosaic, CandidateSet, Mosaic, MosaicMetrics, PairIntersection, ScoredScene,
};
use crate::core::geometry;
use crate::error::{GeometryError, OptimizationError, OptimizerResult};

/// Second-order coverage from raw planar areas.
///
/// Returns `(individual_sum, pairwise_overlap, coverage)` as AOI fractions,
/// with `coverage` clamped to `[0, 1]`.
///
/// # Examples
///
/// ```
/// use mosaic_backend::algorithms::coverage::second_order_coverage;
///
/// // two identical footprints, each covering 89.14 of 100
/// let (sum, overlap, coverage) = second_order_coverage(&[89.14, 89.14], 89.14, 100.0);
/// assert!((sum - 1.7828).abs() < 1e-12);
/// assert!((overlap - 0.8914).abs() < 1e-12);
/// assert!((coverage - 0.8914).abs() < 1e-12);
/// ```
pub fn second_order_coverage(member_areas: &[f64], pairwise_area: f64, aoi_area: f64) -> (f64, f64, f64) {
    let individual = member_areas.iter().sum::<f64>() / aoi_area;
    let pairwise = pairwise_area / aoi_area;
    let coverage = (individual - pairwise).clamp(0.0, 1.0);
    (individual, pairwise, coverage)
}

/// Result of estimating a batch of mosaics
#[derive(Debug, Clone)]
pub struct CoverageEstimate {
    pub candidates: Vec<CandidateMosaic>,
    /// Pairs with a positive intersection, indexed into `candidates`.
    pub pairs: Vec<PairIntersection>,
    /// Mosaics dropped because their geometry could not be processed.
    pub excluded: Vec<String>,
    /// Pairs whose intersection failed and was taken as zero.
    pub failed_pairs: usize,
}

impl CoverageEstimate {
    /// Packs the estimate into the Phase 1 interchange record.
    pub fn into_candidate_set(self, aoi: &Aoi, scenes: &[ScoredScene]) -> CandidateSet {
        CandidateSet {
            aoi_name: aoi.name.clone(),
            aoi_area: aoi.area(),
            scenes: scenes.iter().map(ScoredScene::summary).collect(),
            mosaics: self.candidates,
            pairs: self.pairs,
        }
    }
}

/// Computes per-mosaic metrics and pairwise intersections.
pub struct CoverageEstimator<'a> {
    aoi: &'a Aoi,
    scenes: HashMap<&'a str, &'a ScoredScene>,
}

impl<'a> CoverageEstimator<'a> {
    pub fn new(aoi: &'a Aoi, scenes: &'a [ScoredScene]) -> Self {
        Self {
            aoi,
            scenes: scenes.iter().map(|s| (s.id(), s)).collect(),
        }
    }

    fn members(&self, mosaic: &Mosaic) -> OptimizerResult<Vec<&'a ScoredScene>> {
        mosaic
            .members
            .iter()
            .map(|id| {
                self.scenes.get(id.as_str()).copied().ok_or_else(|| {
                    OptimizationError::Internal(format!(
                        "{} references unknown scene {}",
                        mosaic.id, id
                    ))
                })
            })
            .collect()
    }

    /// Metrics and exact member union of one mosaic.
    pub fn mosaic_metrics(
        &self,
        members: &[&ScoredScene],
    ) -> Result<(MosaicMetrics, MultiPolygon<f64>), GeometryError> {
        let areas: Vec<f64> = members.iter().map(|s| geometry::area(&s.clipped)).collect();

        let mut pairwise_area = 0.0;
        for i in 0..members.len() {
            for k in (i + 1)..members.len() {
                pairwise_area += geometry::intersection_area(&members[i].clipped, &members[k].clipped)?;
            }
        }
        let (individual_sum, pairwise_overlap, coverage) =
            second_order_coverage(&areas, pairwise_area, self.aoi.area());

        // Running union; each member is weighted by the area it adds.
        let mut union = MultiPolygon::new(Vec::new());
        let mut union_area = 0.0;
        let mut cloud_weighted = 0.0;
        for member in members {
            union = geometry::union(&union, &member.clipped)?;
            let next_area = geometry::area(&union);
            cloud_weighted += (next_area - union_area).max(0.0) * member.scene.cloud_fraction;
            union_area = next_area;
        }

        let n = members.len().max(1) as f64;
        let quality = members.iter().map(|s| s.metrics.quality).sum::<f64>() / n;
        let max_cloud = members
            .iter()
            .map(|s| s.scene.cloud_fraction)
            .fold(0.0, f64::max);
        let weighted_cloud = if union_area > 0.0 {
            (cloud_weighted / union_area).clamp(0.0, 1.0)
        } else {
            members.iter().map(|s| s.scene.cloud_fraction).sum::<f64>() / n
        };

        let metrics = MosaicMetrics {
            coverage,
            individual_sum,
            pairwise_overlap,
            union_coverage: self.aoi.fraction(union_area).clamp(0.0, 1.0),
            quality,
            max_cloud,
            weighted_cloud,
            effectiveness: coverage * quality,
        };
        Ok((metrics, union))
    }

    /// Estimates every mosaic and every candidate pair.
    pub fn estimate(&self, mosaics: &[Mosaic]) -> OptimizerResult<CoverageEstimate> {
        let resolved = mosaics
            .iter()
            .map(|m| self.members(m).map(|members| (m, members)))
            .collect::<OptimizerResult<Vec<_>>>()?;

        let computed: Vec<_> = resolved
            .par_iter()
            .map(|(mosaic, members)| (*mosaic, self.mosaic_metrics(members)))
            .collect();

        let mut candidates = Vec::with_capacity(computed.len());
        let mut unions = Vec::with_capacity(computed.len());
        let mut excluded = Vec::new();
        for (mosaic, result) in computed {
            match result {
                Ok((metrics, union)) => {
                    debug!(
                        "{}: A={:.4} (sum {:.4}, overlap {:.4}, union {:.4}) Q={:.4} N={:.4}",
                        mosaic.id,
                        metrics.coverage,
                        metrics.individual_sum,
                        metrics.pairwise_overlap,
                        metrics.union_coverage,
                        metrics.quality,
                        metrics.max_cloud
                    );
                    candidates.push(CandidateMosaic {
                        mosaic: mosaic.clone(),
                        metrics,
                    });
                    unions.push(union);
                }
                Err(e) => {
                    warn!("{} excluded from candidates: {}", mosaic.id, e);
                    excluded.push(mosaic.id.clone());
                }
            }
        }

        let (pairs, failed_pairs) = self.pair_intersections(&candidates, &unions);

        info!(
            "Estimated {} candidate mosaics, {} overlapping pairs ({} failed, {} mosaics excluded)",
            candidates.len(),
            pairs.len(),
            failed_pairs,
            excluded.len()
        );

        Ok(CoverageEstimate {
            candidates,
            pairs,
            excluded,
            failed_pairs,
        })
    }

    /// `I_{j,k}` for every pair; failures are taken as zero.
    fn pair_intersections(
        &self,
        candidates: &[CandidateMosaic],
        unions: &[MultiPolygon<f64>],
    ) -> (Vec<PairIntersection>, usize) {
        let n = unions.len();
        let index: Vec<(usize, usize)> = (0..n)
            .flat_map(|j| ((j + 1)..n).map(move |k| (j, k)))
            .collect();

        let results: Vec<_> = index
            .par_iter()
            .map(|&(j, k)| (j, k, geometry::intersection_area(&unions[j], &unions[k])))
            .collect();
        self.collect_pairs(candidates, results)
    }

    /// Keeps the positive intersections; a failed pair counts as zero.
    fn collect_pairs(
        &self,
        candidates: &[CandidateMosaic],
        results: Vec<(usize, usize, Result<f64, GeometryError>)>,
    ) -> (Vec<PairIntersection>, usize) {
        let mut pairs = Vec::new();
        let mut failed = 0;
        for (j, k, result) in results {
            match result {
                Ok(area) => {
                    let intersection = self.aoi.fraction(area).clamp(0.0, 1.0);
                    if intersection > 0.0 {
                        pairs.push(PairIntersection {
                            first: j,
                            second: k,
                            intersection,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Intersection of {} and {} failed, using 0: {}",
                        candidates[j].mosaic.id, candidates[k].mosaic.id, e
                    );
                    failed += 1;
                }
            }
        }
        (pairs, failed)
    }
}
