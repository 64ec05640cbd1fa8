//! Phase 1: greedy construction of candidate mosaics.
//!
//! Seeds are taken in effectiveness order (E desc, then id asc). A seed is
//! eligible when it has never seeded a mosaic and is not a member of an
//! accepted one. Extension draws from every scored scene inside the temporal
//! window, so a scene may end up in several candidates.

use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::config::GreedySettings;
use crate::core::domain::{AcceptanceKind, Aoi, Mosaic, ScoredScene};
use crate::core::geometry;
use crate::error::GeometryError;

/// Result of a greedy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreedyOutcome {
    pub mosaics: Vec<Mosaic>,
    /// Exact AOI fraction covered by the union of all accepted mosaics.
    pub global_coverage: f64,
    pub seeds_tried: usize,
    /// Mosaics dropped for falling below the minimum coverage.
    pub discarded: usize,
}

/// Whole-day gap between two acquisitions, truncated toward zero.
pub fn days_apart(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (b - a).num_days().abs()
}

/// Indices of `scenes` ordered by effectiveness desc, then id asc.
pub fn rank_scenes(scenes: &[ScoredScene]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scenes.len()).collect();
    order.sort_by(|&a, &b| {
        scenes[b]
            .metrics
            .effectiveness
            .partial_cmp(&scenes[a].metrics.effectiveness)
            .unwrap_or(Ordering::Equal)
            .then_with(|| scenes[a].id().cmp(scenes[b].id()))
    });
    order
}

/// Running state of the mosaic under construction.
struct Draft {
    seed: usize,
    members: Vec<usize>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    union: MultiPolygon<f64>,
    covered_area: f64,
}

impl Draft {
    fn new(seed: usize, scene: &ScoredScene) -> Self {
        Self {
            seed,
            members: vec![seed],
            start: scene.scene.acquired,
            end: scene.scene.acquired,
            covered_area: geometry::area(&scene.clipped),
            union: scene.clipped.clone(),
        }
    }

    /// Whether `t` keeps the member interval within `max_days`.
    fn fits(&self, t: DateTime<Utc>, max_days: i64) -> bool {
        let start = self.start.min(t);
        let end = self.end.max(t);
        (end - start).num_days() <= max_days
    }
}

/// Greedy mosaic builder over a scored, cloud-filtered catalog.
pub struct GreedyMosaicBuilder<'a> {
    scenes: &'a [ScoredScene],
    aoi: &'a Aoi,
    settings: &'a GreedySettings,
}

impl<'a> GreedyMosaicBuilder<'a> {
    pub fn new(scenes: &'a [ScoredScene], aoi: &'a Aoi, settings: &'a GreedySettings) -> Self {
        Self {
            scenes,
            aoi,
            settings,
        }
    }

    /// Runs the construction loop until the AOI is practically covered or no
    /// seed remains.
    pub fn build(&self) -> GreedyOutcome {
        let n = self.scenes.len();
        let order = rank_scenes(self.scenes);
        let mut used_as_seed = vec![false; n];
        let mut in_accepted = vec![false; n];
        let mut global_union = MultiPolygon::new(Vec::new());
        let mut global_coverage = 0.0;
        let mut mosaics = Vec::new();
        let mut seeds_tried = 0;
        let mut discarded = 0;

        while global_coverage < self.settings.full_coverage_fraction {
            let seed = match order
                .iter()
                .copied()
                .find(|&i| !used_as_seed[i] && !in_accepted[i])
            {
                Some(seed) => seed,
                None => break,
            };
            used_as_seed[seed] = true;
            seeds_tried += 1;

            let mut draft = self.extend(seed, &order);
            if self.settings.prune_redundant {
                self.prune(&mut draft);
            }

            if draft.covered_area <= 0.0 {
                debug!("Seed {} produced an empty mosaic, stopping", self.scenes[seed].id());
                break;
            }

            let coverage = self.aoi.fraction(draft.covered_area).clamp(0.0, 1.0);
            if coverage < self.settings.min_coverage {
                debug!(
                    "Mosaic seeded by {} discarded: coverage {:.4} below minimum {:.4}",
                    self.scenes[seed].id(),
                    coverage,
                    self.settings.min_coverage
                );
                discarded += 1;
                continue;
            }

            let acceptance = if coverage >= self.settings.target_coverage {
                AcceptanceKind::TargetReached
            } else {
                AcceptanceKind::Partial
            };

            match geometry::union(&global_union, &draft.union) {
                Ok(u) => {
                    global_coverage = self.aoi.fraction(geometry::area(&u)).clamp(0.0, 1.0);
                    global_union = u;
                }
                Err(e) => warn!("Global coverage not updated for seed {}: {}", self.scenes[seed].id(), e),
            }

            for &m in &draft.members {
                in_accepted[m] = true;
            }

            let mosaic = Mosaic {
                id: format!("mosaic_{}", mosaics.len() + 1),
                seed: self.scenes[draft.seed].id().to_string(),
                members: draft
                    .members
                    .iter()
                    .map(|&m| self.scenes[m].id().to_string())
                    .collect(),
                start: draft.start,
                end: draft.end,
                coverage,
                acceptance,
            };
            debug!(
                "Accepted {} with {} scenes, coverage {:.4} ({:?})",
                mosaic.id,
                mosaic.members.len(),
                coverage,
                acceptance
            );
            mosaics.push(mosaic);
        }

        info!(
            "Greedy builder produced {} mosaics from {} seeds ({} discarded), global coverage {:.4}",
            mosaics.len(),
            seeds_tried,
            discarded,
            global_coverage
        );

        GreedyOutcome {
            mosaics,
            global_coverage,
            seeds_tried,
            discarded,
        }
    }

    fn extend(&self, seed: usize, order: &[usize]) -> Draft {
        let seed_scene = &self.scenes[seed];
        let max_days = self.settings.max_days_apart;
        let mut draft = Draft::new(seed, seed_scene);

        let mut pool: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&i| {
                i != seed
                    && days_apart(seed_scene.scene.acquired, self.scenes[i].scene.acquired)
                        <= max_days
            })
            .collect();

        while !pool.is_empty() {
            let mut picked = None;
            for (pos, &candidate) in pool.iter().enumerate() {
                match self.gain(&draft, candidate) {
                    Ok((gain, union, area)) if gain >= self.settings.min_contribution => {
                        picked = Some((pos, candidate, union, area));
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(
                        "Scene {} skipped while extending {}: {}",
                        self.scenes[candidate].id(),
                        seed_scene.id(),
                        e
                    ),
                }
            }

            let Some((pos, candidate, union, area)) = picked else {
                break;
            };

            // Gains only shrink as the union grows, so the scenes checked
            // before the pick can never qualify again.
            pool.drain(..=pos);

            let t = self.scenes[candidate].scene.acquired;
            draft.members.push(candidate);
            draft.start = draft.start.min(t);
            draft.end = draft.end.max(t);
            draft.union = union;
            draft.covered_area = area;

            pool.retain(|&i| draft.fits(self.scenes[i].scene.acquired, max_days));
        }

        draft
    }

    /// Coverage gain of adding `candidate`, with the resulting union and area.
    fn gain(
        &self,
        draft: &Draft,
        candidate: usize,
    ) -> Result<(f64, MultiPolygon<f64>, f64), GeometryError> {
        let union = geometry::union(&draft.union, &self.scenes[candidate].clipped)?;
        let area = geometry::area(&union);
        let gain = self.aoi.fraction(area - draft.covered_area);
        Ok((gain, union, area))
    }

    /// Removes members made redundant by a near-total overlap with another
    /// member. The seed is never removed.
    fn prune(&self, draft: &mut Draft) {
        loop {
            if draft.members.len() < 3 {
                return;
            }
            match self.find_redundant(draft) {
                Ok(Some(pos)) => {
                    let removed = draft.members.remove(pos);
                    debug!("Pruned redundant scene {}", self.scenes[removed].id());
                    if let Err(e) = self.refresh(draft) {
                        warn!("Pruning aborted for seed {}: {}", self.scenes[draft.seed].id(), e);
                        return;
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    warn!("Pruning skipped for seed {}: {}", self.scenes[draft.seed].id(), e);
                    return;
                }
            }
        }
    }

    /// Position of the first member to drop, if any pair is redundant.
    fn find_redundant(&self, draft: &Draft) -> Result<Option<usize>, GeometryError> {
        let members = &draft.members;
        for a in 0..members.len() {
            for b in (a + 1)..members.len() {
                let sa = &self.scenes[members[a]];
                let sb = &self.scenes[members[b]];
                let smaller = geometry::area(&sa.clipped).min(geometry::area(&sb.clipped));
                if smaller <= 0.0 {
                    continue;
                }
                let overlap = geometry::intersection_area(&sa.clipped, &sb.clipped)?;
                if overlap <= self.settings.redundancy_overlap_ratio * smaller {
                    continue;
                }

                let keep_a = self.unique_contribution(draft, a)? >= self.settings.redundancy_min_unique;
                let keep_b = self.unique_contribution(draft, b)? >= self.settings.redundancy_min_unique;
                let drop = match (keep_a, keep_b) {
                    (true, true) => None,
                    (true, false) => Some(b),
                    (false, true) => Some(a),
                    (false, false) => {
                        if sb.scene.cloud_fraction < sa.scene.cloud_fraction {
                            Some(a)
                        } else {
                            Some(b)
                        }
                    }
                };

                if let Some(pos) = drop {
                    if members[pos] != draft.seed {
                        return Ok(Some(pos));
                    }
                }
            }
        }
        Ok(None)
    }

    /// AOI fraction only member `pos` covers within the draft.
    fn unique_contribution(&self, draft: &Draft, pos: usize) -> Result<f64, GeometryError> {
        let others = geometry::union_all(
            draft
                .members
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != pos)
                .map(|(_, &m)| &self.scenes[m].clipped),
        )?;
        let own = &self.scenes[draft.members[pos]].clipped;
        Ok(self.aoi.fraction(geometry::marginal_area(own, &others)?))
    }

    fn refresh(&self, draft: &mut Draft) -> Result<(), GeometryError> {
        draft.union = geometry::union_all(draft.members.iter().map(|&m| &self.scenes[m].clipped))?;
        draft.covered_area = geometry::area(&draft.union);
        let times = draft.members.iter().map(|&m| self.scenes[m].scene.acquired);
        draft.start = times.clone().min().unwrap_or(draft.start);
        draft.end = times.max().unwrap_or(draft.end);
        Ok(())
    }
}

/// Convenience wrapper around [`GreedyMosaicBuilder`].
pub fn build_mosaics(scenes: &[ScoredScene], aoi: &Aoi, settings: &GreedySettings) -> GreedyOutcome {
    GreedyMosaicBuilder::new(scenes, aoi, settings).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::Scene;
    use crate::core::geometry::multipolygon_from_coords;
    use crate::preprocessing::score_scene;
    use chrono::{Duration, TimeZone};

    fn aoi() -> Aoi {
        Aoi::new(None, rect(0.0, 0.0, 10.0, 10.0)).unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        multipolygon_from_coords(&[vec![vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]]])
    }

    fn scored(id: &str, day: i64, x0: f64, x1: f64, cloud: f64) -> ScoredScene {
        let base = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let scene = Scene {
            id: id.to_string(),
            acquired: base + Duration::days(day),
            footprint: rect(x0, 0.0, x1, 10.0),
            valid_pixel_fraction: 1.0,
            cloud_fraction: cloud,
        };
        score_scene(scene, &aoi(), 0.3).unwrap()
    }

    fn ids(mosaic: &Mosaic) -> Vec<&str> {
        mosaic.members.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_two_overlapping_scenes_form_one_mosaic() {
        let scenes = vec![scored("a", 0, 0.0, 6.0, 0.0), scored("b", 1, 5.0, 9.0, 0.0)];
        let aoi = aoi();
        let settings = GreedySettings::default();

        let outcome = build_mosaics(&scenes, &aoi, &settings);

        assert_eq!(outcome.mosaics.len(), 1);
        let m = &outcome.mosaics[0];
        assert_eq!(m.id, "mosaic_1");
        assert_eq!(m.seed, "a");
        assert_eq!(ids(m), vec!["a", "b"]);
        assert!((m.coverage - 0.9).abs() < 1e-9);
        assert_eq!(m.acceptance, AcceptanceKind::TargetReached);
        assert!((outcome.global_coverage - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_temporal_window_separates_scenes() {
        let scenes = vec![scored("a", 0, 0.0, 5.0, 0.0), scored("b", 6, 5.0, 10.0, 0.0)];
        let aoi = aoi();
        let outcome = build_mosaics(&scenes, &aoi, &GreedySettings::default());

        assert_eq!(outcome.mosaics.len(), 2);
        assert_eq!(ids(&outcome.mosaics[0]), vec!["a"]);
        assert_eq!(ids(&outcome.mosaics[1]), vec!["b"]);
        assert_eq!(outcome.mosaics[0].acceptance, AcceptanceKind::Partial);
    }

    #[test]
    fn test_window_tightens_around_members() {
        // b is within 5 days of the seed, c too, but b and c are 8 days apart
        let scenes = vec![
            scored("a", 0, 0.0, 4.0, 0.0),
            scored("b", -4, 4.0, 7.0, 0.0),
            scored("c", 4, 7.0, 9.0, 0.0),
        ];
        let aoi = aoi();
        let outcome = build_mosaics(&scenes, &aoi, &GreedySettings::default());

        let first = &outcome.mosaics[0];
        assert_eq!(ids(first), vec!["a", "b"]);
        assert!(first.span_days() <= 5);
    }

    #[test]
    fn test_small_contribution_is_rejected() {
        // b adds only 3% of the AOI
        let scenes = vec![scored("a", 0, 0.0, 8.0, 0.0), scored("b", 0, 7.0, 8.3, 0.0)];
        let aoi = aoi();
        let outcome = build_mosaics(&scenes, &aoi, &GreedySettings::default());

        assert_eq!(ids(&outcome.mosaics[0]), vec!["a"]);
    }

    #[test]
    fn test_mosaic_below_minimum_is_discarded() {
        let scenes = vec![scored("tiny", 0, 0.0, 0.1, 0.0)];
        let aoi = aoi();
        let outcome = build_mosaics(&scenes, &aoi, &GreedySettings::default());

        assert!(outcome.mosaics.is_empty());
        assert_eq!(outcome.discarded, 1);
    }

    #[test]
    fn test_scenes_are_reused_across_candidates() {
        let scenes = vec![
            scored("a", 0, 0.0, 4.0, 0.0),
            scored("b", 5, 4.0, 7.0, 0.0),
            scored("c", 10, 7.0, 9.0, 0.0),
        ];
        let aoi = aoi();
        let outcome = build_mosaics(&scenes, &aoi, &GreedySettings::default());

        assert_eq!(outcome.mosaics.len(), 2);
        assert_eq!(ids(&outcome.mosaics[0]), vec!["a", "b"]);
        assert_eq!(ids(&outcome.mosaics[1]), vec!["c", "b"]);
        assert!((outcome.global_coverage - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_ties_break_by_lowest_id() {
        let scenes = vec![scored("z", 0, 0.0, 5.0, 0.0), scored("m", 20, 5.0, 10.0, 0.0)];
        let aoi = aoi();
        let outcome = build_mosaics(&scenes, &aoi, &GreedySettings::default());

        assert_eq!(outcome.mosaics[0].seed, "m");
        assert_eq!(outcome.mosaics[1].seed, "z");
    }

    #[test]
    fn test_stops_at_full_coverage() {
        let scenes = vec![scored("full", 0, 0.0, 10.0, 0.0), scored("other", 30, 0.0, 5.0, 0.0)];
        let aoi = aoi();
        let outcome = build_mosaics(&scenes, &aoi, &GreedySettings::default());

        assert_eq!(outcome.mosaics.len(), 1);
        assert_eq!(outcome.seeds_tried, 1);
    }

    #[test]
    fn test_redundant_member_is_pruned() {
        // l is almost fully covered by m once m joins
        let scenes = vec![
            scored("s", 0, 0.0, 5.0, 0.0),
            scored("l", 0, 5.0, 8.0, 0.0),
            scored("m", 0, 5.0, 10.0, 0.45),
        ];
        let aoi = aoi();
        let outcome = build_mosaics(&scenes, &aoi, &GreedySettings::default());

        let first = &outcome.mosaics[0];
        assert_eq!(ids(first), vec!["s", "m"]);
        assert!((first.coverage - 1.0).abs() < 1e-9);

        let settings = GreedySettings {
            prune_redundant: false,
            ..GreedySettings::default()
        };
        let unpruned = build_mosaics(&scenes, &aoi, &settings);
        assert_eq!(ids(&unpruned.mosaics[0]), vec!["s", "l", "m"]);
    }

    #[test]
    fn test_days_apart_truncates() {
        let t = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(days_apart(t, t + Duration::hours(143)), 5);
        assert_eq!(days_apart(t + Duration::hours(143), t), 5);
        assert_eq!(days_apart(t, t + Duration::hours(144)), 6);
    }
}
