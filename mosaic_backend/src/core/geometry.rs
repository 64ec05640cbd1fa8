//! Planar geometry queries used by the optimizer.
//!
//! All footprints are `geo::MultiPolygon<f64>` in a projected planar CRS. The
//! boolean operations of `geo` may panic on pathological input; every call
//! goes through [`guarded`] so a bad polygon surfaces as a
//! [`GeometryError::OperationFailed`] scoped to the scene or pair involved.

use std::panic::{self, AssertUnwindSafe};

use geo::{Area, BooleanOps, Coord, Intersects, LineString, MultiPolygon, Polygon};

use crate::error::GeometryError;

/// GeoJSON `MultiPolygon` coordinate array: polygons, rings, `[x, y]` points.
pub type MultiPolygonCoords = Vec<Vec<Vec<[f64; 2]>>>;

/// Builds a multipolygon from GeoJSON-style coordinates.
///
/// The first ring of each polygon is the exterior, the rest are holes. Rings
/// are closed automatically when the last point differs from the first.
pub fn multipolygon_from_coords(coords: &[Vec<Vec<[f64; 2]>>]) -> MultiPolygon<f64> {
    let polygons = coords
        .iter()
        .filter(|rings| !rings.is_empty())
        .map(|rings| {
            let mut iter = rings.iter().map(|ring| {
                LineString::from(
                    ring.iter()
                        .map(|p| Coord { x: p[0], y: p[1] })
                        .collect::<Vec<_>>(),
                )
            });
            // filter above guarantees one ring
            let exterior = iter.next().unwrap_or_else(|| LineString::new(Vec::new()));
            Polygon::new(exterior, iter.collect())
        })
        .collect::<Vec<_>>();
    MultiPolygon::new(polygons)
}

/// Converts a multipolygon back into GeoJSON-style coordinates.
pub fn multipolygon_to_coords(geometry: &MultiPolygon<f64>) -> MultiPolygonCoords {
    geometry
        .0
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(|ring| ring.0.iter().map(|c| [c.x, c.y]).collect())
                .collect()
        })
        .collect()
}

/// Checks that a footprint is usable for area computations.
///
/// Rejects empty geometries, non-finite coordinates, rings with fewer than 4
/// points, self-intersecting rings and zero-area geometries.
pub fn validate_footprint(geometry: &MultiPolygon<f64>) -> Result<(), GeometryError> {
    if geometry.0.is_empty() {
        return Err(GeometryError::Empty);
    }

    for (p_idx, polygon) in geometry.0.iter().enumerate() {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        for (r_idx, ring) in rings.enumerate() {
            if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
                return Err(GeometryError::NonFiniteCoordinate);
            }
            if ring.0.len() < 4 {
                return Err(GeometryError::DegenerateRing {
                    polygon: p_idx,
                    ring: r_idx,
                    points: ring.0.len(),
                });
            }
            if ring_self_intersects(ring) {
                return Err(GeometryError::SelfIntersection {
                    polygon: p_idx,
                    ring: r_idx,
                });
            }
        }
    }

    if area(geometry) <= 0.0 {
        return Err(GeometryError::ZeroArea);
    }

    Ok(())
}

/// Returns `true` if two non-adjacent segments of a closed ring touch.
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let segments: Vec<_> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = segments.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            if segments[i].intersects(&segments[j]) {
                return true;
            }
        }
    }
    false
}

/// Planar area of a multipolygon.
pub fn area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

fn guarded<F>(operation: &'static str, f: F) -> Result<MultiPolygon<f64>, GeometryError>
where
    F: FnOnce() -> MultiPolygon<f64>,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        GeometryError::OperationFailed { operation, message }
    })
}

pub fn intersection(
    a: &MultiPolygon<f64>,
    b: &MultiPolygon<f64>,
) -> Result<MultiPolygon<f64>, GeometryError> {
    if a.0.is_empty() || b.0.is_empty() {
        return Ok(MultiPolygon::new(Vec::new()));
    }
    // identical operands: exact result, no boolean-op rounding
    if a == b {
        return Ok(a.clone());
    }
    guarded("intersection", || a.intersection(b))
}

pub fn union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    if a.0.is_empty() {
        return Ok(b.clone());
    }
    if b.0.is_empty() || a == b {
        return Ok(a.clone());
    }
    guarded("union", || a.union(b))
}

/// Exact union of a sequence of geometries.
pub fn union_all<'a, I>(geometries: I) -> Result<MultiPolygon<f64>, GeometryError>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    geometries
        .into_iter()
        .try_fold(MultiPolygon::new(Vec::new()), |acc, g| union(&acc, g))
}

/// Area of `a ∩ b`.
pub fn intersection_area(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<f64, GeometryError> {
    Ok(area(&intersection(a, b)?))
}

/// Area that `candidate` adds on top of `covered`.
pub fn marginal_area(
    candidate: &MultiPolygon<f64>,
    covered: &MultiPolygon<f64>,
) -> Result<f64, GeometryError> {
    let overlap = intersection_area(candidate, covered)?;
    Ok((area(candidate) - overlap).max(0.0))
}
