//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use geo::MultiPolygon;
use mosaic_backend::core::domain::{Aoi, Scene};
use mosaic_backend::core::geometry::multipolygon_from_coords;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 13, 0, 0).unwrap()
}

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    multipolygon_from_coords(&[vec![vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]]])
}

/// 10 × 10 square AOI at the origin.
pub fn square_aoi() -> Aoi {
    Aoi::new(Some("test".to_string()), rect(0.0, 0.0, 10.0, 10.0)).unwrap()
}

pub fn scene(id: &str, day: i64, footprint: MultiPolygon<f64>, valid: f64, cloud: f64) -> Scene {
    Scene {
        id: id.to_string(),
        acquired: base_time() + Duration::days(day),
        footprint,
        valid_pixel_fraction: valid,
        cloud_fraction: cloud,
    }
}

/// Full-height strip `x0..x1` of the square AOI.
pub fn strip(id: &str, day: i64, x0: f64, x1: f64, cloud: f64) -> Scene {
    scene(id, day, rect(x0, 0.0, x1, 10.0), 1.0, cloud)
}

/// The three-scene catalog: a 60% strip, a 40% strip overlapping it by 10%,
/// and a small cloudy scene above the 0.40 ceiling.
pub fn three_scene_catalog() -> Vec<Scene> {
    vec![
        strip("A", 0, 0.0, 6.0, 0.0),
        strip("B", 2, 5.0, 9.0, 0.0),
        strip("C", 1, 9.0, 9.5, 0.45),
    ]
}

pub fn catalog_json(scenes: &[Scene]) -> String {
    let entries: Vec<serde_json::Value> = scenes
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id,
                "acquired": s.acquired.to_rfc3339(),
                "footprint": mosaic_backend::core::geometry::multipolygon_to_coords(&s.footprint),
                "valid_pixel_fraction": s.valid_pixel_fraction,
                "cloud_fraction": s.cloud_fraction,
            })
        })
        .collect();
    serde_json::json!({ "scenes": entries }).to_string()
}

pub fn aoi_json() -> String {
    serde_json::json!({
        "name": "test",
        "geometry": [[[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]]],
    })
    .to_string()
}
