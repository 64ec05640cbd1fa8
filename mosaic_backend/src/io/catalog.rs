//! Scene catalog and AOI readers.
//!
//! Catalog documents look like:
//!
//! ```json
//! { "scenes": [ { "id": "S2B_...", "acquired": "2023-06-01T10:20:00Z",
//!                 "footprint": [[[[0,0],[1,0],[1,1],[0,1],[0,0]]]],
//!                 "valid_pixel_fraction": 0.98, "cloud_fraction": 0.12 } ] }
//! ```
//!
//! `footprint` and the AOI `geometry` are GeoJSON `MultiPolygon` coordinate
//! arrays in a projected planar CRS.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::domain::{Aoi, Scene};
use crate::core::geometry::{multipolygon_from_coords, MultiPolygonCoords};
use crate::error::CatalogError;

/// Raw JSON structure for a catalog document
#[derive(Debug, Deserialize)]
struct RawCatalog {
    scenes: Vec<RawScene>,
}

/// Raw JSON structure for one scene
#[derive(Debug, Deserialize)]
struct RawScene {
    id: String,
    acquired: String,
    footprint: MultiPolygonCoords,
    #[serde(default = "default_valid_pixel_fraction")]
    valid_pixel_fraction: f64,
    cloud_fraction: f64,
}

/// Raw JSON structure for an AOI document
#[derive(Debug, Deserialize)]
struct RawAoi {
    #[serde(default)]
    name: Option<String>,
    geometry: MultiPolygonCoords,
}

fn default_valid_pixel_fraction() -> f64 {
    1.0
}

/// Deserializes JSON, reporting the path of the offending field.
pub(crate) fn from_json_str<T: DeserializeOwned>(json: &str) -> Result<T, CatalogError> {
    let de = &mut serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(de).map_err(|e| CatalogError::Json {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

/// Parses RFC 3339 timestamps; bare `YYYY-MM-DD` dates mean midnight UTC.
fn parse_acquired(scene_id: &str, value: &str) -> Result<DateTime<Utc>, CatalogError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CatalogError::Timestamp {
            scene_id: scene_id.to_string(),
            value: value.to_string(),
            message: "expected RFC 3339 or YYYY-MM-DD".to_string(),
        })
}

fn check_fraction(index: usize, field: &str, value: f64) -> Result<(), CatalogError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CatalogError::FractionOutOfRange {
            path: format!("scenes[{}].{}", index, field),
            value,
        });
    }
    Ok(())
}

/// Parse a scene catalog from a JSON string.
///
/// Footprints are not validated here; invalid ones are excluded by the scorer.
pub fn parse_catalog_str(json: &str) -> Result<Vec<Scene>, CatalogError> {
    let raw: RawCatalog = from_json_str(json)?;
    let mut seen = HashSet::with_capacity(raw.scenes.len());
    let mut scenes = Vec::with_capacity(raw.scenes.len());

    for (i, r) in raw.scenes.into_iter().enumerate() {
        if !seen.insert(r.id.clone()) {
            return Err(CatalogError::DuplicateScene(r.id));
        }
        check_fraction(i, "valid_pixel_fraction", r.valid_pixel_fraction)?;
        check_fraction(i, "cloud_fraction", r.cloud_fraction)?;
        let acquired = parse_acquired(&r.id, &r.acquired)?;
        scenes.push(Scene {
            footprint: multipolygon_from_coords(&r.footprint),
            id: r.id,
            acquired,
            valid_pixel_fraction: r.valid_pixel_fraction,
            cloud_fraction: r.cloud_fraction,
        });
    }

    Ok(scenes)
}

/// Parse an AOI from a JSON string, validating its geometry.
pub fn parse_aoi_str(json: &str) -> Result<Aoi, CatalogError> {
    let raw: RawAoi = from_json_str(json)?;
    Ok(Aoi::new(raw.name, multipolygon_from_coords(&raw.geometry))?)
}

pub fn load_catalog(path: &Path) -> Result<Vec<Scene>> {
    let content = read(path)?;
    parse_catalog_str(&content)
        .with_context(|| format!("Failed to parse scene catalog {}", path.display()))
}

pub fn load_aoi(path: &Path) -> Result<Aoi> {
    let content = read(path)?;
    parse_aoi_str(&content).with_context(|| format!("Failed to parse AOI {}", path.display()))
}

fn read(path: &Path) -> Result<String, CatalogError> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeometryError;
    use chrono::TimeZone;
    use std::io::Write;

    const CATALOG: &str = r#"{
        "scenes": [
            {
                "id": "S2A_T23KPQ_20230601",
                "acquired": "2023-06-01T13:05:00Z",
                "footprint": [[[[0, 0], [6, 0], [6, 10], [0, 10], [0, 0]]]],
                "valid_pixel_fraction": 0.97,
                "cloud_fraction": 0.05
            },
            {
                "id": "S2B_T23KPQ_20230604",
                "acquired": "2023-06-04",
                "footprint": [[[[5, 0], [9, 0], [9, 10], [5, 10]]]],
                "cloud_fraction": 0.2
            }
        ]
    }"#;

    #[test]
    fn test_parse_catalog() {
        let scenes = parse_catalog_str(CATALOG).unwrap();
        assert_eq!(scenes.len(), 2);
        assert_eq!(
            scenes[0].acquired,
            Utc.with_ymd_and_hms(2023, 6, 1, 13, 5, 0).unwrap()
        );
        assert_eq!(
            scenes[1].acquired,
            Utc.with_ymd_and_hms(2023, 6, 4, 0, 0, 0).unwrap()
        );
        assert_eq!(scenes[1].valid_pixel_fraction, 1.0);
        assert_eq!(scenes[0].footprint.0.len(), 1);
    }

    #[test]
    fn test_parse_catalog_reports_json_path() {
        let bad = r#"{"scenes": [{"id": "a", "acquired": "2023-01-01", "footprint": [], "cloud_fraction": "high"}]}"#;
        match parse_catalog_str(bad) {
            Err(CatalogError::Json { path, .. }) => assert_eq!(path, "scenes[0].cloud_fraction"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_catalog_rejects_bad_timestamp() {
        let bad = r#"{"scenes": [{"id": "a", "acquired": "yesterday", "footprint": [], "cloud_fraction": 0.1}]}"#;
        assert!(matches!(
            parse_catalog_str(bad),
            Err(CatalogError::Timestamp { .. })
        ));
    }

    #[test]
    fn test_parse_catalog_rejects_duplicate_ids() {
        let dup = r#"{"scenes": [
            {"id": "a", "acquired": "2023-01-01", "footprint": [], "cloud_fraction": 0.1},
            {"id": "a", "acquired": "2023-01-02", "footprint": [], "cloud_fraction": 0.1}
        ]}"#;
        assert!(matches!(
            parse_catalog_str(dup),
            Err(CatalogError::DuplicateScene(id)) if id == "a"
        ));
    }

    #[test]
    fn test_parse_catalog_rejects_fractions_outside_unit_interval() {
        let cloudy = r#"{"scenes": [
            {"id": "a", "acquired": "2023-01-01", "footprint": [], "cloud_fraction": 0.1},
            {"id": "b", "acquired": "2023-01-02", "footprint": [], "cloud_fraction": 1.5}
        ]}"#;
        match parse_catalog_str(cloudy) {
            Err(CatalogError::FractionOutOfRange { path, value }) => {
                assert_eq!(path, "scenes[1].cloud_fraction");
                assert_eq!(value, 1.5);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let negative = r#"{"scenes": [{"id": "a", "acquired": "2023-01-01", "footprint": [],
            "valid_pixel_fraction": -0.2, "cloud_fraction": 0.1}]}"#;
        assert!(matches!(
            parse_catalog_str(negative),
            Err(CatalogError::FractionOutOfRange { path, .. }) if path == "scenes[0].valid_pixel_fraction"
        ));
    }

    #[test]
    fn test_parse_aoi() {
        let aoi = parse_aoi_str(
            r#"{"name": "tile", "geometry": [[[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]]}"#,
        )
        .unwrap();
        assert_eq!(aoi.area(), 100.0);
        assert_eq!(aoi.name.as_deref(), Some("tile"));
    }

    #[test]
    fn test_parse_aoi_rejects_empty_geometry() {
        assert!(matches!(
            parse_aoi_str(r#"{"geometry": []}"#),
            Err(CatalogError::Aoi(GeometryError::Empty))
        ));
    }

    #[test]
    fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let scenes = load_catalog(file.path()).unwrap();
        assert_eq!(scenes.len(), 2);
    }

    #[test]
    fn test_load_catalog_missing_file() {
        let err = load_catalog(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
