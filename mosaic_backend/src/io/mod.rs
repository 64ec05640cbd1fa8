//! File formats read and written by the optimizer.
//!
//! - [`catalog`]: scene catalog and AOI JSON input
//! - [`candidates`]: candidate-set artifact and selection output
//!
//! # Example
//!
//! ```no_run
//! use mosaic_backend::io::catalog::{load_aoi, load_catalog};
//! use std::path::Path;
//!
//! let scenes = load_catalog(Path::new("catalog.json")).expect("Failed to load");
//! let aoi = load_aoi(Path::new("aoi.json")).expect("Failed to load");
//! println!("Loaded {} scenes for an AOI of {:.0} m²", scenes.len(), aoi.area());
//! ```

pub mod candidates;
pub mod catalog;

pub use candidates::{load_candidates, save_candidates, save_selection, SelectionOutput};
pub use catalog::{load_aoi, load_catalog, parse_aoi_str, parse_catalog_str};
