//! Core domain models and geometry queries.
//!
//! This module defines the scene, AOI and mosaic records shared by every
//! phase, and the thin adapter over the planar geometry library.

pub mod domain;
pub mod geometry;
