//! Geometry construction and coordinate reprojection.

pub mod arcs;
mod builder;
mod reproject;

pub use builder::{build_native_geometry, BuiltGeometry};
pub use reproject::{srid_registered, Reprojector};
