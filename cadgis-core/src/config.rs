//! Configuration constants and settings for the ingestion pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Floating-point comparison epsilon, in drawing units.
pub const EPS: f64 = 1e-9;

/// Tolerance for the polyline closure tie-break, in drawing units.
///
/// A polyline whose first and last vertices coincide within this distance is
/// treated as closed even when its closed flag is unset; many CAD exports
/// omit the flag.
pub const CLOSE_TOLERANCE: f64 = 1e-6;

/// Chord tolerance for arc/circle/bulge tessellation, in drawing units.
///
/// The maximum distance between a tessellated chord and the true curve.
/// Segment counts are derived from this and the arc radius, so large arcs
/// get proportionally more segments instead of silently degrading.
pub const ARC_CHORD_TOLERANCE: f64 = 0.05;

/// Minimum number of segments for a full circle, regardless of radius.
pub const MIN_CIRCLE_SEGMENTS: u32 = 8;

/// Maximum number of segments for a full circle, regardless of radius.
pub const MAX_CIRCLE_SEGMENTS: u32 = 512;

/// Maximum nesting depth for recursive block inserts.
pub const MAX_INSERT_DEPTH: usize = 32;

/// The canonical exchange CRS all canonical geometry is stored in.
pub const CANONICAL_SRID: u32 = 4326;

/// Conversion factor: international feet to meters.
pub const FEET_TO_METERS: f64 = 0.3048;

/// Conversion factor: US survey feet to meters (1200/3937, exact).
pub const US_SURVEY_FEET_TO_METERS: f64 = 1200.0 / 3937.0;

use serde::{Deserialize, Serialize};

/// Linear unit of drawing coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinearUnit {
    Meters,
    Millimeters,
    Centimeters,
    Kilometers,
    Feet,
    #[default]
    UsSurveyFeet,
    Inches,
    Yards,
}

impl LinearUnit {
    /// Parse a unit from its user-facing name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "meter" | "meters" => Some(LinearUnit::Meters),
            "mm" | "millimeter" | "millimeters" => Some(LinearUnit::Millimeters),
            "cm" | "centimeter" | "centimeters" => Some(LinearUnit::Centimeters),
            "km" | "kilometer" | "kilometers" => Some(LinearUnit::Kilometers),
            "ft" | "foot" | "feet" => Some(LinearUnit::Feet),
            "usft" | "us-survey-feet" | "survey-feet" => Some(LinearUnit::UsSurveyFeet),
            "in" | "inch" | "inches" => Some(LinearUnit::Inches),
            "yd" | "yard" | "yards" => Some(LinearUnit::Yards),
            _ => None,
        }
    }

    /// Get the conversion factor from this unit to meters.
    pub fn to_meter_factor(&self) -> f64 {
        match self {
            LinearUnit::Meters => 1.0,
            LinearUnit::Millimeters => 0.001,
            LinearUnit::Centimeters => 0.01,
            LinearUnit::Kilometers => 1000.0,
            LinearUnit::Feet => FEET_TO_METERS,
            LinearUnit::UsSurveyFeet => US_SURVEY_FEET_TO_METERS,
            LinearUnit::Inches => 0.0254,
            LinearUnit::Yards => 0.9144,
        }
    }
}

impl std::fmt::Display for LinearUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinearUnit::Meters => "m",
            LinearUnit::Millimeters => "mm",
            LinearUnit::Centimeters => "cm",
            LinearUnit::Kilometers => "km",
            LinearUnit::Feet => "ft",
            LinearUnit::UsSurveyFeet => "usft",
            LinearUnit::Inches => "in",
            LinearUnit::Yards => "yd",
        };
        write!(f, "{}", name)
    }
}

/// Project-level defaults applied when a drawing is ambiguous about its own
/// units or coordinate reference system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDefaults {
    /// Fallback linear unit when the drawing header declares none.
    pub default_unit: LinearUnit,
    /// Fallback native SRID when the drawing carries no CRS identifier.
    /// `None` leaves the drawing ungeoreferenced.
    pub default_srid: Option<u32>,
}

impl Default for ProjectDefaults {
    fn default() -> Self {
        Self {
            default_unit: LinearUnit::UsSurveyFeet,
            default_srid: None,
        }
    }
}

/// Per-run ingestion options.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Identity of the drawing being ingested.
    pub drawing_id: String,
    /// Owning project; denormalized onto every feature at write time.
    pub project_id: String,
    /// Explicit CRS identifier for this drawing. Takes precedence over the
    /// project default. DXF has no portable CRS header variable, so an
    /// explicit identifier always arrives from the import request.
    pub srid_override: Option<u32>,
    /// Explicit unit override for this drawing.
    pub unit_override: Option<LinearUnit>,
    /// Georeferencing anchor: translation applied to drawing coordinates to
    /// place the local origin in the native CRS.
    pub anchor: Option<[f64; 3]>,
    /// Project-level fallbacks.
    pub defaults: ProjectDefaults,
}

impl IngestOptions {
    /// Create options for one drawing with project defaults.
    pub fn new(drawing_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            drawing_id: drawing_id.into(),
            project_id: project_id.into(),
            srid_override: None,
            unit_override: None,
            anchor: None,
            defaults: ProjectDefaults::default(),
        }
    }
}

/// Cooperative cancellation flag shared between the caller and a running
/// ingestion. Checked once per extracted entity, never mid-entity.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the associated run.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Utility functions for floating-point comparisons.
pub mod float_cmp {
    use super::EPS;

    /// Check if two floats are approximately equal.
    #[inline]
    pub fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    /// Check if a float is approximately zero.
    #[inline]
    pub fn approx_zero(a: f64) -> bool {
        a.abs() < EPS
    }

    /// Check if two 2D points coincide within a tolerance.
    #[inline]
    pub fn points_coincide(a: (f64, f64), b: (f64, f64), tolerance: f64) -> bool {
        let dx = a.0 - b.0;
        let dy = a.1 - b.1;
        (dx * dx + dy * dy).sqrt() < tolerance
    }
}
