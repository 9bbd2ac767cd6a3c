//! Drawing record representing one ingested CAD file.

use serde::{Deserialize, Serialize};

use crate::config::LinearUnit;

/// One ingested CAD drawing.
///
/// Created once at import time. Georeferencing fields may be corrected later
/// through a reprojection pass; deleting a drawing (or its owning project)
/// cascades to all of its features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drawing {
    /// Drawing identity.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Source file name, for provenance.
    pub source_file: Option<String>,
    /// Declared or detected linear unit of drawing coordinates.
    pub native_unit: LinearUnit,
    /// Conversion factor from one drawing unit to meters.
    pub unit_to_meter: f64,
    /// Native CRS identifier; `None` means unknown, which is a normal state,
    /// not an error.
    pub native_srid: Option<u32>,
    /// Whether the drawing's coordinate space is tied to a real-world CRS.
    pub is_georeferenced: bool,
    /// Georeferencing anchor: translation placing the drawing's local origin
    /// in the native CRS.
    pub anchor: Option<[f64; 3]>,
}

impl Drawing {
    /// Create a drawing record. The georeferenced flag is derived from the
    /// presence of a native SRID so the invariant (georeferenced implies
    /// SRID and scale factor present) holds by construction.
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        native_unit: LinearUnit,
        native_srid: Option<u32>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            source_file: None,
            native_unit,
            unit_to_meter: native_unit.to_meter_factor(),
            native_srid,
            is_georeferenced: native_srid.is_some(),
            anchor: None,
        }
    }

    /// Check the georeferencing invariant: a georeferenced drawing must have
    /// a native SRID and a positive scale factor.
    pub fn georeferencing_consistent(&self) -> bool {
        !self.is_georeferenced || (self.native_srid.is_some() && self.unit_to_meter > 0.0)
    }
}
