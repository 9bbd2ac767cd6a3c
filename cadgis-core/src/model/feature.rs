//! Canonical feature record: one extracted drawing entity, normalized.

use std::collections::BTreeMap;

use geo_types::Geometry;
use serde::{Deserialize, Serialize};

/// Feature-type tag, drawn from a fixed vocabulary derived from the source
/// entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Point entities.
    Point,
    /// Lines and open polylines.
    Line,
    /// Closed polylines and circles.
    Polygon,
    /// Text and annotation entities; geometry is the insertion point.
    Text,
}

impl FeatureKind {
    /// Stable string form used in the store and in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Point => "point",
            FeatureKind::Line => "line",
            FeatureKind::Polygon => "polygon",
            FeatureKind::Text => "text",
        }
    }

    /// Parse the stable string form.
    pub fn from_str_tag(s: &str) -> Option<Self> {
        match s {
            "point" => Some(FeatureKind::Point),
            "line" => Some(FeatureKind::Line),
            "polygon" => Some(FeatureKind::Polygon),
            "text" => Some(FeatureKind::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized feature extracted from a drawing.
///
/// Native geometry is always populated for a persisted feature; extraction
/// failures are rejected before persistence, never stored with null
/// geometry. Canonical geometry is present only when the native CRS is known
/// and the geometry could be reprojected into the canonical exchange CRS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalFeature {
    /// Store-assigned identity; `None` until persisted.
    pub id: Option<i64>,
    /// Owning drawing.
    pub drawing_id: String,
    /// Owning project, denormalized at write time for query performance.
    pub project_id: String,
    /// Source entity id within the drawing (extraction-order index; block
    /// sub-entities share the id of their insert).
    pub source_entity_id: i64,
    /// Feature-type tag.
    pub kind: FeatureKind,
    /// Source layer name.
    pub layer: String,
    /// Geometry in the drawing's own coordinate space, in raw drawing units.
    pub native: Geometry<f64>,
    /// Native CRS identifier, when resolved.
    pub native_srid: Option<u32>,
    /// Geometry in the canonical exchange CRS (geographic degrees).
    pub canonical: Option<Geometry<f64>>,
    /// Entity-specific attributes (text content, block name, ...).
    pub attributes: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_tag() {
        for kind in [
            FeatureKind::Point,
            FeatureKind::Line,
            FeatureKind::Polygon,
            FeatureKind::Text,
        ] {
            assert_eq!(FeatureKind::from_str_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(FeatureKind::from_str_tag("spline"), None);
    }
}
