//! Ingestion report: per-drawing counts, rejections, and bounding extents.
//!
//! The report is a pure aggregate over a feature set. It never mutates the
//! features, so recomputing it over an unchanged set reproduces the same
//! report. Counts use ordered maps to keep serialized output stable.

use std::collections::BTreeMap;

use geo::BoundingRect;
use geo_types::Rect;
use serde::Serialize;

use crate::error::Rejection;
use crate::model::CanonicalFeature;

/// Axis-aligned bounding extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }

    /// Grow this extent to cover another rectangle.
    fn expand(&mut self, rect: Rect<f64>) {
        self.min_x = self.min_x.min(rect.min().x);
        self.min_y = self.min_y.min(rect.min().y);
        self.max_x = self.max_x.max(rect.max().x);
        self.max_y = self.max_y.max(rect.max().y);
    }
}

/// Summary of one ingestion run (or a readback over the persisted set).
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Drawing the report covers.
    pub drawing_id: String,
    /// Features written to the store.
    pub features_written: usize,
    /// Features whose canonical geometry could not be produced (unknown or
    /// unregistered CRS, or a reprojection domain failure).
    pub features_without_canonical: usize,
    /// Feature counts per source layer.
    pub counts_by_layer: BTreeMap<String, usize>,
    /// Feature counts per feature-type tag.
    pub counts_by_kind: BTreeMap<String, usize>,
    /// Entities skipped or flagged during the run, with reasons.
    pub rejections: Vec<Rejection>,
    /// Bounding extent of native geometry, in drawing units.
    pub native_extent: Option<Extent>,
    /// Bounding extent of canonical geometry, in geographic degrees.
    pub canonical_extent: Option<Extent>,
}

/// Aggregate a feature set and the run's rejections into a report.
pub fn build_report(
    drawing_id: &str,
    features: &[CanonicalFeature],
    rejections: Vec<Rejection>,
) -> IngestReport {
    let mut counts_by_layer: BTreeMap<String, usize> = BTreeMap::new();
    let mut counts_by_kind: BTreeMap<String, usize> = BTreeMap::new();
    let mut native_extent: Option<Extent> = None;
    let mut canonical_extent: Option<Extent> = None;
    let mut features_without_canonical = 0;

    for feature in features {
        *counts_by_layer.entry(feature.layer.clone()).or_insert(0) += 1;
        *counts_by_kind
            .entry(feature.kind.as_str().to_string())
            .or_insert(0) += 1;

        if let Some(rect) = feature.native.bounding_rect() {
            match native_extent.as_mut() {
                Some(extent) => extent.expand(rect),
                None => native_extent = Some(Extent::from_rect(rect)),
            }
        }
        match feature.canonical.as_ref().and_then(|g| g.bounding_rect()) {
            Some(rect) => match canonical_extent.as_mut() {
                Some(extent) => extent.expand(rect),
                None => canonical_extent = Some(Extent::from_rect(rect)),
            },
            None => features_without_canonical += 1,
        }
    }

    IngestReport {
        drawing_id: drawing_id.to_string(),
        features_written: features.len(),
        features_without_canonical,
        counts_by_layer,
        counts_by_kind,
        rejections,
        native_extent,
        canonical_extent,
    }
}
