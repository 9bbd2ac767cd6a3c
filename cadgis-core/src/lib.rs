//! cadgis-core - CAD-to-GIS ingestion and coordinate normalization.
//!
//! This library ingests CAD drawings (DXF), extracts their entities into
//! normalized geographic features, reprojects them into a canonical exchange
//! CRS (EPSG:4326), and persists them in a queryable feature store.
//!
//! # Example
//!
//! ```no_run
//! use cadgis_core::{ingest_dxf_file, open_store, CancelToken, IngestOptions};
//! use std::path::Path;
//!
//! let mut conn = open_store(Path::new("features.db")).unwrap();
//! let mut options = IngestOptions::new("site-plan-01", "harbor-project");
//! options.srid_override = Some(32633);
//! let report = ingest_dxf_file(
//!     &mut conn,
//!     Path::new("site-plan.dxf"),
//!     &options,
//!     &CancelToken::new(),
//! )
//! .unwrap();
//! println!("{} features written", report.features_written);
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod report;
pub mod store;
pub mod transform;

// Re-exports for convenience
pub use config::{CancelToken, IngestOptions, LinearUnit, ProjectDefaults};
pub use error::{IngestError, RejectReason, Rejection, Result};
pub use model::{CanonicalFeature, Drawing, FeatureKind};
pub use report::{build_report, IngestReport};
pub use store::{
    delete_drawing, delete_project, drawing_stats, export_geojson, features_for_drawing,
    get_drawing, open_in_memory, open_store, persist_drawing, query_features, FeatureFilter,
};
pub use transform::Reprojector;

use std::path::Path;

use geo::BoundingRect;
use rusqlite::{params, Connection};
use tracing::{info, warn};

/// Ingest a DXF file into the feature store.
///
/// Runs the full pipeline: unit/CRS resolution, entity extraction, geometry
/// construction, reprojection, and transactional persistence. The returned
/// report lists everything that was written and everything that was skipped,
/// with reasons.
pub fn ingest_dxf_file(
    conn: &mut Connection,
    path: &Path,
    options: &IngestOptions,
    cancel: &CancelToken,
) -> Result<IngestReport> {
    if !path.exists() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let doc = dxf::Drawing::load_file(&*path.to_string_lossy())?;
    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    run_ingest(conn, &doc, options, cancel, source_file)
}

/// Ingest an already-parsed DXF document into the feature store.
pub fn ingest_dxf_drawing(
    conn: &mut Connection,
    doc: &dxf::Drawing,
    options: &IngestOptions,
    cancel: &CancelToken,
) -> Result<IngestReport> {
    run_ingest(conn, doc, options, cancel, None)
}

fn run_ingest(
    conn: &mut Connection,
    doc: &dxf::Drawing,
    options: &IngestOptions,
    cancel: &CancelToken,
    source_file: Option<String>,
) -> Result<IngestReport> {
    let resolution = extract::resolve_units_and_crs(&doc.header, options);
    info!(
        drawing_id = %options.drawing_id,
        unit = %resolution.unit,
        srid = ?resolution.srid,
        "starting ingestion"
    );

    let mut drawing = Drawing::new(
        &options.drawing_id,
        &options.project_id,
        resolution.unit,
        resolution.srid,
    );
    drawing.source_file = source_file;
    drawing.anchor = options.anchor;

    let outcome = extract::extract_entities(doc, cancel)?;
    let mut rejections = outcome.rejections;

    // A declared SRID outside the projection registry is reported once at
    // drawing level; every feature then keeps native geometry only.
    let reprojector = match resolution.srid {
        Some(srid) => match Reprojector::for_srid(srid) {
            Ok(rp) => Some(rp),
            Err(IngestError::UnknownSrid { srid }) => {
                warn!(srid, "no projection registered, canonical geometry omitted");
                rejections.push(Rejection::drawing(RejectReason::UnregisteredSrid { srid }));
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    let mut features = Vec::with_capacity(outcome.records.len());
    for record in &outcome.records {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let built = match transform::build_native_geometry(record, options.anchor) {
            Ok(built) => built,
            Err(reason) => {
                rejections.push(Rejection::entity(record.source_id, &record.layer, reason));
                continue;
            }
        };

        let canonical = match &reprojector {
            Some(rp) => match rp.to_canonical(&built.geometry) {
                Ok(geometry) => Some(geometry),
                Err(reason) => {
                    rejections.push(Rejection::entity(record.source_id, &record.layer, reason));
                    None
                }
            },
            None => None,
        };

        features.push(CanonicalFeature {
            id: None,
            drawing_id: drawing.id.clone(),
            project_id: drawing.project_id.clone(),
            source_entity_id: record.source_id,
            kind: built.kind,
            layer: record.layer.clone(),
            native: built.geometry,
            native_srid: resolution.srid,
            canonical,
            attributes: record.attributes.clone(),
        });
    }

    persist_drawing(conn, &drawing, &features, cancel)?;

    let report = build_report(&drawing.id, &features, rejections);
    info!(
        drawing_id = %drawing.id,
        features = report.features_written,
        rejected = report.rejections.len(),
        "ingestion complete"
    );
    Ok(report)
}

/// Result of a [`reproject_drawing`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReprojectOutcome {
    /// Features whose canonical geometry was recomputed.
    pub updated: usize,
    /// Features whose coordinates fell outside the transform's domain;
    /// their canonical geometry is now absent.
    pub failures: usize,
}

/// Assign (or correct) the native SRID of a stored drawing and recompute
/// canonical geometry for all its features from the persisted native
/// geometry, in one transaction.
///
/// Used when georeferencing metadata arrives after the initial import, the
/// case where a drawing was first ingested with no CRS and its features
/// carry native geometry only.
pub fn reproject_drawing(
    conn: &mut Connection,
    drawing_id: &str,
    srid: u32,
    cancel: &CancelToken,
) -> Result<ReprojectOutcome> {
    // Fails before touching anything when the drawing or projection is
    // unknown.
    let drawing = get_drawing(conn, drawing_id)?;
    let reprojector = Reprojector::for_srid(srid)?;
    let features = features_for_drawing(conn, &drawing.id)?;

    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE drawings SET native_srid = ?1, is_georeferenced = 1 WHERE id = ?2",
        params![srid, drawing.id],
    )?;

    let mut updated = 0;
    let mut failures = 0;
    for feature in &features {
        if cancel.is_cancelled() {
            tx.rollback()?;
            return Err(IngestError::Cancelled);
        }
        // Persisted features always carry a store id.
        let feature_id = feature.id.ok_or(IngestError::StoredGeometry {
            id: -1,
            message: "feature row without id".to_string(),
        })?;

        match reprojector.to_canonical(&feature.native) {
            Ok(canonical) => {
                use wkt::ToWkt;
                let bbox = canonical.bounding_rect();
                tx.execute(
                    "UPDATE canonical_features
                     SET native_srid = ?1, canonical_wkt = ?2,
                         canon_min_x = ?3, canon_min_y = ?4,
                         canon_max_x = ?5, canon_max_y = ?6
                     WHERE id = ?7",
                    params![
                        srid,
                        canonical.wkt_string(),
                        bbox.map(|r| r.min().x),
                        bbox.map(|r| r.min().y),
                        bbox.map(|r| r.max().x),
                        bbox.map(|r| r.max().y),
                        feature_id,
                    ],
                )?;
                updated += 1;
            }
            Err(reason) => {
                warn!(feature_id, %reason, "reprojection failed, canonical geometry cleared");
                tx.execute(
                    "UPDATE canonical_features
                     SET native_srid = ?1, canonical_wkt = NULL,
                         canon_min_x = NULL, canon_min_y = NULL,
                         canon_max_x = NULL, canon_max_y = NULL
                     WHERE id = ?2",
                    params![srid, feature_id],
                )?;
                failures += 1;
            }
        }
    }

    tx.commit()?;
    info!(drawing_id, srid, updated, failures, "reprojection pass complete");
    Ok(ReprojectOutcome { updated, failures })
}
