//! Transactional persistence of drawings and their features.
//!
//! One ingestion run writes exactly one transaction: the drawing row is
//! upserted, any features from a previous run of the same drawing are
//! deleted, and the new feature set is inserted. Re-ingesting a drawing is
//! therefore idempotent, and cancellation or failure mid-write leaves the
//! store exactly as it was.

use geo::BoundingRect;
use geo_types::Geometry;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use wkt::ToWkt;

use crate::config::{CancelToken, LinearUnit};
use crate::error::{IngestError, Result};
use crate::model::{CanonicalFeature, Drawing};

/// Persist a drawing and its full feature set in a single transaction.
///
/// Any features previously stored for the same drawing id are replaced.
/// Returns the number of feature rows written.
pub fn persist_drawing(
    conn: &mut Connection,
    drawing: &Drawing,
    features: &[CanonicalFeature],
    cancel: &CancelToken,
) -> Result<usize> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO drawings
             (id, project_id, source_file, native_unit, unit_to_meter,
              native_srid, is_georeferenced, anchor_x, anchor_y, anchor_z)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
             project_id = excluded.project_id,
             source_file = excluded.source_file,
             native_unit = excluded.native_unit,
             unit_to_meter = excluded.unit_to_meter,
             native_srid = excluded.native_srid,
             is_georeferenced = excluded.is_georeferenced,
             anchor_x = excluded.anchor_x,
             anchor_y = excluded.anchor_y,
             anchor_z = excluded.anchor_z",
        params![
            drawing.id,
            drawing.project_id,
            drawing.source_file,
            drawing.native_unit.to_string(),
            drawing.unit_to_meter,
            drawing.native_srid,
            drawing.is_georeferenced,
            drawing.anchor.map(|a| a[0]),
            drawing.anchor.map(|a| a[1]),
            drawing.anchor.map(|a| a[2]),
        ],
    )?;

    tx.execute(
        "DELETE FROM canonical_features WHERE drawing_id = ?1",
        params![drawing.id],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO canonical_features
                 (drawing_id, project_id, source_entity_id, kind, layer,
                  native_wkt, native_srid, canonical_wkt, attributes,
                  native_min_x, native_min_y, native_max_x, native_max_y,
                  canon_min_x, canon_min_y, canon_max_x, canon_max_y)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                     ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )?;

        for feature in features {
            if cancel.is_cancelled() {
                drop(stmt);
                tx.rollback()?;
                return Err(IngestError::Cancelled);
            }

            let native_bbox = bbox(&feature.native);
            let canon_bbox = feature.canonical.as_ref().and_then(bbox);
            let attributes = serde_json::to_string(&feature.attributes)?;

            stmt.execute(params![
                feature.drawing_id,
                feature.project_id,
                feature.source_entity_id,
                feature.kind.as_str(),
                feature.layer,
                feature.native.wkt_string(),
                feature.native_srid,
                feature.canonical.as_ref().map(|g| g.wkt_string()),
                attributes,
                native_bbox.map(|b| b.0),
                native_bbox.map(|b| b.1),
                native_bbox.map(|b| b.2),
                native_bbox.map(|b| b.3),
                canon_bbox.map(|b| b.0),
                canon_bbox.map(|b| b.1),
                canon_bbox.map(|b| b.2),
                canon_bbox.map(|b| b.3),
            ])?;
        }
    }

    tx.commit()?;
    debug!(
        drawing_id = %drawing.id,
        features = features.len(),
        "persisted drawing"
    );
    Ok(features.len())
}

/// Load a stored drawing by id.
pub fn get_drawing(conn: &Connection, drawing_id: &str) -> Result<Drawing> {
    conn.query_row(
        "SELECT id, project_id, source_file, native_unit, unit_to_meter,
                native_srid, is_georeferenced, anchor_x, anchor_y, anchor_z
         FROM drawings WHERE id = ?1",
        params![drawing_id],
        |row| {
            let unit_name: String = row.get(3)?;
            let anchor_x: Option<f64> = row.get(7)?;
            let anchor_y: Option<f64> = row.get(8)?;
            let anchor_z: Option<f64> = row.get(9)?;
            let anchor = match (anchor_x, anchor_y) {
                (Some(x), Some(y)) => Some([x, y, anchor_z.unwrap_or(0.0)]),
                _ => None,
            };
            Ok(Drawing {
                id: row.get(0)?,
                project_id: row.get(1)?,
                source_file: row.get(2)?,
                native_unit: LinearUnit::from_name(&unit_name).unwrap_or_default(),
                unit_to_meter: row.get(4)?,
                native_srid: row.get(5)?,
                is_georeferenced: row.get(6)?,
                anchor,
            })
        },
    )
    .optional()?
    .ok_or_else(|| IngestError::DrawingNotFound {
        id: drawing_id.to_string(),
    })
}

/// Delete a drawing; its features go with it via the cascade.
pub fn delete_drawing(conn: &Connection, drawing_id: &str) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM drawings WHERE id = ?1", params![drawing_id])?;
    Ok(deleted)
}

/// Delete every drawing in a project, cascading to their features.
pub fn delete_project(conn: &Connection, project_id: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM drawings WHERE project_id = ?1",
        params![project_id],
    )?;
    Ok(deleted)
}

fn bbox(geometry: &Geometry<f64>) -> Option<(f64, f64, f64, f64)> {
    geometry
        .bounding_rect()
        .map(|r| (r.min().x, r.min().y, r.max().x, r.max().y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureKind;
    use crate::store::schema::open_in_memory;
    use geo_types::{line_string, point};
    use std::collections::BTreeMap;

    fn sample_drawing() -> Drawing {
        let mut drawing = Drawing::new("dwg-1", "proj-1", LinearUnit::Feet, Some(32633));
        drawing.source_file = Some("site.dxf".to_string());
        drawing
    }

    fn sample_feature(source_id: i64) -> CanonicalFeature {
        CanonicalFeature {
            id: None,
            drawing_id: "dwg-1".to_string(),
            project_id: "proj-1".to_string(),
            source_entity_id: source_id,
            kind: FeatureKind::Line,
            layer: "WALLS".to_string(),
            native: Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 5.0)]),
            native_srid: Some(32633),
            canonical: None,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_persist_and_get_drawing() {
        let mut conn = open_in_memory().unwrap();
        let drawing = sample_drawing();
        let written = persist_drawing(
            &mut conn,
            &drawing,
            &[sample_feature(0), sample_feature(1)],
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(written, 2);

        let loaded = get_drawing(&conn, "dwg-1").unwrap();
        assert_eq!(loaded.id, "dwg-1");
        assert_eq!(loaded.native_unit, LinearUnit::Feet);
        assert_eq!(loaded.native_srid, Some(32633));
        assert!(loaded.is_georeferenced);
    }

    #[test]
    fn test_reingest_replaces_features() {
        let mut conn = open_in_memory().unwrap();
        let drawing = sample_drawing();
        let cancel = CancelToken::new();
        persist_drawing(
            &mut conn,
            &drawing,
            &[sample_feature(0), sample_feature(1), sample_feature(2)],
            &cancel,
        )
        .unwrap();
        persist_drawing(&mut conn, &drawing, &[sample_feature(0)], &cancel).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM canonical_features WHERE drawing_id = 'dwg-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_cancelled_persist_writes_nothing() {
        let mut conn = open_in_memory().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = persist_drawing(&mut conn, &sample_drawing(), &[sample_feature(0)], &cancel);
        assert!(matches!(result, Err(IngestError::Cancelled)));

        let drawings: i64 = conn
            .query_row("SELECT count(*) FROM drawings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(drawings, 0);
    }

    #[test]
    fn test_delete_drawing_cascades() {
        let mut conn = open_in_memory().unwrap();
        persist_drawing(
            &mut conn,
            &sample_drawing(),
            &[sample_feature(0)],
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(delete_drawing(&conn, "dwg-1").unwrap(), 1);
        let features: i64 = conn
            .query_row("SELECT count(*) FROM canonical_features", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(features, 0);
    }

    #[test]
    fn test_delete_project_cascades_through_all_drawings() {
        let mut conn = open_in_memory().unwrap();
        let cancel = CancelToken::new();
        persist_drawing(&mut conn, &sample_drawing(), &[sample_feature(0)], &cancel).unwrap();

        let second = Drawing::new("dwg-2", "proj-1", LinearUnit::Meters, None);
        let mut feature = sample_feature(0);
        feature.drawing_id = "dwg-2".to_string();
        persist_drawing(&mut conn, &second, &[feature], &cancel).unwrap();

        assert_eq!(delete_project(&conn, "proj-1").unwrap(), 2);
        let drawings: i64 = conn
            .query_row("SELECT count(*) FROM drawings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(drawings, 0);
        let features: i64 = conn
            .query_row("SELECT count(*) FROM canonical_features", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(features, 0);
    }

    #[test]
    fn test_get_missing_drawing_is_not_found() {
        let conn = open_in_memory().unwrap();
        assert!(matches!(
            get_drawing(&conn, "nope"),
            Err(IngestError::DrawingNotFound { .. })
        ));
    }

    #[test]
    fn test_bbox_columns_written() {
        let mut conn = open_in_memory().unwrap();
        let mut feature = sample_feature(0);
        feature.native = Geometry::Point(point!(x: 3.0, y: 4.0));
        persist_drawing(
            &mut conn,
            &sample_drawing(),
            &[feature],
            &CancelToken::new(),
        )
        .unwrap();

        let (min_x, max_y): (f64, f64) = conn
            .query_row(
                "SELECT native_min_x, native_max_y FROM canonical_features",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(min_x, 3.0);
        assert_eq!(max_y, 4.0);
    }
}
