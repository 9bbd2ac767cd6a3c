//! End-to-end ingestion tests: DXF document in, queryable features out.

use std::fs;

use cadgis_core::{
    drawing_stats, export_geojson, features_for_drawing, get_drawing, ingest_dxf_drawing,
    ingest_dxf_file, open_in_memory, reproject_drawing, CancelToken, FeatureFilter, FeatureKind,
    IngestError, IngestOptions, LinearUnit, RejectReason, Reprojector,
};
use dxf::entities::{Entity, EntityType, Insert, Line, LwPolyline};
use dxf::enums::Units;
use dxf::{Block, Drawing as DxfDrawing, LwPolylineVertex, Point};
use geo_types::Geometry;
use pretty_assertions::assert_eq;

// ==== helpers ====

fn line_entity(x1: f64, y1: f64, x2: f64, y2: f64, layer: &str) -> Entity {
    let mut entity = Entity::new(EntityType::Line(Line::new(
        Point::new(x1, y1, 0.0),
        Point::new(x2, y2, 0.0),
    )));
    entity.common.layer = layer.to_string();
    entity
}

fn options(drawing_id: &str) -> IngestOptions {
    IngestOptions::new(drawing_id, "test-project")
}

// ==== unit and CRS resolution ====

#[test]
fn test_feet_drawing_keeps_raw_units_and_records_factor() {
    let mut doc = DxfDrawing::new();
    doc.header.default_drawing_units = Units::Feet;
    doc.add_entity(line_entity(0.0, 0.0, 100.0, 0.0, "WALLS"));

    let mut conn = open_in_memory().unwrap();
    let report =
        ingest_dxf_drawing(&mut conn, &doc, &options("feet-dwg"), &CancelToken::new()).unwrap();

    assert_eq!(report.features_written, 1);
    assert_eq!(report.features_without_canonical, 1);

    let drawing = get_drawing(&conn, "feet-dwg").unwrap();
    assert_eq!(drawing.native_unit, LinearUnit::Feet);
    assert_eq!(drawing.unit_to_meter, 0.3048);
    assert_eq!(drawing.native_srid, None);
    assert!(!drawing.is_georeferenced);

    // Native geometry stays in raw drawing units; the factor lives on the
    // drawing record.
    let features = features_for_drawing(&conn, "feet-dwg").unwrap();
    match &features[0].native {
        Geometry::LineString(ls) => {
            assert_eq!(ls.0[1].x, 100.0);
        }
        other => panic!("expected LineString, got {:?}", other),
    }
    assert_eq!(features[0].canonical, None);
}

#[test]
fn test_ingest_from_file_records_source_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.dxf");
    // Minimal ASCII DXF: $INSUNITS = 2 (feet) and a single LINE.
    let content = "0\nSECTION\n2\nHEADER\n9\n$INSUNITS\n70\n2\n0\nENDSEC\n\
                   0\nSECTION\n2\nENTITIES\n0\nLINE\n8\nWALLS\n\
                   10\n0.0\n20\n0.0\n11\n100.0\n21\n0.0\n0\nENDSEC\n0\nEOF\n";
    fs::write(&path, content).unwrap();

    let mut conn = open_in_memory().unwrap();
    let report =
        ingest_dxf_file(&mut conn, &path, &options("file-dwg"), &CancelToken::new()).unwrap();
    assert_eq!(report.features_written, 1);

    let drawing = get_drawing(&conn, "file-dwg").unwrap();
    assert_eq!(drawing.source_file.as_deref(), Some("plan.dxf"));
    assert_eq!(drawing.native_unit, LinearUnit::Feet);
}

#[test]
fn test_missing_file_is_reported() {
    let mut conn = open_in_memory().unwrap();
    let result = ingest_dxf_file(
        &mut conn,
        std::path::Path::new("/nonexistent/plan.dxf"),
        &options("dwg"),
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(IngestError::FileNotFound { .. })));
}

// ==== geometry construction ====

#[test]
fn test_coincident_endpoints_close_a_polyline() {
    let mut poly = LwPolyline::default();
    for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)] {
        poly.vertices.push(LwPolylineVertex {
            x,
            y,
            ..Default::default()
        });
    }
    // Closed flag deliberately left unset.
    let mut doc = DxfDrawing::new();
    doc.add_entity(Entity::new(EntityType::LwPolyline(poly)));

    let mut conn = open_in_memory().unwrap();
    ingest_dxf_drawing(&mut conn, &doc, &options("dwg"), &CancelToken::new()).unwrap();

    let features = features_for_drawing(&conn, "dwg").unwrap();
    assert_eq!(features[0].kind, FeatureKind::Polygon);
    match &features[0].native {
        Geometry::Polygon(polygon) => {
            // 4 distinct vertices plus the closing repeat.
            assert_eq!(polygon.exterior().0.len(), 5);
        }
        other => panic!("expected Polygon, got {:?}", other),
    }
}

#[test]
fn test_block_insert_transform_applies_to_features() {
    let mut doc = DxfDrawing::new();

    let mut block = Block::default();
    block.name = "SQ".to_string();
    let mut square = LwPolyline::default();
    for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        square.vertices.push(LwPolylineVertex {
            x,
            y,
            ..Default::default()
        });
    }
    square.set_is_closed(true);
    block
        .entities
        .push(Entity::new(EntityType::LwPolyline(square)));
    doc.add_block(block);

    let mut insert = Insert::default();
    insert.name = "SQ".to_string();
    insert.location = Point::new(100.0, 100.0, 0.0);
    insert.rotation = 90.0;
    insert.x_scale_factor = 2.0;
    insert.y_scale_factor = 2.0;
    doc.add_entity(Entity::new(EntityType::Insert(insert)));

    let mut conn = open_in_memory().unwrap();
    let report = ingest_dxf_drawing(&mut conn, &doc, &options("dwg"), &CancelToken::new()).unwrap();
    assert_eq!(report.features_written, 1);
    assert!(report.rejections.is_empty());

    let features = features_for_drawing(&conn, "dwg").unwrap();
    assert_eq!(features[0].kind, FeatureKind::Polygon);
    assert_eq!(features[0].attributes["block"], "SQ");
    let extent = report.native_extent.unwrap();
    assert!((extent.min_x - 98.0).abs() < 1e-9);
    assert!((extent.min_y - 100.0).abs() < 1e-9);
    assert!((extent.max_x - 100.0).abs() < 1e-9);
    assert!((extent.max_y - 102.0).abs() < 1e-9);
}

#[test]
fn test_unsupported_entities_are_counted_not_fatal() {
    let mut doc = DxfDrawing::new();
    doc.add_entity(Entity::new(EntityType::Spline(Default::default())));
    doc.add_entity(line_entity(0.0, 0.0, 1.0, 1.0, "0"));

    let mut conn = open_in_memory().unwrap();
    let report = ingest_dxf_drawing(&mut conn, &doc, &options("dwg"), &CancelToken::new()).unwrap();
    assert_eq!(report.features_written, 1);
    assert_eq!(report.rejections.len(), 1);
    assert!(matches!(
        report.rejections[0].reason,
        RejectReason::UnsupportedEntity { .. }
    ));
}

// ==== reprojection ====

#[test]
fn test_georeferenced_ingest_produces_canonical_geometry() {
    let mut doc = DxfDrawing::new();
    doc.header.default_drawing_units = Units::Meters;
    doc.add_entity(line_entity(500_000.0, 0.0, 500_100.0, 0.0, "ROAD"));

    let mut opts = options("utm-dwg");
    opts.srid_override = Some(32633);

    let mut conn = open_in_memory().unwrap();
    let report = ingest_dxf_drawing(&mut conn, &doc, &opts, &CancelToken::new()).unwrap();
    assert_eq!(report.features_written, 1);
    assert_eq!(report.features_without_canonical, 0);

    let features = features_for_drawing(&conn, "utm-dwg").unwrap();
    let canonical = features[0].canonical.as_ref().unwrap();
    match canonical {
        Geometry::LineString(ls) => {
            // (500000, 0) in UTM 33N is the central meridian at the equator.
            assert!((ls.0[0].x - 15.0).abs() < 1e-6, "lon {}", ls.0[0].x);
            assert!(ls.0[0].y.abs() < 1e-6, "lat {}", ls.0[0].y);

            // The reverse transform approximately recovers the native
            // coordinates.
            let rp = Reprojector::for_srid(32633).unwrap();
            let (x, y) = rp.point_to_native(ls.0[1].x, ls.0[1].y).unwrap();
            assert!((x - 500_100.0).abs() < 1e-3);
            assert!(y.abs() < 1e-3);
        }
        other => panic!("expected LineString, got {:?}", other),
    }

    let extent = report.canonical_extent.unwrap();
    assert!(extent.min_x >= -180.0 && extent.max_x <= 180.0);
    assert!(extent.min_y >= -90.0 && extent.max_y <= 90.0);
}

#[test]
fn test_unregistered_srid_keeps_native_only() {
    let mut doc = DxfDrawing::new();
    doc.add_entity(line_entity(0.0, 0.0, 1.0, 0.0, "0"));

    let mut opts = options("dwg");
    opts.srid_override = Some(99_999);

    let mut conn = open_in_memory().unwrap();
    let report = ingest_dxf_drawing(&mut conn, &doc, &opts, &CancelToken::new()).unwrap();
    assert_eq!(report.features_written, 1);
    assert!(report
        .rejections
        .iter()
        .any(|r| matches!(r.reason, RejectReason::UnregisteredSrid { srid: 99_999 })));

    let features = features_for_drawing(&conn, "dwg").unwrap();
    assert_eq!(features[0].canonical, None);
    assert_eq!(features[0].native_srid, Some(99_999));
}

#[test]
fn test_reproject_after_import_fills_canonical() {
    // First import: CRS unknown, native geometry only.
    let mut doc = DxfDrawing::new();
    doc.header.default_drawing_units = Units::Meters;
    doc.add_entity(line_entity(500_000.0, 0.0, 500_100.0, 0.0, "ROAD"));

    let mut conn = open_in_memory().unwrap();
    let cancel = CancelToken::new();
    ingest_dxf_drawing(&mut conn, &doc, &options("late-dwg"), &cancel).unwrap();
    assert!(!get_drawing(&conn, "late-dwg").unwrap().is_georeferenced);

    // Georeferencing metadata arrives later.
    let outcome = reproject_drawing(&mut conn, "late-dwg", 32633, &cancel).unwrap();
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.failures, 0);

    let drawing = get_drawing(&conn, "late-dwg").unwrap();
    assert!(drawing.is_georeferenced);
    assert_eq!(drawing.native_srid, Some(32633));

    let features = features_for_drawing(&conn, "late-dwg").unwrap();
    match features[0].canonical.as_ref().unwrap() {
        Geometry::LineString(ls) => {
            assert!((ls.0[0].x - 15.0).abs() < 1e-6);
        }
        other => panic!("expected LineString, got {:?}", other),
    }
}

#[test]
fn test_reproject_unknown_drawing_or_srid_fails_cleanly() {
    let mut conn = open_in_memory().unwrap();
    let cancel = CancelToken::new();
    assert!(matches!(
        reproject_drawing(&mut conn, "ghost", 32633, &cancel),
        Err(IngestError::DrawingNotFound { .. })
    ));

    let mut doc = DxfDrawing::new();
    doc.add_entity(line_entity(0.0, 0.0, 1.0, 0.0, "0"));
    ingest_dxf_drawing(&mut conn, &doc, &options("dwg"), &cancel).unwrap();
    assert!(matches!(
        reproject_drawing(&mut conn, "dwg", 99_999, &cancel),
        Err(IngestError::UnknownSrid { srid: 99_999 })
    ));
}

// ==== transactional behavior ====

#[test]
fn test_reingestion_is_idempotent() {
    let mut doc = DxfDrawing::new();
    doc.add_entity(line_entity(0.0, 0.0, 1.0, 0.0, "A"));
    doc.add_entity(line_entity(0.0, 1.0, 1.0, 1.0, "B"));

    let mut conn = open_in_memory().unwrap();
    let cancel = CancelToken::new();
    ingest_dxf_drawing(&mut conn, &doc, &options("dwg"), &cancel).unwrap();
    ingest_dxf_drawing(&mut conn, &doc, &options("dwg"), &cancel).unwrap();

    let features = features_for_drawing(&conn, "dwg").unwrap();
    assert_eq!(features.len(), 2);

    let first = serde_json::to_string(&drawing_stats(&conn, "dwg").unwrap()).unwrap();
    ingest_dxf_drawing(&mut conn, &doc, &options("dwg"), &cancel).unwrap();
    let second = serde_json::to_string(&drawing_stats(&conn, "dwg").unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_cancelled_ingestion_leaves_store_untouched() {
    let mut doc = DxfDrawing::new();
    doc.add_entity(line_entity(0.0, 0.0, 1.0, 0.0, "A"));

    let mut conn = open_in_memory().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = ingest_dxf_drawing(&mut conn, &doc, &options("dwg"), &cancel);
    assert!(matches!(result, Err(IngestError::Cancelled)));
    assert!(matches!(
        get_drawing(&conn, "dwg"),
        Err(IngestError::DrawingNotFound { .. })
    ));
}

// ==== export ====

#[test]
fn test_geojson_export_of_georeferenced_drawing() {
    let mut doc = DxfDrawing::new();
    doc.header.default_drawing_units = Units::Meters;
    doc.add_entity(line_entity(500_000.0, 0.0, 500_100.0, 0.0, "ROAD"));

    let mut opts = options("utm-dwg");
    opts.srid_override = Some(32633);

    let mut conn = open_in_memory().unwrap();
    ingest_dxf_drawing(&mut conn, &doc, &opts, &CancelToken::new()).unwrap();

    let collection = export_geojson(
        &conn,
        &FeatureFilter {
            project_id: Some("test-project".to_string()),
            ..FeatureFilter::default()
        },
    )
    .unwrap();
    assert_eq!(collection.features.len(), 1);

    let feature = &collection.features[0];
    let properties = feature.properties.as_ref().unwrap();
    assert_eq!(properties["layer"], "ROAD");
    assert_eq!(properties["has_canonical"], true);
    match feature.geometry.as_ref().map(|g| &g.value) {
        Some(geojson::Value::LineString(coords)) => {
            assert!((coords[0][0] - 15.0).abs() < 1e-6);
        }
        other => panic!("expected LineString, got {:?}", other),
    }
}
