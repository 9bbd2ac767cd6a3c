//! Read side of the feature store: filtered queries, GeoJSON export, and
//! per-drawing statistics recomputed from persisted rows.

use std::collections::BTreeMap;

use geo_types::Geometry;
use geojson::{Feature, FeatureCollection};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use wkt::TryFromWkt;

use crate::error::{IngestError, Result};
use crate::model::{CanonicalFeature, FeatureKind};
use crate::report::{build_report, IngestReport};
use crate::store::mapper::get_drawing;

/// Filter for feature queries. Unset fields match everything; the bounding
/// box is tested against the canonical-CRS box columns, so it selects only
/// features that have canonical geometry.
#[derive(Debug, Clone, Default)]
pub struct FeatureFilter {
    pub project_id: Option<String>,
    pub drawing_id: Option<String>,
    pub layer: Option<String>,
    pub kind: Option<FeatureKind>,
    /// `(min_x, min_y, max_x, max_y)` in geographic degrees.
    pub bbox: Option<(f64, f64, f64, f64)>,
}

const SELECT_COLUMNS: &str = "SELECT id, drawing_id, project_id, source_entity_id, kind, layer,
            native_wkt, native_srid, canonical_wkt, attributes
     FROM canonical_features";

/// Query persisted features matching a filter, ordered by id.
pub fn query_features(conn: &Connection, filter: &FeatureFilter) -> Result<Vec<CanonicalFeature>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(project_id) = &filter.project_id {
        clauses.push("project_id = ?");
        params.push(Value::Text(project_id.clone()));
    }
    if let Some(drawing_id) = &filter.drawing_id {
        clauses.push("drawing_id = ?");
        params.push(Value::Text(drawing_id.clone()));
    }
    if let Some(layer) = &filter.layer {
        clauses.push("layer = ?");
        params.push(Value::Text(layer.clone()));
    }
    if let Some(kind) = filter.kind {
        clauses.push("kind = ?");
        params.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some((min_x, min_y, max_x, max_y)) = filter.bbox {
        // Box-intersects: the feature's box must not lie entirely outside.
        clauses.push("canon_min_x <= ? AND canon_max_x >= ?");
        params.push(Value::Real(max_x));
        params.push(Value::Real(min_x));
        clauses.push("canon_min_y <= ? AND canon_max_y >= ?");
        params.push(Value::Real(max_y));
        params.push(Value::Real(min_y));
    }

    let mut sql = SELECT_COLUMNS.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), row_to_feature)?;
    let mut features = Vec::new();
    for row in rows {
        features.push(decode_feature(row?)?);
    }
    Ok(features)
}

/// All features of one drawing, ordered by id.
pub fn features_for_drawing(conn: &Connection, drawing_id: &str) -> Result<Vec<CanonicalFeature>> {
    query_features(
        conn,
        &FeatureFilter {
            drawing_id: Some(drawing_id.to_string()),
            ..FeatureFilter::default()
        },
    )
}

/// Export matching features as a GeoJSON `FeatureCollection`.
///
/// Canonical geometry is preferred; features without it fall back to native
/// geometry (coordinates then carry drawing units, which the `native_srid`
/// property makes visible).
pub fn export_geojson(conn: &Connection, filter: &FeatureFilter) -> Result<FeatureCollection> {
    let features = query_features(conn, filter)?;
    let mut out = Vec::with_capacity(features.len());
    for feature in features {
        let geometry = feature.canonical.as_ref().unwrap_or(&feature.native);
        let mut properties = serde_json::Map::new();
        properties.insert("drawing_id".to_string(), feature.drawing_id.clone().into());
        properties.insert(
            "source_entity_id".to_string(),
            feature.source_entity_id.into(),
        );
        properties.insert("kind".to_string(), feature.kind.as_str().into());
        properties.insert("layer".to_string(), feature.layer.clone().into());
        properties.insert(
            "native_srid".to_string(),
            match feature.native_srid {
                Some(srid) => serde_json::Value::from(srid),
                None => serde_json::Value::Null,
            },
        );
        properties.insert(
            "has_canonical".to_string(),
            feature.canonical.is_some().into(),
        );
        for (key, value) in &feature.attributes {
            properties.insert(key.clone(), value.clone().into());
        }

        out.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
            id: feature
                .id
                .map(|id| geojson::feature::Id::Number(id.into())),
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(FeatureCollection {
        bbox: None,
        features: out,
        foreign_members: None,
    })
}

/// Recompute the ingestion report from persisted rows.
///
/// Rejections are not persisted, so the readback report carries counts and
/// extents only. For an unchanged feature set the result is identical on
/// every call.
pub fn drawing_stats(conn: &Connection, drawing_id: &str) -> Result<IngestReport> {
    let drawing = get_drawing(conn, drawing_id)?;
    let features = features_for_drawing(conn, &drawing.id)?;
    Ok(build_report(&drawing.id, &features, Vec::new()))
}

/// Raw row image, decoded into the model in a second step so WKT errors can
/// carry the row id.
struct FeatureRow {
    id: i64,
    drawing_id: String,
    project_id: String,
    source_entity_id: i64,
    kind: String,
    layer: String,
    native_wkt: String,
    native_srid: Option<u32>,
    canonical_wkt: Option<String>,
    attributes: String,
}

fn row_to_feature(row: &Row<'_>) -> rusqlite::Result<FeatureRow> {
    Ok(FeatureRow {
        id: row.get(0)?,
        drawing_id: row.get(1)?,
        project_id: row.get(2)?,
        source_entity_id: row.get(3)?,
        kind: row.get(4)?,
        layer: row.get(5)?,
        native_wkt: row.get(6)?,
        native_srid: row.get(7)?,
        canonical_wkt: row.get(8)?,
        attributes: row.get(9)?,
    })
}

fn decode_feature(row: FeatureRow) -> Result<CanonicalFeature> {
    let kind = FeatureKind::from_str_tag(&row.kind).ok_or_else(|| IngestError::StoredGeometry {
        id: row.id,
        message: format!("unknown feature kind '{}'", row.kind),
    })?;
    let native = parse_wkt(row.id, &row.native_wkt)?;
    let canonical = match &row.canonical_wkt {
        Some(wkt) => Some(parse_wkt(row.id, wkt)?),
        None => None,
    };
    let attributes: BTreeMap<String, String> = serde_json::from_str(&row.attributes)?;
    Ok(CanonicalFeature {
        id: Some(row.id),
        drawing_id: row.drawing_id,
        project_id: row.project_id,
        source_entity_id: row.source_entity_id,
        kind,
        layer: row.layer,
        native,
        native_srid: row.native_srid,
        canonical,
        attributes,
    })
}

fn parse_wkt(id: i64, wkt: &str) -> Result<Geometry<f64>> {
    Geometry::try_from_wkt_str(wkt).map_err(|e| IngestError::StoredGeometry {
        id,
        message: e.to_string(),
    })
}
