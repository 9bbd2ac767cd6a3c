//! Entity extraction: walks a parsed DXF document and yields raw geometry
//! records in absolute native drawing space.
//!
//! The `dxf` crate's loosely-typed entity enum is converted into the closed
//! [`RawShape`] vocabulary right here at the boundary; nothing downstream
//! branches on library types. Block inserts are resolved recursively with
//! transforms composed innermost-first, guarded against self-referential
//! definitions.

use std::collections::{BTreeMap, HashMap};

use dxf::entities::{Entity, EntityType};
use dxf::{Block, Drawing as DxfDrawing};

use crate::config::{CancelToken, MAX_INSERT_DEPTH};
use crate::error::{IngestError, RejectReason, Rejection, Result};
use crate::transform::arcs;

use super::blocks::Affine2;

/// One polyline vertex with its bulge (arc factor to the next vertex).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyVertex {
    pub x: f64,
    pub y: f64,
    pub bulge: f64,
}

impl PolyVertex {
    fn flat(x: f64, y: f64) -> Self {
        Self { x, y, bulge: 0.0 }
    }
}

/// Raw geometry in absolute native drawing space. A closed, finite set: the
/// rest of the pipeline pattern-matches over these variants only.
#[derive(Debug, Clone, PartialEq)]
pub enum RawShape {
    /// Point entity.
    Point { x: f64, y: f64 },
    /// Two-point line segment.
    Segment { x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Polyline; `closed_flag` carries the source's explicit closed flag
    /// (the closure tie-break also considers coincident endpoints).
    Polyline {
        vertices: Vec<PolyVertex>,
        closed_flag: bool,
    },
    /// Circular arc, counter-clockwise from `start_deg` to `end_deg`.
    Arc {
        cx: f64,
        cy: f64,
        radius: f64,
        start_deg: f64,
        end_deg: f64,
    },
    /// Full circle.
    Circle { cx: f64, cy: f64, radius: f64 },
    /// Text or annotation; geometry is the insertion point.
    Annotation { x: f64, y: f64, text: String },
}

/// One extracted entity record: raw shape plus provenance and attributes.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Extraction-order id within the drawing. Entities expanded out of a
    /// block insert share the id of their insert.
    pub source_id: i64,
    /// Source layer name.
    pub layer: String,
    /// Entity-specific attributes (text content, block name, ...).
    pub attributes: BTreeMap<String, String>,
    /// The shape, already in absolute native drawing space.
    pub shape: RawShape,
}

/// Result of one extraction pass: records plus per-entity rejections.
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub records: Vec<RawRecord>,
    pub rejections: Vec<Rejection>,
}

/// Extract all supported entities from a parsed drawing. One pass, finite;
/// partial-failure tolerant: unsupported entities are counted and skipped.
pub fn extract_entities(doc: &DxfDrawing, cancel: &CancelToken) -> Result<ExtractOutcome> {
    let blocks: HashMap<String, &Block> = doc
        .blocks()
        .map(|b| (b.name.to_uppercase(), b))
        .collect();

    let mut out = ExtractOutcome::default();
    let mut source_id: i64 = 0;

    for entity in doc.entities() {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        source_id += 1;
        let mut visiting = Vec::new();
        convert_entity(
            entity,
            source_id,
            &Affine2::IDENTITY,
            &blocks,
            &mut visiting,
            &mut out,
        );
    }

    Ok(out)
}

/// Convert one entity, recursing through inserts. Pushes records and
/// rejections onto `out`.
fn convert_entity(
    entity: &Entity,
    source_id: i64,
    tf: &Affine2,
    blocks: &HashMap<String, &Block>,
    visiting: &mut Vec<String>,
    out: &mut ExtractOutcome,
) {
    let layer = entity.common.layer.clone();
    let mut attributes = BTreeMap::new();
    if let Some(block) = visiting.last() {
        attributes.insert("block".to_string(), block.clone());
    }

    let shape = match &entity.specific {
        EntityType::Line(line) => {
            let (x1, y1) = tf.apply(line.p1.x, line.p1.y);
            let (x2, y2) = tf.apply(line.p2.x, line.p2.y);
            Some(RawShape::Segment { x1, y1, x2, y2 })
        }
        EntityType::ModelPoint(point) => {
            let (x, y) = tf.apply(point.location.x, point.location.y);
            Some(RawShape::Point { x, y })
        }
        EntityType::Circle(circle) => {
            transformed_circle(tf, circle.center.x, circle.center.y, circle.radius)
        }
        EntityType::Arc(arc) => transformed_arc(
            tf,
            arc.center.x,
            arc.center.y,
            arc.radius,
            arc.start_angle,
            arc.end_angle,
        ),
        EntityType::LwPolyline(poly) => {
            let vertices: Vec<PolyVertex> = poly
                .vertices
                .iter()
                .map(|v| PolyVertex {
                    x: v.x,
                    y: v.y,
                    bulge: v.bulge,
                })
                .collect();
            Some(transformed_polyline(tf, vertices, poly.is_closed()))
        }
        EntityType::Polyline(poly) => {
            let vertices: Vec<PolyVertex> = poly
                .vertices()
                .map(|v| PolyVertex {
                    x: v.location.x,
                    y: v.location.y,
                    bulge: v.bulge,
                })
                .collect();
            Some(transformed_polyline(tf, vertices, poly.is_closed()))
        }
        EntityType::Text(text) => {
            let (x, y) = tf.apply(text.location.x, text.location.y);
            attributes.insert("text".to_string(), text.value.clone());
            Some(RawShape::Annotation {
                x,
                y,
                text: text.value.clone(),
            })
        }
        EntityType::MText(mtext) => {
            let (x, y) = tf.apply(mtext.insertion_point.x, mtext.insertion_point.y);
            attributes.insert("text".to_string(), mtext.text.clone());
            Some(RawShape::Annotation {
                x,
                y,
                text: mtext.text.clone(),
            })
        }
        EntityType::Insert(insert) => {
            resolve_insert(insert, source_id, &layer, tf, blocks, visiting, out);
            None
        }
        other => {
            out.rejections.push(Rejection::entity(
                source_id,
                layer.clone(),
                RejectReason::UnsupportedEntity {
                    entity: entity_type_name(other),
                },
            ));
            None
        }
    };

    if let Some(shape) = shape {
        out.records.push(RawRecord {
            source_id,
            layer,
            attributes,
            shape,
        });
    }
}

/// Resolve a block insert into absolute-space records.
fn resolve_insert(
    insert: &dxf::entities::Insert,
    source_id: i64,
    layer: &str,
    tf: &Affine2,
    blocks: &HashMap<String, &Block>,
    visiting: &mut Vec<String>,
    out: &mut ExtractOutcome,
) {
    let key = insert.name.to_uppercase();

    if visiting.iter().any(|name| name == &key) {
        out.rejections.push(Rejection::entity(
            source_id,
            layer,
            RejectReason::BlockCycle {
                block: insert.name.clone(),
            },
        ));
        return;
    }
    if visiting.len() >= MAX_INSERT_DEPTH {
        out.rejections.push(Rejection::entity(
            source_id,
            layer,
            RejectReason::InsertTooDeep {
                depth: MAX_INSERT_DEPTH,
            },
        ));
        return;
    }

    let block = match blocks.get(&key) {
        Some(block) => *block,
        None => {
            out.rejections.push(Rejection::entity(
                source_id,
                layer,
                RejectReason::MissingBlock {
                    block: insert.name.clone(),
                },
            ));
            return;
        }
    };

    let local = Affine2::from_insert(
        (insert.location.x, insert.location.y),
        insert.rotation,
        insert.x_scale_factor,
        insert.y_scale_factor,
        (block.base_point.x, block.base_point.y),
    );
    // Outer transform applies after this insert's own placement.
    let composed = tf.compose(&local);

    visiting.push(key);
    for entity in &block.entities {
        convert_entity(entity, source_id, &composed, blocks, visiting, out);
    }
    visiting.pop();
}

/// Circle under a transform: exact under a similarity, tessellated otherwise.
fn transformed_circle(tf: &Affine2, cx: f64, cy: f64, radius: f64) -> Option<RawShape> {
    if tf.is_similarity() {
        let (cx, cy) = tf.apply(cx, cy);
        Some(RawShape::Circle {
            cx,
            cy,
            radius: radius * tf.uniform_scale(),
        })
    } else {
        let vertices = arcs::circle_ring(cx, cy, radius)
            .into_iter()
            .map(|(x, y)| {
                let (x, y) = tf.apply(x, y);
                PolyVertex::flat(x, y)
            })
            .collect();
        Some(RawShape::Polyline {
            vertices,
            closed_flag: true,
        })
    }
}

/// Arc under a transform: exact under a similarity (angles shifted by the
/// rotation), tessellated otherwise.
fn transformed_arc(
    tf: &Affine2,
    cx: f64,
    cy: f64,
    radius: f64,
    start_deg: f64,
    end_deg: f64,
) -> Option<RawShape> {
    if tf.is_similarity() {
        let (cx, cy) = tf.apply(cx, cy);
        let rot = tf.rotation_deg();
        Some(RawShape::Arc {
            cx,
            cy,
            radius: radius * tf.uniform_scale(),
            start_deg: start_deg + rot,
            end_deg: end_deg + rot,
        })
    } else {
        let sweep = arcs::arc_sweep_rad(start_deg, end_deg);
        let vertices = arcs::sample_arc(cx, cy, radius, start_deg.to_radians(), sweep)
            .into_iter()
            .map(|(x, y)| {
                let (x, y) = tf.apply(x, y);
                PolyVertex::flat(x, y)
            })
            .collect();
        Some(RawShape::Polyline {
            vertices,
            closed_flag: false,
        })
    }
}

/// Polyline under a transform. Bulges are invariant under a similarity;
/// under anything else they are flattened to chords before transforming.
fn transformed_polyline(tf: &Affine2, vertices: Vec<PolyVertex>, closed_flag: bool) -> RawShape {
    if tf.is_similarity() {
        let vertices = vertices
            .into_iter()
            .map(|v| {
                let (x, y) = tf.apply(v.x, v.y);
                PolyVertex {
                    x,
                    y,
                    bulge: v.bulge,
                }
            })
            .collect();
        return RawShape::Polyline {
            vertices,
            closed_flag,
        };
    }

    let mut flat: Vec<PolyVertex> = Vec::with_capacity(vertices.len());
    for (i, v) in vertices.iter().enumerate() {
        flat.push(PolyVertex::flat(v.x, v.y));
        let next = if i + 1 < vertices.len() {
            Some(vertices[i + 1])
        } else if closed_flag {
            Some(vertices[0])
        } else {
            None
        };
        if let Some(next) = next {
            for (x, y) in arcs::flatten_bulge((v.x, v.y), (next.x, next.y), v.bulge) {
                flat.push(PolyVertex::flat(x, y));
            }
        }
    }
    let vertices = flat
        .into_iter()
        .map(|v| {
            let (x, y) = tf.apply(v.x, v.y);
            PolyVertex::flat(x, y)
        })
        .collect();
    RawShape::Polyline {
        vertices,
        closed_flag,
    }
}

/// Name of an unsupported entity variant, for rejection reasons.
fn entity_type_name(specific: &EntityType) -> String {
    let debug = format!("{:?}", specific);
    debug
        .split(|c| c == '(' || c == ' ' || c == '{')
        .next()
        .unwrap_or("Unknown")
        .to_string()
}
