//! Canonical geometry builder: raw entity records to native-space geometry.
//!
//! Convention: native geometry is kept in raw drawing units; the drawing's
//! unit-to-meter factor is recorded on the drawing record instead of being
//! baked into coordinates. All arithmetic is double precision.

use geo::Validation;
use geo_types::{Coord, Geometry, LineString, Point, Polygon};

use crate::config::{float_cmp, CLOSE_TOLERANCE, EPS};
use crate::error::RejectReason;
use crate::extract::{PolyVertex, RawRecord, RawShape};
use crate::model::FeatureKind;

use super::arcs;

/// Output of the builder for one record: geometry plus its feature-type tag.
#[derive(Debug, Clone)]
pub struct BuiltGeometry {
    pub kind: FeatureKind,
    pub geometry: Geometry<f64>,
}

/// Build native-space geometry for one raw record.
///
/// `anchor` is the drawing's georeferencing offset, applied to every
/// coordinate to place the local origin in the native CRS; `None` leaves
/// coordinates as the drawing has them.
pub fn build_native_geometry(
    record: &RawRecord,
    anchor: Option<[f64; 3]>,
) -> Result<BuiltGeometry, RejectReason> {
    let (ox, oy) = anchor.map(|a| (a[0], a[1])).unwrap_or((0.0, 0.0));
    let place = |x: f64, y: f64| Coord {
        x: x + ox,
        y: y + oy,
    };

    match &record.shape {
        RawShape::Point { x, y } => Ok(BuiltGeometry {
            kind: FeatureKind::Point,
            geometry: Geometry::Point(Point::from(place(*x, *y))),
        }),

        RawShape::Annotation { x, y, .. } => Ok(BuiltGeometry {
            kind: FeatureKind::Text,
            geometry: Geometry::Point(Point::from(place(*x, *y))),
        }),

        RawShape::Segment { x1, y1, x2, y2 } => {
            if float_cmp::points_coincide((*x1, *y1), (*x2, *y2), EPS) {
                return Err(RejectReason::DegenerateGeometry {
                    detail: "zero-length line".to_string(),
                });
            }
            Ok(BuiltGeometry {
                kind: FeatureKind::Line,
                geometry: Geometry::LineString(LineString::new(vec![
                    place(*x1, *y1),
                    place(*x2, *y2),
                ])),
            })
        }

        RawShape::Arc {
            cx,
            cy,
            radius,
            start_deg,
            end_deg,
        } => {
            if *radius <= 0.0 {
                return Err(RejectReason::DegenerateGeometry {
                    detail: "non-positive arc radius".to_string(),
                });
            }
            let sweep = arcs::arc_sweep_rad(*start_deg, *end_deg);
            let coords: Vec<Coord<f64>> =
                arcs::sample_arc(*cx, *cy, *radius, start_deg.to_radians(), sweep)
                    .into_iter()
                    .map(|(x, y)| place(x, y))
                    .collect();
            Ok(BuiltGeometry {
                kind: FeatureKind::Line,
                geometry: Geometry::LineString(LineString::new(coords)),
            })
        }

        RawShape::Circle { cx, cy, radius } => {
            if *radius <= 0.0 {
                return Err(RejectReason::DegenerateGeometry {
                    detail: "non-positive circle radius".to_string(),
                });
            }
            let ring: Vec<Coord<f64>> = arcs::circle_ring(*cx, *cy, *radius)
                .into_iter()
                .map(|(x, y)| place(x, y))
                .collect();
            Ok(BuiltGeometry {
                kind: FeatureKind::Polygon,
                geometry: Geometry::Polygon(Polygon::new(LineString::new(ring), vec![])),
            })
        }

        RawShape::Polyline {
            vertices,
            closed_flag,
        } => build_polyline(vertices, *closed_flag, place),
    }
}

/// Closure tie-break: a polyline is closed if its explicit flag is set OR
/// its first and last vertices coincide within `CLOSE_TOLERANCE`. Many CAD
/// exports omit the flag, so the flag alone is not trusted.
fn is_closed(vertices: &[PolyVertex], closed_flag: bool) -> bool {
    if closed_flag {
        return true;
    }
    match (vertices.first(), vertices.last()) {
        (Some(first), Some(last)) if vertices.len() >= 3 => {
            float_cmp::points_coincide((first.x, first.y), (last.x, last.y), CLOSE_TOLERANCE)
        }
        _ => false,
    }
}

fn build_polyline(
    vertices: &[PolyVertex],
    closed_flag: bool,
    place: impl Fn(f64, f64) -> Coord<f64>,
) -> Result<BuiltGeometry, RejectReason> {
    if vertices.len() < 2 {
        return Err(RejectReason::DegenerateGeometry {
            detail: format!("polyline with {} vertices", vertices.len()),
        });
    }

    let closed = is_closed(vertices, closed_flag);

    // Flatten bulges into the point chain. For closed polylines the bulge of
    // the last vertex curves back to the first.
    let mut chain: Vec<Coord<f64>> = Vec::with_capacity(vertices.len());
    for (i, v) in vertices.iter().enumerate() {
        chain.push(place(v.x, v.y));
        let next = if i + 1 < vertices.len() {
            Some(&vertices[i + 1])
        } else if closed {
            Some(&vertices[0])
        } else {
            None
        };
        if let Some(next) = next {
            for (x, y) in arcs::flatten_bulge((v.x, v.y), (next.x, next.y), v.bulge) {
                chain.push(place(x, y));
            }
        }
    }

    // Drop consecutive duplicates left by coincident source vertices.
    chain.dedup_by(|a, b| float_cmp::points_coincide((a.x, a.y), (b.x, b.y), EPS));

    if closed {
        // The ring is closed implicitly; a trailing vertex coincident with
        // the first would double the closing point.
        if let (Some(first), Some(last)) = (chain.first().copied(), chain.last().copied()) {
            if float_cmp::points_coincide((first.x, first.y), (last.x, last.y), CLOSE_TOLERANCE) {
                chain.pop();
            }
        }
        if chain.len() < 3 {
            return Err(RejectReason::DegenerateGeometry {
                detail: "closed polyline collapses to fewer than 3 distinct vertices".to_string(),
            });
        }
        let polygon = Polygon::new(LineString::new(chain), vec![]);
        if !polygon.is_valid() {
            return Err(RejectReason::SelfIntersectingRing);
        }
        Ok(BuiltGeometry {
            kind: FeatureKind::Polygon,
            geometry: Geometry::Polygon(polygon),
        })
    } else {
        if chain.len() < 2 {
            return Err(RejectReason::DegenerateGeometry {
                detail: "open polyline collapses to a single point".to_string(),
            });
        }
        Ok(BuiltGeometry {
            kind: FeatureKind::Line,
            geometry: Geometry::LineString(LineString::new(chain)),
        })
    }
}
