//! Coordinate reprojection from a drawing's native CRS into the canonical
//! exchange CRS (EPSG:4326 geographic degrees).
//!
//! Transforms run through `proj4rs`, driven by a built-in registry of proj4
//! definition strings keyed by EPSG code. The registry covers the geographic
//! CRSs, Web Mercator, WGS84 and NAD83 UTM zones (computed from the zone
//! number), and Lambert-93. An SRID outside the registry is reported, never
//! guessed.

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use proj4rs::proj::Proj;

use crate::error::{IngestError, RejectReason, Result};

/// Proj4 definition for an EPSG code, plus whether its coordinates are
/// geographic (degrees) rather than projected.
fn proj_definition(srid: u32) -> Option<(String, bool)> {
    match srid {
        4326 => Some(("+proj=longlat +ellps=WGS84 +no_defs".to_string(), true)),
        4269 => Some(("+proj=longlat +ellps=GRS80 +no_defs".to_string(), true)),
        3857 => Some((
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
                .to_string(),
            false,
        )),
        // Lambert-93 (France).
        2154 => Some((
            "+proj=lcc +lat_1=49 +lat_2=44 +lat_0=46.5 +lon_0=3 +x_0=700000 +y_0=6600000 +ellps=GRS80 +units=m +no_defs"
                .to_string(),
            false,
        )),
        // WGS84 UTM, northern and southern hemispheres.
        32601..=32660 => Some((
            format!(
                "+proj=utm +zone={} +ellps=WGS84 +units=m +no_defs",
                srid - 32600
            ),
            false,
        )),
        32701..=32760 => Some((
            format!(
                "+proj=utm +zone={} +south +ellps=WGS84 +units=m +no_defs",
                srid - 32700
            ),
            false,
        )),
        // NAD83 UTM.
        26901..=26923 => Some((
            format!(
                "+proj=utm +zone={} +ellps=GRS80 +units=m +no_defs",
                srid - 26900
            ),
            false,
        )),
        _ => None,
    }
}

/// Whether a reprojection to the canonical CRS is available for an SRID.
pub fn srid_registered(srid: u32) -> bool {
    proj_definition(srid).is_some()
}

/// Transform from one native CRS into the canonical exchange CRS.
///
/// Deterministic and side-effect free: repeated calls with the same input
/// yield bit-identical output.
pub struct Reprojector {
    src: Proj,
    src_geographic: bool,
    dst: Proj,
}

impl Reprojector {
    /// Build the transform for a native SRID, or fail with
    /// [`IngestError::UnknownSrid`] when the registry has no definition.
    pub fn for_srid(srid: u32) -> Result<Self> {
        let (def, src_geographic) =
            proj_definition(srid).ok_or(IngestError::UnknownSrid { srid })?;
        let src = Proj::from_proj_string(&def)
            .map_err(|_| IngestError::UnknownSrid { srid })?;
        let (canonical_def, _) = proj_definition(crate::config::CANONICAL_SRID)
            .ok_or(IngestError::UnknownSrid {
                srid: crate::config::CANONICAL_SRID,
            })?;
        let dst = Proj::from_proj_string(&canonical_def).map_err(|_| IngestError::UnknownSrid {
            srid: crate::config::CANONICAL_SRID,
        })?;
        Ok(Self {
            src,
            src_geographic,
            dst,
        })
    }

    /// Transform one native coordinate pair into geographic degrees.
    pub fn point_to_canonical(&self, x: f64, y: f64) -> std::result::Result<(f64, f64), RejectReason> {
        let mut point = if self.src_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&self.src, &self.dst, &mut point).map_err(|e| {
            RejectReason::ReprojectionDomain {
                message: e.to_string(),
            }
        })?;
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    }

    /// Transform geographic degrees back into the native CRS.
    pub fn point_to_native(&self, lon: f64, lat: f64) -> std::result::Result<(f64, f64), RejectReason> {
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        proj4rs::transform::transform(&self.dst, &self.src, &mut point).map_err(|e| {
            RejectReason::ReprojectionDomain {
                message: e.to_string(),
            }
        })?;
        if self.src_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Transform a whole native-space geometry into the canonical CRS. A
    /// single out-of-domain coordinate fails the whole geometry; the caller
    /// keeps the native geometry and omits the canonical one.
    pub fn to_canonical(
        &self,
        geometry: &Geometry<f64>,
    ) -> std::result::Result<Geometry<f64>, RejectReason> {
        geometry.try_map_coords(|coord| {
            let (x, y) = self.point_to_canonical(coord.x, coord.y)?;
            Ok(Coord { x, y })
        })
    }
}
