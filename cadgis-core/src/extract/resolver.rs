//! Unit and CRS resolution from drawing header metadata.
//!
//! Pure over its inputs and never fails: absence of units or CRS is a
//! normal, representable state. DXF carries drawing units in the `$INSUNITS`
//! header variable but has no portable CRS tag, so an explicit CRS
//! identifier always arrives from the import request, falling back to the
//! project default and finally to "unknown".

use dxf::enums::Units;
use dxf::Header;

use crate::config::{IngestOptions, LinearUnit};

/// Resolved unit and CRS for one drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrsResolution {
    /// Linear unit of drawing coordinates.
    pub unit: LinearUnit,
    /// Conversion factor from one drawing unit to meters.
    pub unit_to_meter: f64,
    /// Native SRID; `None` means unknown.
    pub srid: Option<u32>,
}

/// Resolve `(native_unit, unit_to_meter_factor, native_srid_or_null)` for a
/// drawing. Precedence: explicit per-drawing override, then the drawing's
/// own header, then the project default.
pub fn resolve_units_and_crs(header: &Header, options: &IngestOptions) -> CrsResolution {
    let unit = options
        .unit_override
        .or_else(|| unit_from_header(header))
        .unwrap_or(options.defaults.default_unit);

    let srid = options.srid_override.or(options.defaults.default_srid);

    CrsResolution {
        unit,
        unit_to_meter: unit.to_meter_factor(),
        srid,
    }
}

/// Map the DXF `$INSUNITS` code to a linear unit. Unitless or exotic codes
/// resolve to `None` and fall through to the project default.
fn unit_from_header(header: &Header) -> Option<LinearUnit> {
    match header.default_drawing_units {
        Units::Inches => Some(LinearUnit::Inches),
        Units::Feet => Some(LinearUnit::Feet),
        Units::Millimeters => Some(LinearUnit::Millimeters),
        Units::Centimeters => Some(LinearUnit::Centimeters),
        Units::Meters => Some(LinearUnit::Meters),
        Units::Kilometers => Some(LinearUnit::Kilometers),
        Units::Yards => Some(LinearUnit::Yards),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> IngestOptions {
        IngestOptions::new("d1", "p1")
    }

    #[test]
    fn test_declared_feet() {
        let mut doc = dxf::Drawing::new();
        doc.header.default_drawing_units = Units::Feet;
        let res = resolve_units_and_crs(&doc.header, &options());
        assert_eq!(res.unit, LinearUnit::Feet);
        assert_eq!(res.unit_to_meter, 0.3048);
        assert_eq!(res.srid, None);
    }

    #[test]
    fn test_unitless_falls_back_to_project_default() {
        let doc = dxf::Drawing::new();
        let res = resolve_units_and_crs(&doc.header, &options());
        assert_eq!(res.unit, LinearUnit::UsSurveyFeet);
    }

    #[test]
    fn test_override_wins_over_header() {
        let mut doc = dxf::Drawing::new();
        doc.header.default_drawing_units = Units::Feet;
        let mut opts = options();
        opts.unit_override = Some(LinearUnit::Meters);
        opts.srid_override = Some(32633);
        let res = resolve_units_and_crs(&doc.header, &opts);
        assert_eq!(res.unit, LinearUnit::Meters);
        assert_eq!(res.srid, Some(32633));
    }

    #[test]
    fn test_project_default_srid() {
        let doc = dxf::Drawing::new();
        let mut opts = options();
        opts.defaults.default_srid = Some(2154);
        let res = resolve_units_and_crs(&doc.header, &opts);
        assert_eq!(res.srid, Some(2154));
    }
}
