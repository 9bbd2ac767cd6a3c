//! Entity extraction from parsed DXF documents.

mod blocks;
mod entities;
mod resolver;

pub use blocks::Affine2;
pub use entities::{extract_entities, ExtractOutcome, PolyVertex, RawRecord, RawShape};
pub use resolver::{resolve_units_and_crs, CrsResolution};
