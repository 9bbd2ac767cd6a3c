//! Post-ingestion validation and reporting.

mod validate;

pub use validate::{build_report, Extent, IngestReport};
