//! Error types for DXF ingestion and normalization.
//!
//! Two distinct vocabularies: [`IngestError`] is fatal for the current run
//! (the per-drawing transaction is rolled back in full), while
//! [`RejectReason`] records a recoverable per-entity skip that the pipeline
//! counts and continues past.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal error for one ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read DXF document: {0}")]
    Dxf(#[from] dxf::DxfError),

    #[error("drawing not found in store: {id}")]
    DrawingNotFound { id: String },

    #[error("no projection definition registered for SRID {srid}")]
    UnknownSrid { srid: u32 },

    #[error("stored feature {id} has unreadable geometry: {message}")]
    StoredGeometry { id: i64, message: String },

    #[error("ingestion cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("attribute serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Reason an individual source entity was skipped or flagged.
///
/// These are not errors: extraction is partial-failure tolerant, and every
/// skip is surfaced in the ingestion report rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Source entity type the extractor does not handle (splines, 3D solids,
    /// OLE objects and the like).
    UnsupportedEntity { entity: String },

    /// Geometry failed a basic validity check (zero-length line, collapsed
    /// ring).
    DegenerateGeometry { detail: String },

    /// Polygon ring intersects itself.
    SelfIntersectingRing,

    /// Block insert chain that (in)directly inserts itself.
    BlockCycle { block: String },

    /// Insert references a block definition that does not exist.
    MissingBlock { block: String },

    /// Insert nesting exceeded the recursion cap.
    InsertTooDeep { depth: usize },

    /// A coordinate fell outside the valid domain of the target transform.
    /// Native geometry is retained; canonical geometry is omitted.
    ReprojectionDomain { message: String },

    /// The drawing declares an SRID with no registered projection
    /// definition; canonical geometry is omitted for all its features.
    UnregisteredSrid { srid: u32 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnsupportedEntity { entity } => {
                write!(f, "unsupported entity type {}", entity)
            }
            RejectReason::DegenerateGeometry { detail } => {
                write!(f, "degenerate geometry: {}", detail)
            }
            RejectReason::SelfIntersectingRing => write!(f, "self-intersecting polygon ring"),
            RejectReason::BlockCycle { block } => {
                write!(f, "block '{}' inserts itself", block)
            }
            RejectReason::MissingBlock { block } => {
                write!(f, "block '{}' is not defined", block)
            }
            RejectReason::InsertTooDeep { depth } => {
                write!(f, "insert nesting exceeds depth {}", depth)
            }
            RejectReason::ReprojectionDomain { message } => {
                write!(f, "coordinate outside transform domain: {}", message)
            }
            RejectReason::UnregisteredSrid { srid } => {
                write!(f, "SRID {} has no registered projection", srid)
            }
        }
    }
}

/// One rejected or flagged source entity, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    /// Source entity id within the drawing, when known.
    pub source_entity_id: Option<i64>,
    /// Source layer, when known.
    pub layer: Option<String>,
    /// Why the entity was skipped or flagged.
    pub reason: RejectReason,
}

impl Rejection {
    /// Rejection tied to a specific source entity.
    pub fn entity(source_entity_id: i64, layer: impl Into<String>, reason: RejectReason) -> Self {
        Self {
            source_entity_id: Some(source_entity_id),
            layer: Some(layer.into()),
            reason,
        }
    }

    /// Drawing-level rejection not tied to one entity.
    pub fn drawing(reason: RejectReason) -> Self {
        Self {
            source_entity_id: None,
            layer: None,
            reason,
        }
    }
}
