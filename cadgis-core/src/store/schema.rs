//! Feature store schema and connection setup.
//!
//! Geometry is stored as WKT alongside bounding-box columns; the boxes make
//! bbox-intersects queries plain range predicates. Cascading foreign keys
//! implement the deletion invariants: dropping a drawing drops its features,
//! dropping a project drops its drawings and everything under them.

use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

const DDL: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS drawings (
    id              TEXT PRIMARY KEY,
    project_id      TEXT NOT NULL,
    source_file     TEXT,
    native_unit     TEXT NOT NULL,
    unit_to_meter   REAL NOT NULL DEFAULT 1.0,
    native_srid     INTEGER,
    is_georeferenced INTEGER NOT NULL DEFAULT 0,
    anchor_x        REAL,
    anchor_y        REAL,
    anchor_z        REAL
);

CREATE INDEX IF NOT EXISTS idx_drawings_project ON drawings(project_id);

CREATE TABLE IF NOT EXISTS canonical_features (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    drawing_id       TEXT NOT NULL REFERENCES drawings(id) ON DELETE CASCADE,
    project_id       TEXT NOT NULL,
    source_entity_id INTEGER NOT NULL,
    kind             TEXT NOT NULL,
    layer            TEXT NOT NULL,
    native_wkt       TEXT NOT NULL,
    native_srid      INTEGER,
    canonical_wkt    TEXT,
    attributes       TEXT NOT NULL DEFAULT '{}',
    native_min_x     REAL,
    native_min_y     REAL,
    native_max_x     REAL,
    native_max_y     REAL,
    canon_min_x      REAL,
    canon_min_y      REAL,
    canon_max_x      REAL,
    canon_max_y      REAL
);

CREATE INDEX IF NOT EXISTS idx_features_drawing ON canonical_features(drawing_id);
CREATE INDEX IF NOT EXISTS idx_features_project ON canonical_features(project_id);
CREATE INDEX IF NOT EXISTS idx_features_layer ON canonical_features(layer);
CREATE INDEX IF NOT EXISTS idx_features_kind ON canonical_features(kind);
CREATE INDEX IF NOT EXISTS idx_features_canon_bbox
    ON canonical_features(canon_min_x, canon_min_y, canon_max_x, canon_max_y);
";

/// Open (or create) a feature store at a path.
pub fn open_store(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    initialize(&conn)?;
    Ok(conn)
}

/// Open an in-memory feature store.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    initialize(&conn)?;
    Ok(conn)
}

fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(DDL)?;
    Ok(())
}
