//! Feature store: persistence, queries, and GeoJSON export.

mod mapper;
mod query;
mod schema;

pub use mapper::{delete_drawing, delete_project, get_drawing, persist_drawing};
pub use query::{
    drawing_stats, export_geojson, features_for_drawing, query_features, FeatureFilter,
};
pub use schema::{open_in_memory, open_store};
