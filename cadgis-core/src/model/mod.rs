//! Data model for ingested drawings and normalized features.

mod drawing;
mod feature;

pub use drawing::Drawing;
pub use feature::{CanonicalFeature, FeatureKind};
