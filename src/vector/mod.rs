//! Polygon layers: administrative boundaries with attribute records.

mod layer;
mod shp;

pub use layer::PolygonLayer;
pub use shp::{field_string, read_polygon_layer, write_polygon_layer, FieldDef, FieldKind};
