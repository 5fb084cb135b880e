//! Shapefile reading/writing and shapefile <-> geo geometry conversion.
//!
//! This is the concrete "spatial data source/sink" for polygon layers; the
//! core components never see a file path.

use std::path::Path;

use anyhow::{bail, Context, Result};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Reader, Shape};

use crate::crs::Crs;
use crate::vector::PolygonLayer;

/// Schema entry for writing an augmented layer.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Character(u8),
    /// Fixed-point numeric, 20 digits / 6 decimals.
    Numeric,
}

/// Read all polygon features (geometry + attribute record) from a `.shp`.
///
/// Shapefiles carry their CRS in a `.prj` sidecar we do not parse, so the
/// caller supplies the CRS from configuration.
pub fn read_polygon_layer(path: &Path, crs: Option<Crs>) -> Result<PolygonLayer> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("failed to open shapefile: {}", path.display()))?;

    let mut geoms = Vec::new();
    let mut records = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("error reading shape+record")?;
        match shape {
            Shape::Polygon(p) => {
                geoms.push(shp_to_geo(&p));
                records.push(record);
            }
            Shape::NullShape => continue,
            other => bail!(
                "unexpected shape type {} in {} (polygons only)",
                other,
                path.display()
            ),
        }
    }
    Ok(PolygonLayer { crs, geoms, records })
}

/// Write a layer with the given attribute schema. Record values must cover
/// every field in `fields`; geometry and record counts must match.
pub fn write_polygon_layer(path: &Path, layer: &PolygonLayer, fields: &[FieldDef]) -> Result<()> {
    if layer.geoms.len() != layer.records.len() {
        bail!(
            "layer has {} geometries but {} records",
            layer.geoms.len(),
            layer.records.len()
        );
    }

    let mut builder = TableWriterBuilder::new();
    for field in fields {
        let name = FieldName::try_from(field.name.as_str())
            .map_err(|e| anyhow::anyhow!("invalid dbase field name {:?}: {e}", field.name))?;
        builder = match field.kind {
            FieldKind::Character(len) => builder.add_character_field(name, len),
            FieldKind::Numeric => builder.add_numeric_field(name, 20, 6),
        };
    }

    let mut writer = shapefile::Writer::from_path(path, builder)
        .with_context(|| format!("failed to create shapefile: {}", path.display()))?;
    for (geom, record) in layer.geoms.iter().zip(&layer.records) {
        writer
            .write_shape_and_record(&geo_to_shp(geom), record)
            .with_context(|| format!("failed writing feature to {}", path.display()))?;
    }
    Ok(())
}

/// Get a trimmed character field from a record.
pub fn field_string(record: &Record, field: &str) -> Result<String> {
    match record.get(field) {
        Some(FieldValue::Character(Some(s))) => Ok(s.trim().to_string()),
        Some(FieldValue::Character(None)) => Ok(String::new()),
        _ => bail!("missing or non-character field: {field}"),
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon.
///
/// Shapefile rings are oriented (clockwise = exterior) and each exterior is
/// followed by its holes; geo wants them grouped explicitly.
pub fn shp_to_geo(p: &shapefile::Polygon) -> geo::MultiPolygon<f64> {
    fn ensure_closed(coords: &mut Vec<geo::Coord<f64>>) {
        if !coords.is_empty() && coords[0] != coords[coords.len() - 1] {
            coords.push(coords[0]);
        }
    }

    fn signed_area(pts: &[geo::Coord<f64>]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    let mut rings: Vec<(geo::LineString<f64>, bool)> = Vec::with_capacity(p.rings().len());
    for ring in p.rings() {
        let mut coords: Vec<geo::Coord<f64>> =
            ring.points().iter().map(|pt| geo::Coord { x: pt.x, y: pt.y }).collect();
        ensure_closed(&mut coords);
        let is_exterior = signed_area(&coords) < 0.0; // CW => exterior in shapefile
        rings.push((geo::LineString(coords), is_exterior));
    }

    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut exterior: Option<geo::LineString<f64>> = None;
    let mut holes: Vec<geo::LineString<f64>> = Vec::new();
    for (ring, is_exterior) in rings {
        if is_exterior {
            if let Some(ext) = exterior.take() {
                polys.push(geo::Polygon::new(ext, std::mem::take(&mut holes)));
            }
            exterior = Some(ring);
        } else {
            holes.push(ring);
        }
    }
    if let Some(ext) = exterior {
        polys.push(geo::Polygon::new(ext, holes));
    }
    geo::MultiPolygon(polys)
}

/// Convert geo::MultiPolygon back to a shapefile::Polygon.
pub fn geo_to_shp(mp: &geo::MultiPolygon<f64>) -> shapefile::Polygon {
    use shapefile::{Point, PolygonRing};

    fn ring_points(ls: &geo::LineString<f64>) -> Vec<Point> {
        let mut pts: Vec<Point> = ls.0.iter().map(|c| Point { x: c.x, y: c.y }).collect();
        if let (Some(first), Some(last)) = (pts.first().copied(), pts.last()) {
            if first.x != last.x || first.y != last.y {
                pts.push(first);
            }
        }
        pts
    }

    let mut rings = Vec::new();
    for poly in &mp.0 {
        rings.push(PolygonRing::Outer(ring_points(poly.exterior())));
        for hole in poly.interiors() {
            rings.push(PolygonRing::Inner(ring_points(hole)));
        }
    }
    shapefile::Polygon::with_rings(rings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn geo_shp_roundtrip_preserves_ring_structure() {
        let original = geo::MultiPolygon(vec![geo::Polygon::new(
            geo::LineString(vec![
                geo::Coord { x: 0.0, y: 0.0 },
                geo::Coord { x: 4.0, y: 0.0 },
                geo::Coord { x: 4.0, y: 4.0 },
                geo::Coord { x: 0.0, y: 4.0 },
                geo::Coord { x: 0.0, y: 0.0 },
            ]),
            vec![geo::LineString(vec![
                geo::Coord { x: 1.0, y: 1.0 },
                geo::Coord { x: 2.0, y: 1.0 },
                geo::Coord { x: 2.0, y: 2.0 },
                geo::Coord { x: 1.0, y: 2.0 },
                geo::Coord { x: 1.0, y: 1.0 },
            ])],
        )]);
        let back = shp_to_geo(&geo_to_shp(&original));
        assert_eq!(back.0.len(), 1);
        assert_eq!(back.0[0].interiors().len(), 1);
        use geo::Area;
        assert!((back.unsigned_area() - original.unsigned_area()).abs() < 1e-9);
    }

    #[test]
    fn plain_square_converts() {
        let square: geo::MultiPolygon<f64> = geo::MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
        ]]);
        let shp = geo_to_shp(&square);
        assert_eq!(shp.rings().len(), 1);
        let back = shp_to_geo(&shp);
        use geo::Area;
        assert!((back.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn field_string_trims_and_validates() {
        let mut r = Record::default();
        r.insert("TS".to_string(), FieldValue::Character(Some("  Amarapura ".to_string())));
        assert_eq!(field_string(&r, "TS").unwrap(), "Amarapura");
        assert!(field_string(&r, "MISSING").is_err());
    }
}
