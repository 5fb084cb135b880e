use geo::{Coord, MapCoords, MultiPolygon};
use shapefile::dbase::Record;

use crate::crs::{Crs, CrsTransform};
use crate::error::PipelineError;
use crate::vector::shp::field_string;

/// An ordered polygon feature collection: one geometry and one attribute
/// record per feature, all sharing a single CRS.
///
/// Feature order is part of the contract — zonal results are joined back by
/// position, never by re-sorting.
#[derive(Debug, Clone)]
pub struct PolygonLayer {
    pub crs: Option<Crs>,
    pub geoms: Vec<MultiPolygon<f64>>,
    pub records: Vec<Record>,
}

impl PolygonLayer {
    pub fn len(&self) -> usize {
        self.geoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geoms.is_empty()
    }

    /// Reproject every geometry into `to`. Explicit by design: aggregation
    /// refuses mismatched CRS rather than reprojecting behind the caller's
    /// back.
    pub fn reproject(&self, to: &Crs) -> Result<Self, PipelineError> {
        let from = self.crs.as_ref().ok_or_else(|| {
            PipelineError::SpatialReferenceMismatch(
                "cannot reproject a layer with no CRS".to_string(),
            )
        })?;
        if from == to {
            return Ok(self.clone());
        }
        let transform = CrsTransform::new(from, to)?;
        let geoms = self
            .geoms
            .iter()
            .map(|shape| {
                shape.try_map_coords(|coord: Coord<f64>| {
                    let (x, y) = transform.apply(coord.x, coord.y)?;
                    Ok::<_, PipelineError>(Coord { x, y })
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        Ok(Self { crs: Some(to.clone()), geoms, records: self.records.clone() })
    }

    /// Subset features whose `field` value starts with any of `names`.
    ///
    /// Prefix matching (rather than equality) groups composite region names:
    /// a filter value of "Shan" keeps "Shan (South)", "Shan (North)", and
    /// "Shan (East)" together as one region.
    pub fn filter_by_field(&self, field: &str, names: &[String]) -> anyhow::Result<Self> {
        let mut geoms = Vec::new();
        let mut records = Vec::new();
        for (geom, record) in self.geoms.iter().zip(&self.records) {
            let value = field_string(record, field)?;
            if names.iter().any(|name| value.starts_with(name.trim())) {
                geoms.push(geom.clone());
                records.push(record.clone());
            }
        }
        Ok(Self { crs: self.crs.clone(), geoms, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use shapefile::dbase::FieldValue;

    fn record(field: &str, value: &str) -> Record {
        let mut r = Record::default();
        r.insert(field.to_string(), FieldValue::Character(Some(value.to_string())));
        r
    }

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
        ]])
    }

    fn layer(values: &[&str]) -> PolygonLayer {
        PolygonLayer {
            crs: Some(Crs::wgs84()),
            geoms: vec![unit_square(); values.len()],
            records: values.iter().map(|v| record("ST", v)).collect(),
        }
    }

    #[test]
    fn filter_matches_exact_names() {
        let filtered = layer(&["Mandalay", "Sagaing", "Mandalay"])
            .filter_by_field("ST", &["Mandalay".to_string()])
            .unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn filter_groups_composite_names_by_prefix() {
        let filtered = layer(&["Shan (South)", "Shan (North)", "Kachin"])
            .filter_by_field("ST", &["Shan".to_string()])
            .unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn filter_accepts_multiple_names() {
        let filtered = layer(&["Mandalay", "Sagaing", "Kachin"])
            .filter_by_field("ST", &["Mandalay".to_string(), "Sagaing".to_string()])
            .unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn filter_fails_on_missing_field() {
        let result = layer(&["Mandalay"]).filter_by_field("NOPE", &["Mandalay".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn reproject_without_crs_is_an_error() {
        let mut l = layer(&["Mandalay"]);
        l.crs = None;
        match l.reproject(&Crs::wgs84()) {
            Err(PipelineError::SpatialReferenceMismatch(_)) => {}
            other => panic!("expected SpatialReferenceMismatch, got {other:?}"),
        }
    }

    #[test]
    fn reproject_to_same_crs_is_identity() {
        let l = layer(&["Mandalay"]);
        let out = l.reproject(&Crs::wgs84()).unwrap();
        assert_eq!(out.geoms, l.geoms);
    }
}
