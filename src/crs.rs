use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::error::{PipelineError, Result};

/// A coordinate reference system, held as a normalized PROJ.4 string.
///
/// Inputs in this pipeline carry no embedded CRS metadata (`.asc` has none and
/// `.prj` parsing is out of scope), so every layer/grid gets its CRS from
/// configuration, either as `EPSG:<code>` or as a raw `+proj=...` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs(String);

impl Crs {
    /// WGS84 geographic coordinates, the default for all inputs.
    pub fn wgs84() -> Self {
        Self("+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string())
    }

    /// Parse a configuration CRS string: `EPSG:<code>` or a raw PROJ.4 string.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(code) = s.strip_prefix("EPSG:").or_else(|| s.strip_prefix("epsg:")) {
            let code: u32 = code
                .parse()
                .map_err(|_| PipelineError::SpatialReferenceMismatch(format!("bad EPSG code: {s}")))?;
            return Self::from_epsg(code);
        }
        if s.starts_with("+proj=") {
            return Ok(Self(s.to_string()));
        }
        Err(PipelineError::SpatialReferenceMismatch(format!(
            "unrecognized CRS string: {s}"
        )))
    }

    /// Build a CRS from a known EPSG code (geographic datums and UTM zones).
    pub fn from_epsg(code: u32) -> Result<Self> {
        let proj = match code {
            4326 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            4269 => "+proj=longlat +datum=NAD83 +no_defs +type=crs".to_string(),
            // WGS84 UTM north (326zz) and south (327zz)
            32601..=32660 => format!(
                "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs +type=crs",
                code - 32600
            ),
            32701..=32760 => format!(
                "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs +type=crs",
                code - 32700
            ),
            _ => {
                return Err(PipelineError::SpatialReferenceMismatch(format!(
                    "unsupported EPSG code: {code}"
                )))
            }
        };
        Ok(Self(proj))
    }

    pub fn proj4_string(&self) -> &str {
        &self.0
    }

    /// Geographic CRS work in degrees at the API surface but proj4rs expects
    /// radians, so transforms need to know which sides are angular.
    pub fn is_geographic(&self) -> bool {
        self.0.contains("+proj=longlat")
    }
}

/// A reusable point transform between two CRS.
pub struct CrsTransform {
    from: Proj4,
    to: Proj4,
    from_angular: bool,
    to_angular: bool,
}

impl CrsTransform {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        let build = |crs: &Crs| {
            Proj4::from_proj_string(crs.proj4_string()).map_err(|e| {
                PipelineError::SpatialReferenceMismatch(format!(
                    "failed to build projection from {}: {e}",
                    crs.proj4_string()
                ))
            })
        };
        Ok(Self {
            from: build(from)?,
            to: build(to)?,
            from_angular: from.is_geographic(),
            to_angular: to.is_geographic(),
        })
    }

    /// Transform one (x, y) point. Degrees in/out for geographic CRS.
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut point = if self.from_angular {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.from, &self.to, &mut point).map_err(|e| {
            PipelineError::SpatialReferenceMismatch(format!("transform failed at ({x}, {y}): {e}"))
        })?;
        if self.to_angular {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_4326_is_geographic() {
        let crs = Crs::from_epsg(4326).unwrap();
        assert!(crs.is_geographic());
        assert_eq!(crs, Crs::wgs84());
    }

    #[test]
    fn utm_codes_build_zone_strings() {
        let north = Crs::from_epsg(32646).unwrap();
        assert!(north.proj4_string().contains("+zone=46"));
        assert!(!north.proj4_string().contains("+south"));
        let south = Crs::from_epsg(32746).unwrap();
        assert!(south.proj4_string().contains("+south"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Crs::parse("WKT:whatever").is_err());
        assert!(Crs::parse("EPSG:99999").is_err());
    }

    #[test]
    fn identity_transform_returns_input() {
        let crs = Crs::wgs84();
        let t = CrsTransform::new(&crs, &crs).unwrap();
        let (x, y) = t.apply(96.1, 21.9).unwrap();
        assert!((x - 96.1).abs() < 1e-9);
        assert!((y - 21.9).abs() < 1e-9);
    }

    #[test]
    fn wgs84_to_utm_roundtrip() {
        let geo = Crs::wgs84();
        let utm = Crs::from_epsg(32646).unwrap();
        let fwd = CrsTransform::new(&geo, &utm).unwrap();
        let inv = CrsTransform::new(&utm, &geo).unwrap();
        let (e, n) = fwd.apply(96.0, 22.0).unwrap();
        assert!(e > 0.0 && n > 0.0);
        let (lon, lat) = inv.apply(e, n).unwrap();
        assert!((lon - 96.0).abs() < 1e-6);
        assert!((lat - 22.0).abs() < 1e-6);
    }
}
