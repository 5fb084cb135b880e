use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::raster::Grid;

/// One intensity bucket boundary: either the lower tail (`< value`) or an
/// exact integer level (`== value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryBound {
    LessThan { value: i32 },
    Equals { value: i32 },
}

impl CategoryBound {
    /// Short label used for attribute column names (`lt7`, `7`, ...).
    pub fn label(&self) -> String {
        match self {
            CategoryBound::LessThan { value } => format!("lt{value}"),
            CategoryBound::Equals { value } => value.to_string(),
        }
    }

    fn matches(&self, class: i32) -> bool {
        match self {
            CategoryBound::LessThan { value } => class < *value,
            CategoryBound::Equals { value } => class == *value,
        }
    }
}

/// A named 0/1 mask over a classification grid.
pub struct CategoryMask {
    pub label: String,
    pub grid: Grid,
}

/// An ordered, validated set of category boundaries.
///
/// Validation guarantees the buckets are mutually exclusive and gap-free from
/// the bottom of the scale up to the highest `Equals` level: exactly one
/// `LessThan` bucket, first, followed by consecutive `Equals` levels starting
/// at its threshold. Classification values above the top level match no
/// bucket; MMI saturates at the configured top, so those are excluded by
/// design rather than rejected.
#[derive(Debug, Clone)]
pub struct CategorySet {
    bounds: Vec<CategoryBound>,
}

impl CategorySet {
    pub fn new(bounds: Vec<CategoryBound>) -> Result<Self> {
        let err = |msg: String| Err(PipelineError::CategoryConfiguration(msg));
        let Some(first) = bounds.first() else {
            return err("no categories configured".to_string());
        };
        let CategoryBound::LessThan { value: threshold } = first else {
            return err("first category must be a less-than lower-tail bucket".to_string());
        };
        let mut expected = *threshold;
        for bound in &bounds[1..] {
            match bound {
                CategoryBound::LessThan { value } => {
                    return err(format!("second less-than bucket (< {value}) overlaps the first"));
                }
                CategoryBound::Equals { value } if *value == expected => expected += 1,
                CategoryBound::Equals { value } => {
                    return err(format!("expected level {expected} next, found {value} (gap or overlap)"));
                }
            }
        }
        Ok(Self { bounds })
    }

    pub fn bounds(&self) -> &[CategoryBound] {
        &self.bounds
    }

    pub fn labels(&self) -> Vec<String> {
        self.bounds.iter().map(CategoryBound::label).collect()
    }

    /// Derive one 0/1 mask per bucket from an integer classification grid.
    ///
    /// Missing classification cells are 0 in every mask: a cell with no
    /// intensity measurement contributes population to no category (it is
    /// never rounded into the lowest bucket).
    pub fn masks(&self, classification: &Grid) -> Vec<CategoryMask> {
        self.bounds
            .iter()
            .map(|bound| CategoryMask {
                label: bound.label(),
                grid: classification.map(None, |v| {
                    if classification.is_missing(v) {
                        0.0
                    } else {
                        bound.matches(v as i32) as u8 as f64
                    }
                }),
            })
            .collect()
    }
}

/// Discretize a continuous intensity grid to integer levels.
///
/// Rounds to nearest, ties away from zero; missing cells stay missing (NaN).
pub fn classify(intensity: &Grid) -> Grid {
    intensity.map(None, |v| if intensity.is_missing(v) { f64::NAN } else { v.round() })
}
