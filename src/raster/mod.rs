//! Raster grids and the transformations the exposure pipeline applies to
//! them: alignment, population rescaling, and intensity classification.

mod align;
mod classify;
mod grid;
mod rescale;

pub use align::align;
pub use classify::{classify, CategoryBound, CategoryMask, CategorySet};
pub use grid::{Grid, GridDef};
pub use rescale::rescale_population;
