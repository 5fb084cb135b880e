//! File format glue. The pipeline core never touches paths; these modules
//! implement the raster side of the "spatial data source/sink" collaborators
//! (the vector side lives in `vector::shp`).

pub mod asc;
