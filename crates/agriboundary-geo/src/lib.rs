//! AgriBoundary Geo - Area ingestion, CRS handling and raster vectorization
//!
//! This crate turns uploaded features into a single WGS 84 area of interest,
//! reprojects between the area and raster grids, and converts label rasters into
//! tagged polygons.

pub mod aoi;
pub mod transform;
pub mod validation;
pub mod vectorize;
