// Library exports for testing and reuse

pub mod align;
pub mod cli;
pub mod config;
pub mod creation;
pub mod crs;
pub mod discovery;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod median;
pub mod pipeline;
pub mod raster;
pub mod tiling;
pub mod writer;

// Re-export commonly used types
pub use align::{AlignedBand, Aligner, Resampling};
pub use config::CompositeConfig;
pub use crs::{Crs, Reprojection};
pub use error::{CompositeError, Result};
pub use geometry::{Extent, GeoTransform};
pub use grid::{CanonicalGrid, GridResolver};
pub use median::{median_in_place, MedianComposite, MedianReducer};
pub use pipeline::{Compositor, RunSummary};
pub use raster::{RasterFootprint, RasterImage, RasterSource};
pub use writer::{CompositeProfile, CompositeWriter, OutputType, WriterOptions};
