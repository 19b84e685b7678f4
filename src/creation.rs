use crate::error::{CompositeError, Result};
use gdal::Dataset;
use log::{debug, info};

const COMPRESSION_TYPES: [&str; 4] = ["DEFLATE", "LZW", "ZSTD", "NONE"];

/// Validate compression type
pub fn validate_compression(compression: &str) -> Result<()> {
    let normalized = compression.to_ascii_uppercase();
    if !COMPRESSION_TYPES.contains(&normalized.as_str()) {
        return Err(CompositeError::Configuration(format!(
            "invalid compression {:?} (expected one of {:?})",
            compression, COMPRESSION_TYPES
        )));
    }
    Ok(())
}

/// Validate internal block size (must be multiple of 16)
pub fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 || block_size % 16 != 0 {
        return Err(CompositeError::Configuration(format!(
            "invalid block_size {} (must be a positive multiple of 16)",
            block_size
        )));
    }
    Ok(())
}

/// Dataset creation options for the output driver.
///
/// Only GTiff understands these keys; other drivers get none.
pub fn creation_options(
    driver: &str,
    compression: Option<&str>,
    block_size: Option<usize>,
) -> Vec<String> {
    if !driver.eq_ignore_ascii_case("GTiff") {
        if compression.is_some() || block_size.is_some() {
            debug!(
                "Ignoring compression/block_size for driver {} (GTiff only)",
                driver
            );
        }
        return Vec::new();
    }

    let mut options = Vec::new();
    if let Some(compression) = compression {
        options.push(format!("COMPRESS={}", compression.to_ascii_uppercase()));
    }
    if let Some(block_size) = block_size {
        options.push("TILED=YES".to_string());
        options.push(format!("BLOCKXSIZE={}", block_size));
        options.push(format!("BLOCKYSIZE={}", block_size));
    }
    if !options.is_empty() {
        options.push("BIGTIFF=IF_SAFER".to_string());
    }
    options
}

/// Power-of-two overview levels down to a 256 pixel minimum dimension.
pub fn overview_levels(width: usize, height: usize) -> Vec<i32> {
    let min_dim = width.min(height);
    let mut levels = Vec::new();
    let mut level = 2;
    while min_dim / level >= 256 {
        levels.push(level as i32);
        level *= 2;
    }
    levels
}

/// Build overviews with nearest resampling so no new values are invented.
pub fn build_overviews(dataset: &mut Dataset) -> Result<()> {
    let (width, height) = dataset.raster_size();
    let levels = overview_levels(width, height);

    if levels.is_empty() {
        debug!("Raster too small for overviews ({}x{}), skipping", width, height);
        return Ok(());
    }

    info!("Creating {} overview levels: {:?}", levels.len(), levels);
    dataset
        .build_overviews("NEAREST", &levels, &[])
        .map_err(|e| CompositeError::Io(format!("failed to build overviews: {}", e)))?;
    Ok(())
}
