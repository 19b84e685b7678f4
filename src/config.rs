use crate::align::Resampling;
use crate::creation;
use crate::error::{CompositeError, Result};
use crate::writer::OutputType;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DRIVER: &str = "GTiff";
pub const DEFAULT_TILE_SIZE: usize = 1024;

/// One YAML file drives a whole run. Only the output path, band count and
/// input folder are required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeConfig {
    #[serde(alias = "output_median")]
    pub output_path: PathBuf,
    #[serde(default = "default_driver")]
    pub driver: String,
    pub number_of_bands: usize,
    pub input_folder: PathBuf,

    /// Any GDAL user input (`EPSG:32633`, WKT, PROJ string)
    #[serde(default)]
    pub target_crs: Option<String>,
    #[serde(default)]
    pub resampling: Resampling,
    #[serde(default)]
    pub output_type: Option<OutputType>,
    #[serde(default)]
    pub nodata: Option<f64>,
    #[serde(default)]
    pub allow_truncation: bool,
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_tile_size")]
    pub tile_size: usize,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub block_size: Option<usize>,
    #[serde(default)]
    pub overviews: bool,
    #[serde(default)]
    pub extensions: Vec<String>,
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_tile_size() -> usize {
    DEFAULT_TILE_SIZE
}

impl CompositeConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CompositeError::Configuration(format!(
                "cannot read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: CompositeConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(CompositeError::Configuration(
                "output_path must not be empty".to_string(),
            ));
        }
        if self.input_folder.as_os_str().is_empty() {
            return Err(CompositeError::Configuration(
                "input_folder must not be empty".to_string(),
            ));
        }
        if self.driver.trim().is_empty() {
            return Err(CompositeError::Configuration(
                "driver must not be empty".to_string(),
            ));
        }
        if self.number_of_bands == 0 {
            return Err(CompositeError::Configuration(
                "number_of_bands must be positive".to_string(),
            ));
        }
        if self.tile_size == 0 {
            return Err(CompositeError::Configuration(
                "tile_size must be positive".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(CompositeError::Configuration(
                "threads must be positive when set".to_string(),
            ));
        }
        if let Some(compression) = &self.compression {
            creation::validate_compression(compression)?;
        }
        if let Some(block_size) = self.block_size {
            creation::validate_block_size(block_size)?;
        }
        Ok(())
    }

    /// Whether a discovered file passes the `extensions` filter.
    pub fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
