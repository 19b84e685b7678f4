use crate::config::CompositeConfig;
use crate::error::{CompositeError, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use walkdir::WalkDir;

/// Recursively list candidate raster files under `input_folder`.
///
/// Paths come back sorted so repeated runs see inputs in the same order.
pub fn discover_inputs(config: &CompositeConfig) -> Result<Vec<PathBuf>> {
    let root = &config.input_folder;
    if !root.is_dir() {
        return Err(CompositeError::Configuration(format!(
            "input_folder {} is not a directory",
            root.display()
        )));
    }

    info!("Scanning {} for input rasters", root.display());
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if config.strict => {
                return Err(CompositeError::Io(format!("cannot scan {}: {}", root.display(), e)));
            }
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if !config.accepts(entry.path()) {
            debug!("Ignoring {} (extension filter)", entry.path().display());
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    info!("Found {} candidate files", files.len());
    Ok(files)
}
