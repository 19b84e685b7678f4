use crate::crs::{Crs, Reprojection};
use crate::error::{CompositeError, Result};
use crate::geometry::{Extent, GeoTransform};
use crate::raster::RasterFootprint;
use log::{debug, info};

/// Slack when dividing an extent by a resolution, so exact multiples do not
/// gain a spurious column from floating point noise.
const CELL_TOLERANCE: f64 = 1e-6;

/// Output grid covering the union of all input footprints.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalGrid {
    pub extent: Extent,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub width: usize,
    pub height: usize,
    pub crs: Crs,
}

impl CanonicalGrid {
    /// North-up transform anchored at the top-left corner of the extent.
    pub fn geotransform(&self) -> GeoTransform {
        GeoTransform::north_up(
            self.extent.min_x,
            self.extent.max_y,
            self.pixel_width,
            self.pixel_height,
        )
    }

    /// World coordinates of the centre of cell (`row`, `col`).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.extent.min_x + (col as f64 + 0.5) * self.pixel_width,
            self.extent.max_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }
}

fn cells_covering(length: f64, resolution: f64) -> usize {
    ((length / resolution - CELL_TOLERANCE).ceil() as usize).max(1)
}

pub struct GridResolver {
    target_crs: Option<Crs>,
}

impl GridResolver {
    /// `target_crs` overrides the default of using the first georeferenced
    /// input's CRS.
    pub fn new(target_crs: Option<Crs>) -> Self {
        Self { target_crs }
    }

    pub fn target_crs(&self, footprints: &[RasterFootprint]) -> Result<Crs> {
        if let Some(crs) = &self.target_crs {
            return Ok(crs.clone());
        }
        // An undefined CRS only wins when no input has one.
        footprints
            .iter()
            .find(|fp| !fp.crs.is_undefined())
            .or_else(|| footprints.first())
            .map(|fp| fp.crs.clone())
            .ok_or_else(|| CompositeError::Configuration("no input rasters to build a grid from".to_string()))
    }

    pub fn resolve(&self, footprints: &[RasterFootprint]) -> Result<CanonicalGrid> {
        let target = self.target_crs(footprints)?;

        let mut union: Option<Extent> = None;
        let mut pixel_width = f64::INFINITY;
        let mut pixel_height = f64::INFINITY;

        for fp in footprints {
            let label = fp.path.display().to_string();
            if !fp.geotransform.is_invertible() {
                return Err(CompositeError::Geometry(format!(
                    "{}: geotransform {:?} is singular",
                    label,
                    fp.geotransform.to_gdal()
                )));
            }

            let native = fp.extent();
            native.ensure_valid(&label)?;

            let reprojection = Reprojection::between(&fp.crs, &target)
                .map_err(|e| CompositeError::Geometry(format!("{}: {}", label, e)))?;
            let extent = reprojection
                .extent_to_target(&native)
                .map_err(|e| CompositeError::Geometry(format!("{}: {}", label, e)))?;
            extent.ensure_valid(&label)?;

            let (xres, yres) = if reprojection.is_identity() {
                fp.geotransform.resolution()
            } else {
                (
                    extent.width() / fp.width as f64,
                    extent.height() / fp.height as f64,
                )
            };
            debug!(
                "{}: extent {:?}, resolution {:.6} x {:.6}",
                label, extent, xres, yres
            );

            pixel_width = pixel_width.min(xres);
            pixel_height = pixel_height.min(yres);
            union = Some(match union {
                Some(acc) => acc.union(&extent),
                None => extent,
            });
        }

        let union = union.ok_or_else(|| {
            CompositeError::Configuration("no input rasters to build a grid from".to_string())
        })?;
        if !(pixel_width.is_finite() && pixel_width > 0.0 && pixel_height.is_finite() && pixel_height > 0.0) {
            return Err(CompositeError::Geometry(format!(
                "degenerate resolution {} x {}",
                pixel_width, pixel_height
            )));
        }

        let width = cells_covering(union.width(), pixel_width);
        let height = cells_covering(union.height(), pixel_height);
        let extent = Extent::new(
            union.min_x,
            union.max_y - height as f64 * pixel_height,
            union.min_x + width as f64 * pixel_width,
            union.max_y,
        );

        info!(
            "Canonical grid: {}x{} px at {:.6} x {:.6}, CRS {}",
            width,
            height,
            pixel_width,
            pixel_height,
            target.label()
        );

        Ok(CanonicalGrid {
            extent,
            pixel_width,
            pixel_height,
            width,
            height,
            crs: target,
        })
    }
}
