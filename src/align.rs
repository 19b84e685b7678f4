use crate::crs::Reprojection;
use crate::error::{CompositeError, Result};
use crate::geometry::GeoTransform;
use crate::grid::CanonicalGrid;
use crate::raster::{PixelWindow, RasterFootprint, RasterImage};
use crate::tiling::TileBounds;
use log::debug;
use ndarray::{Array2, ArrayView2, Axis, Zip};
use rayon::prelude::*;
use serde::Deserialize;

/// Spacing of interior lattice cells when locating a source window.
const LATTICE_STEP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// Never invents intensities, so the median sees only observed values.
    #[default]
    Nearest,
    Bilinear,
}

/// One band of one image on the canonical grid (or one tile of it).
#[derive(Debug, Clone)]
pub struct AlignedBand {
    pub data: Array2<f64>,
    /// False where the source had nodata or does not reach the cell.
    pub mask: Array2<bool>,
}

impl AlignedBand {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&valid| valid).count()
    }
}

/// Fractional source pixel position of every cell in a tile.
struct SourceMapping {
    cols: Array2<f64>,
    rows: Array2<f64>,
}

pub struct Aligner<'a> {
    grid: &'a CanonicalGrid,
    resampling: Resampling,
}

impl<'a> Aligner<'a> {
    pub fn new(grid: &'a CanonicalGrid, resampling: Resampling) -> Self {
        Self { grid, resampling }
    }

    /// Align every band of `image` onto the whole canonical grid.
    pub fn align(&self, image: &RasterImage) -> Result<Vec<AlignedBand>> {
        let reprojection = Reprojection::between(&image.crs, &self.grid.crs)?;
        let tile = TileBounds::full(self.grid.width, self.grid.height);
        self.align_tile(image, &reprojection, &tile)
    }

    /// Align every band of `image` onto one tile of the canonical grid.
    ///
    /// `image` may be a window of a larger raster; cells outside it are
    /// treated as uncovered.
    pub fn align_tile(
        &self,
        image: &RasterImage,
        reprojection: &Reprojection,
        tile: &TileBounds,
    ) -> Result<Vec<AlignedBand>> {
        ensure_invertible(&image.geotransform, image)?;

        let cells: Vec<(usize, usize)> = (tile.y_min..tile.y_max)
            .flat_map(|row| (tile.x_min..tile.x_max).map(move |col| (row, col)))
            .collect();
        let (cols, rows) = self.map_cells(&image.geotransform, reprojection, &cells)?;
        let mapping = SourceMapping {
            cols: Array2::from_shape_vec(tile.shape(), cols)?,
            rows: Array2::from_shape_vec(tile.shape(), rows)?,
        };

        let resampling = self.resampling;
        let bands: Vec<AlignedBand> = (0..image.band_count())
            .into_par_iter()
            .map(|band_idx| {
                let band = image.data.index_axis(Axis(0), band_idx);
                resample_band(image, band_idx, &band, &mapping, resampling)
            })
            .collect();

        debug!(
            "Aligned {} bands of {} onto tile {:?}",
            bands.len(),
            image.path.display(),
            tile
        );
        Ok(bands)
    }

    /// Source pixel window needed to align `tile`, or `None` when the
    /// source does not reach it.
    pub fn source_window(
        &self,
        footprint: &RasterFootprint,
        reprojection: &Reprojection,
        tile: &TileBounds,
    ) -> Result<Option<PixelWindow>> {
        if !footprint.geotransform.is_invertible() {
            return Err(CompositeError::Geometry(format!(
                "{}: geotransform is singular",
                footprint.path.display()
            )));
        }

        let cells = window_cells(tile);
        let (cols, rows) = self.map_cells(&footprint.geotransform, reprojection, &cells)?;

        let Some((min_c, max_c)) = finite_range(&cols) else {
            return Ok(None);
        };
        let Some((min_r, max_r)) = finite_range(&rows) else {
            return Ok(None);
        };

        let mut pad = match self.resampling {
            Resampling::Nearest => 0.0,
            Resampling::Bilinear => 1.0,
        };
        if !reprojection.is_identity() {
            // Probes are sparse inside the tile; curved mappings need slack.
            pad += 1.0;
        }

        let cols = clamp_range(min_c, max_c, pad, footprint.width);
        let rows = clamp_range(min_r, max_r, pad, footprint.height);
        Ok(match (cols, rows) {
            (Some((c0, c1)), Some((r0, r1))) => Some(PixelWindow {
                col_off: c0,
                row_off: r0,
                cols: c1 - c0,
                rows: r1 - r0,
            }),
            _ => None,
        })
    }

    fn map_cells(
        &self,
        geotransform: &GeoTransform,
        reprojection: &Reprojection,
        cells: &[(usize, usize)],
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = cells
            .iter()
            .map(|&(row, col)| self.grid.cell_center(row, col))
            .unzip();
        reprojection.to_source(&mut xs, &mut ys)?;

        Ok(xs
            .iter()
            .zip(ys.iter())
            .map(|(&x, &y)| geotransform.world_to_pixel(x, y))
            .unzip())
    }
}

fn ensure_invertible(geotransform: &GeoTransform, image: &RasterImage) -> Result<()> {
    if geotransform.is_invertible() {
        Ok(())
    } else {
        Err(CompositeError::Geometry(format!(
            "{}: geotransform {:?} is singular",
            image.path.display(),
            geotransform.to_gdal()
        )))
    }
}

/// Perimeter of the tile plus a sparse interior lattice.
fn window_cells(tile: &TileBounds) -> Vec<(usize, usize)> {
    let mut cells = Vec::new();
    if tile.width() == 0 || tile.height() == 0 {
        return cells;
    }
    let last_row = tile.y_max - 1;
    let last_col = tile.x_max - 1;

    for col in tile.x_min..tile.x_max {
        cells.push((tile.y_min, col));
        cells.push((last_row, col));
    }
    for row in tile.y_min..tile.y_max {
        cells.push((row, tile.x_min));
        cells.push((row, last_col));
    }
    for row in (tile.y_min..tile.y_max).step_by(LATTICE_STEP) {
        for col in (tile.x_min..tile.x_max).step_by(LATTICE_STEP) {
            cells.push((row, col));
        }
    }
    cells
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Half-open pixel index range covering `[min, max]` plus `pad`, clipped to
/// `[0, limit)`.
fn clamp_range(min: f64, max: f64, pad: f64, limit: usize) -> Option<(usize, usize)> {
    let lo = (min.floor() - pad).max(0.0);
    let hi = (max.floor() + 1.0 + pad).min(limit as f64);
    if hi <= lo {
        None
    } else {
        Some((lo as usize, hi as usize))
    }
}

/// Pixel `i` spans `[i, i + 1)`, so nearest-neighbour is a floor.
fn pixel_index(col: f64, row: f64, width: usize, height: usize) -> Option<(usize, usize)> {
    if !col.is_finite() || !row.is_finite() {
        return None;
    }
    let c = col.floor();
    let r = row.floor();
    if c < 0.0 || r < 0.0 || c >= width as f64 || r >= height as f64 {
        return None;
    }
    Some((c as usize, r as usize))
}

fn sample_nearest(
    image: &RasterImage,
    band_idx: usize,
    band: &ArrayView2<f64>,
    col: f64,
    row: f64,
) -> Option<f64> {
    let (c, r) = pixel_index(col, row, image.width(), image.height())?;
    let value = band[[r, c]];
    image.is_valid_sample(band_idx, value).then_some(value)
}

/// Bilinear over pixel centres, renormalised across valid neighbours.
fn sample_bilinear(
    image: &RasterImage,
    band_idx: usize,
    band: &ArrayView2<f64>,
    col: f64,
    row: f64,
) -> Option<f64> {
    // Outside the footprint stays invalid regardless of neighbours.
    pixel_index(col, row, image.width(), image.height())?;

    let x = col - 0.5;
    let y = row - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let neighbours = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1.0, y0, fx * (1.0 - fy)),
        (x0, y0 + 1.0, (1.0 - fx) * fy),
        (x0 + 1.0, y0 + 1.0, fx * fy),
    ];

    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for (nx, ny, weight) in neighbours {
        if weight <= 0.0 {
            continue;
        }
        let Some((c, r)) = pixel_index(nx, ny, image.width(), image.height()) else {
            continue;
        };
        let value = band[[r, c]];
        if image.is_valid_sample(band_idx, value) {
            weighted += weight * value;
            weight_sum += weight;
        }
    }

    (weight_sum > 0.0).then(|| weighted / weight_sum)
}

fn resample_band(
    image: &RasterImage,
    band_idx: usize,
    band: &ArrayView2<f64>,
    mapping: &SourceMapping,
    resampling: Resampling,
) -> AlignedBand {
    let shape = mapping.cols.dim();
    let mut data = Array2::from_elem(shape, f64::NAN);
    let mut mask = Array2::from_elem(shape, false);

    Zip::from(&mut data)
        .and(&mut mask)
        .and(&mapping.cols)
        .and(&mapping.rows)
        .for_each(|value, valid, &col, &row| {
            let sample = match resampling {
                Resampling::Nearest => sample_nearest(image, band_idx, band, col, row),
                Resampling::Bilinear => sample_bilinear(image, band_idx, band, col, row),
            };
            if let Some(v) = sample {
                *value = v;
                *valid = true;
            }
        });

    AlignedBand { data, mask }
}
