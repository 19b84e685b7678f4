use crate::crs::Crs;
use crate::error::{CompositeError, Result};
use crate::geometry::{Extent, GeoTransform};
use crate::writer::OutputType;
use gdal::raster::RasterBand;
use gdal::Dataset;
use log::debug;
use ndarray::{Array3, Axis};
use std::path::{Path, PathBuf};

/// Everything about a raster except its pixels.
#[derive(Debug, Clone)]
pub struct RasterFootprint {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geotransform: GeoTransform,
    pub crs: Crs,
    /// Per-band nodata, band 1 first.
    pub nodata: Vec<Option<f64>>,
    pub data_type: Option<OutputType>,
}

impl RasterFootprint {
    pub fn extent(&self) -> Extent {
        self.geotransform.extent(self.width, self.height)
    }

    pub fn band_nodata(&self, band_idx: usize) -> Option<f64> {
        self.nodata.get(band_idx).copied().flatten()
    }
}

/// Pixel window inside a raster, in source pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl PixelWindow {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            col_off: 0,
            row_off: 0,
            cols: width,
            rows: height,
        }
    }
}

/// Pixels of one raster (or one window of it), band x row x column.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub path: PathBuf,
    pub data: Array3<f64>,
    pub geotransform: GeoTransform,
    pub crs: Crs,
    pub nodata: Vec<Option<f64>>,
}

impl RasterImage {
    /// `nodata` applies to every band; see `with_band_nodata`.
    pub fn new(
        path: impl Into<PathBuf>,
        data: Array3<f64>,
        geotransform: GeoTransform,
        crs: Crs,
        nodata: Option<f64>,
    ) -> Self {
        let nodata = vec![nodata; data.len_of(Axis(0))];
        Self {
            path: path.into(),
            data,
            geotransform,
            crs,
            nodata,
        }
    }

    pub fn with_band_nodata(mut self, nodata: Vec<Option<f64>>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn band_nodata(&self, band_idx: usize) -> Option<f64> {
        self.nodata.get(band_idx).copied().flatten()
    }

    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn extent(&self) -> Extent {
        self.geotransform.extent(self.width(), self.height())
    }

    pub fn footprint(&self) -> RasterFootprint {
        RasterFootprint {
            path: self.path.clone(),
            width: self.width(),
            height: self.height(),
            band_count: self.band_count(),
            geotransform: self.geotransform,
            crs: self.crs.clone(),
            nodata: self.nodata.clone(),
            data_type: None,
        }
    }

    /// NaN and the band's nodata sentinel are never observations.
    pub fn is_valid_sample(&self, band_idx: usize, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        match self.band_nodata(band_idx) {
            Some(nd) if nd.is_nan() => true,
            Some(nd) => value != nd,
            None => true,
        }
    }
}

/// An open raster file. The GDAL handle is released when this is dropped.
pub struct RasterSource {
    dataset: Dataset,
    footprint: RasterFootprint,
}

impl RasterSource {
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening input raster: {}", path.display());
        let dataset = Dataset::open(path)
            .map_err(|e| CompositeError::Io(format!("cannot open {}: {}", path.display(), e)))?;
        let footprint = extract_footprint(&dataset, path)?;
        Ok(Self { dataset, footprint })
    }

    pub fn footprint(&self) -> &RasterFootprint {
        &self.footprint
    }

    pub fn path(&self) -> &Path {
        &self.footprint.path
    }

    /// Read the first `bands` bands in full.
    pub fn read_image(&self, bands: usize) -> Result<RasterImage> {
        let window = PixelWindow::full(self.footprint.width, self.footprint.height);
        self.read_window(&window, bands)
    }

    /// Read the first `bands` bands of a window as f64 samples.
    pub fn read_window(&self, window: &PixelWindow, bands: usize) -> Result<RasterImage> {
        if bands > self.footprint.band_count {
            return Err(CompositeError::Validation(format!(
                "{} has {} bands, {} requested",
                self.footprint.path.display(),
                self.footprint.band_count,
                bands
            )));
        }
        if window.col_off + window.cols > self.footprint.width
            || window.row_off + window.rows > self.footprint.height
        {
            return Err(CompositeError::Io(format!(
                "window {:?} exceeds {}x{} raster {}",
                window,
                self.footprint.width,
                self.footprint.height,
                self.footprint.path.display()
            )));
        }

        debug!(
            "Reading {}: offset=({},{}), size=({},{}), bands={}",
            self.footprint.path.display(),
            window.col_off,
            window.row_off,
            window.cols,
            window.rows,
            bands
        );

        let mut samples = Vec::with_capacity(bands * window.rows * window.cols);
        for band_index in 1..=bands {
            let rasterband: RasterBand = self.dataset.rasterband(band_index)?;
            let buffer = rasterband.read_as::<f64>(
                (window.col_off as isize, window.row_off as isize),
                (window.cols, window.rows),
                (window.cols, window.rows),
                None,
            )?;
            samples.extend(buffer.into_iter());
        }
        let data = Array3::from_shape_vec((bands, window.rows, window.cols), samples)?;

        Ok(RasterImage::new(
            self.footprint.path.clone(),
            data,
            self.footprint.geotransform.offset(window.col_off, window.row_off),
            self.footprint.crs.clone(),
            None,
        )
        .with_band_nodata(self.footprint.nodata.iter().take(bands).copied().collect()))
    }
}

/// Extract metadata from a dataset without reading pixel data
fn extract_footprint(dataset: &Dataset, path: &Path) -> Result<RasterFootprint> {
    let band_count = dataset.raster_count() as usize;
    if band_count == 0 {
        return Err(CompositeError::Io(format!(
            "{} contains no raster bands",
            path.display()
        )));
    }

    let rasterband: RasterBand = dataset.rasterband(1)?;
    let width = rasterband.x_size() as usize;
    let height = rasterband.y_size() as usize;
    if width == 0 || height == 0 {
        return Err(CompositeError::Io(format!(
            "{} has invalid dimensions {}x{}",
            path.display(),
            width,
            height
        )));
    }

    let geotransform = dataset.geo_transform().map_err(|e| {
        CompositeError::Io(format!("{} has no geotransform: {}", path.display(), e))
    })?;
    let geotransform = GeoTransform::from_gdal(geotransform);
    let data_type = OutputType::from_gdal(rasterband.band_type());
    let nodata = (1..=band_count)
        .map(|band_index| Ok(dataset.rasterband(band_index)?.no_data_value()))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "{}: {}x{} px, {} bands, pixel size {:.6} x {:.6}",
        path.display(),
        width,
        height,
        band_count,
        geotransform.pixel_width,
        geotransform.pixel_height
    );

    Ok(RasterFootprint {
        path: path.to_path_buf(),
        width,
        height,
        band_count,
        geotransform,
        crs: Crs::from_wkt(dataset.projection()),
        nodata,
        data_type,
    })
}
