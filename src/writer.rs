use crate::creation;
use crate::crs::Crs;
use crate::error::{CompositeError, Result};
use crate::geometry::GeoTransform;
use crate::grid::CanonicalGrid;
use crate::median::MedianComposite;
use crate::tiling::TileBounds;
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalDataType, GdalType};
use gdal::{Dataset, Driver, DriverManager, Metadata};
use log::{debug, info, warn};
use ndarray::{Array3, ArrayView2, Axis};
use num_traits::NumCast;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl OutputType {
    pub fn from_gdal(data_type: GdalDataType) -> Option<Self> {
        match data_type {
            GdalDataType::UInt8 => Some(OutputType::UInt8),
            GdalDataType::UInt16 => Some(OutputType::UInt16),
            GdalDataType::Int16 => Some(OutputType::Int16),
            GdalDataType::UInt32 => Some(OutputType::UInt32),
            GdalDataType::Int32 => Some(OutputType::Int32),
            GdalDataType::Float32 => Some(OutputType::Float32),
            GdalDataType::Float64 => Some(OutputType::Float64),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputType::UInt8 => "uint8",
            OutputType::UInt16 => "uint16",
            OutputType::Int16 => "int16",
            OutputType::UInt32 => "uint32",
            OutputType::Int32 => "int32",
            OutputType::Float32 => "float32",
            OutputType::Float64 => "float64",
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, OutputType::Float32 | OutputType::Float64)
    }

    /// Inclusive representable range.
    pub fn range(&self) -> (f64, f64) {
        match self {
            OutputType::UInt8 => (u8::MIN as f64, u8::MAX as f64),
            OutputType::UInt16 => (u16::MIN as f64, u16::MAX as f64),
            OutputType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            OutputType::UInt32 => (u32::MIN as f64, u32::MAX as f64),
            OutputType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            OutputType::Float32 => (f32::MIN as f64, f32::MAX as f64),
            OutputType::Float64 => (f64::MIN, f64::MAX),
        }
    }

    /// Nodata used when neither the configuration nor the inputs name one.
    pub fn default_nodata(&self) -> f64 {
        if self.is_integer() {
            0.0
        } else {
            f64::NAN
        }
    }

    /// Reject a nodata sentinel the type cannot store exactly.
    pub fn validate_nodata(&self, nodata: f64) -> Result<()> {
        if nodata.is_nan() {
            if self.is_integer() {
                return Err(CompositeError::TypeMismatch(format!(
                    "nodata NaN cannot be stored as {}",
                    self.name()
                )));
            }
            return Ok(());
        }
        let (lo, hi) = self.range();
        if nodata < lo || nodata > hi || (self.is_integer() && nodata.fract() != 0.0) {
            return Err(CompositeError::TypeMismatch(format!(
                "nodata {} is not representable as {}",
                nodata,
                self.name()
            )));
        }
        Ok(())
    }
}

/// Counts of lossy conversions performed while casting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CastReport {
    pub rounded: usize,
    pub clamped: usize,
    /// Valid medians that landed on the nodata sentinel.
    pub nodata_collisions: usize,
}

impl CastReport {
    fn merge(&mut self, other: CastReport) {
        self.rounded += other.rounded;
        self.clamped += other.clamped;
        self.nodata_collisions += other.nodata_collisions;
    }
}

/// Convert f64 medians to `T` under the output type's policy.
///
/// NaN marks a cell without valid samples and is written as `nodata`.
/// Fractional medians bound for integer types are rounded to nearest (ties
/// away from zero). Values outside the type's range are a `TypeMismatch`
/// unless `allow_truncation` is set, in which case they saturate.
pub fn cast_samples<T: NumCast + Copy>(
    values: ArrayView2<f64>,
    output_type: OutputType,
    nodata: f64,
    allow_truncation: bool,
) -> Result<(Vec<T>, CastReport)> {
    let (lo, hi) = output_type.range();
    let mut report = CastReport::default();
    let mut out = Vec::with_capacity(values.len());

    for &value in values.iter() {
        let mut v = value;
        if v.is_nan() {
            v = nodata;
        } else {
            if output_type.is_integer() && v.fract() != 0.0 {
                v = v.round();
                report.rounded += 1;
            }
            if v < lo || v > hi {
                if !allow_truncation {
                    return Err(CompositeError::TypeMismatch(format!(
                        "median {} is outside the {} range [{}, {}]; set allow_truncation or choose a wider output_type",
                        value,
                        output_type.name(),
                        lo,
                        hi
                    )));
                }
                v = v.clamp(lo, hi);
                report.clamped += 1;
            }
            if v == nodata {
                report.nodata_collisions += 1;
            }
        }

        let cast = T::from(v).ok_or_else(|| {
            CompositeError::TypeMismatch(format!("cannot cast {} to {}", value, output_type.name()))
        })?;
        out.push(cast);
    }

    Ok((out, report))
}

/// Everything the output file needs besides its pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeProfile {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geotransform: GeoTransform,
    pub crs: Crs,
    pub output_type: OutputType,
    pub nodata: f64,
    pub driver: String,
}

impl CompositeProfile {
    pub fn from_grid(
        grid: &CanonicalGrid,
        band_count: usize,
        output_type: OutputType,
        nodata: f64,
        driver: &str,
    ) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            band_count,
            geotransform: grid.geotransform(),
            crs: grid.crs.clone(),
            output_type,
            nodata,
            driver: driver.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    pub allow_truncation: bool,
    pub creation_options: Vec<String>,
    pub overviews: bool,
}

pub struct CompositeWriter {
    profile: CompositeProfile,
    options: WriterOptions,
}

impl CompositeWriter {
    pub fn new(profile: CompositeProfile, options: WriterOptions) -> Result<Self> {
        profile.output_type.validate_nodata(profile.nodata)?;
        Ok(Self { profile, options })
    }

    pub fn profile(&self) -> &CompositeProfile {
        &self.profile
    }

    /// Resolve the configured driver, checking it can create datasets.
    pub fn driver(&self) -> Result<Driver> {
        let name = &self.profile.driver;
        let driver = DriverManager::get_driver_by_name(name)
            .map_err(|e| CompositeError::Io(format!("unsupported driver {}: {}", name, e)))?;
        if driver.metadata_item("DCAP_CREATE", "").is_none() {
            return Err(CompositeError::Io(format!(
                "driver {} cannot create datasets directly",
                name
            )));
        }
        Ok(driver)
    }

    /// Create (or overwrite) the output file, ready for tiles.
    pub fn create(&self, path: &Path) -> Result<OutputRaster> {
        let driver = self.driver()?;
        info!(
            "Creating output raster: {} ({} x {} x {} bands, {}, driver {})",
            path.display(),
            self.profile.width,
            self.profile.height,
            self.profile.band_count,
            self.profile.output_type.name(),
            self.profile.driver
        );

        let mut options = CslStringList::new();
        for opt in &self.options.creation_options {
            options.add_string(opt)?;
        }

        let dataset = create_dataset(&driver, path, &self.profile, &options)
            .map_err(|e| CompositeError::Io(format!("cannot create {}: {}", path.display(), e)))?;

        // From here on a failure must not leave a half-written file behind.
        let mut output = OutputRaster {
            dataset: Some(dataset),
            path: path.to_path_buf(),
            profile: self.profile.clone(),
            allow_truncation: self.options.allow_truncation,
            overviews: self.options.overviews,
            report: CastReport::default(),
            committed: false,
        };
        if let Some(dataset) = output.dataset.as_mut() {
            apply_profile(dataset, &self.profile)?;
        }
        Ok(output)
    }

    /// Write a complete in-memory composite in one go.
    pub fn write(&self, composite: &MedianComposite, path: &Path) -> Result<CastReport> {
        let expected = (self.profile.band_count, self.profile.height, self.profile.width);
        if composite.data.dim() != expected {
            return Err(CompositeError::Validation(format!(
                "composite shape {:?} does not match output {:?}",
                composite.data.dim(),
                expected
            )));
        }
        let mut output = self.create(path)?;
        let tile = TileBounds::full(self.profile.width, self.profile.height);
        output.write_tile(&tile, &composite.data)?;
        output.finish()
    }
}

/// Georeferencing and per-band nodata for a freshly created dataset.
fn apply_profile(dataset: &mut Dataset, profile: &CompositeProfile) -> Result<()> {
    dataset.set_geo_transform(&profile.geotransform.to_gdal())?;
    if !profile.crs.is_undefined() {
        dataset.set_projection(profile.crs.wkt())?;
    }
    for band_index in 1..=profile.band_count {
        let mut band = dataset.rasterband(band_index)?;
        band.set_no_data_value(Some(profile.nodata))?;
        band.set_description(&format!("median_b{}", band_index))?;
    }
    Ok(())
}

fn create_dataset(
    driver: &Driver,
    path: &Path,
    profile: &CompositeProfile,
    options: &CslStringList,
) -> Result<Dataset> {
    let (w, h, b) = (profile.width, profile.height, profile.band_count);
    let dataset = match profile.output_type {
        OutputType::UInt8 => driver.create_with_band_type_with_options::<u8, _>(path, w, h, b, options)?,
        OutputType::UInt16 => driver.create_with_band_type_with_options::<u16, _>(path, w, h, b, options)?,
        OutputType::Int16 => driver.create_with_band_type_with_options::<i16, _>(path, w, h, b, options)?,
        OutputType::UInt32 => driver.create_with_band_type_with_options::<u32, _>(path, w, h, b, options)?,
        OutputType::Int32 => driver.create_with_band_type_with_options::<i32, _>(path, w, h, b, options)?,
        OutputType::Float32 => driver.create_with_band_type_with_options::<f32, _>(path, w, h, b, options)?,
        OutputType::Float64 => driver.create_with_band_type_with_options::<f64, _>(path, w, h, b, options)?,
    };
    Ok(dataset)
}

/// An output file being written. Dropped without `finish`, it is removed.
pub struct OutputRaster {
    dataset: Option<Dataset>,
    path: PathBuf,
    profile: CompositeProfile,
    allow_truncation: bool,
    overviews: bool,
    report: CastReport,
    committed: bool,
}

impl OutputRaster {
    /// Write all bands of a `band x row x column` tile at its grid position.
    pub fn write_tile(&mut self, tile: &TileBounds, data: &Array3<f64>) -> Result<()> {
        let expected = (self.profile.band_count, tile.height(), tile.width());
        if data.dim() != expected {
            return Err(CompositeError::Validation(format!(
                "tile data {:?} does not match tile {:?}",
                data.dim(),
                expected
            )));
        }

        match self.profile.output_type {
            OutputType::UInt8 => self.write_typed::<u8>(tile, data),
            OutputType::UInt16 => self.write_typed::<u16>(tile, data),
            OutputType::Int16 => self.write_typed::<i16>(tile, data),
            OutputType::UInt32 => self.write_typed::<u32>(tile, data),
            OutputType::Int32 => self.write_typed::<i32>(tile, data),
            OutputType::Float32 => self.write_typed::<f32>(tile, data),
            OutputType::Float64 => self.write_typed::<f64>(tile, data),
        }
    }

    fn write_typed<T: GdalType + NumCast + Copy>(
        &mut self,
        tile: &TileBounds,
        data: &Array3<f64>,
    ) -> Result<()> {
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| CompositeError::Io("output dataset already closed".to_string()))?;

        for (band_idx, band_data) in data.axis_iter(Axis(0)).enumerate() {
            let (values, report) =
                cast_samples::<T>(
                band_data,
                self.profile.output_type,
                self.profile.nodata,
                self.allow_truncation,
            )?;
            self.report.merge(report);

            let mut raster_band = dataset.rasterband(band_idx + 1)?;
            let mut buffer = Buffer::new((tile.width(), tile.height()), values);
            raster_band.write(
                (tile.x_min as isize, tile.y_min as isize),
                (tile.width(), tile.height()),
                &mut buffer,
            )?;
        }

        debug!(
            "Wrote tile at ({},{}) size {}x{}",
            tile.x_min,
            tile.y_min,
            tile.width(),
            tile.height()
        );
        Ok(())
    }

    /// Build overviews if requested, close the file and keep it.
    pub fn finish(mut self) -> Result<CastReport> {
        if let Some(dataset) = self.dataset.as_mut() {
            if self.overviews {
                creation::build_overviews(dataset)?;
            }
        }
        // Closing flushes to disk.
        self.dataset.take();
        self.committed = true;

        if self.report.rounded > 0 {
            warn!(
                "{} fractional medians rounded to {}",
                self.report.rounded,
                self.profile.output_type.name()
            );
        }
        if self.report.clamped > 0 {
            warn!(
                "{} medians saturated to the {} range (allow_truncation)",
                self.report.clamped,
                self.profile.output_type.name()
            );
        }
        if self.report.nodata_collisions > 0 {
            warn!(
                "{} valid medians equal the nodata value {} and will read back as nodata",
                self.report.nodata_collisions,
                self.profile.nodata
            );
        }
        info!("Successfully wrote {}", self.path.display());
        Ok(self.report)
    }
}

impl Drop for OutputRaster {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.dataset.take();
        match fs::remove_file(&self.path) {
            Ok(()) => warn!("Removed incomplete output {}", self.path.display()),
            Err(e) => warn!(
                "Could not remove incomplete output {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
