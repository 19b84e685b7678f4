use crate::align::{AlignedBand, Aligner, Resampling};
use crate::config::CompositeConfig;
use crate::creation;
use crate::crs::{Crs, Reprojection};
use crate::discovery::discover_inputs;
use crate::error::{CompositeError, Result};
use crate::grid::{CanonicalGrid, GridResolver};
use crate::median::{MedianComposite, MedianReducer};
use crate::raster::{RasterFootprint, RasterImage, RasterSource};
use crate::tiling::{TileBounds, TileGrid};
use crate::writer::{CastReport, CompositeProfile, CompositeWriter, OutputType, WriterOptions};
use log::{debug, info, warn};
use ndarray::Array3;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Outcome of a file-based run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub inputs_used: usize,
    pub inputs_skipped: usize,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub nodata: f64,
    pub cast: CastReport,
}

/// Output sample type and the sentinel written for cells without samples.
#[derive(Debug, Clone, Copy)]
struct OutputEncoding {
    output_type: OutputType,
    nodata: f64,
    /// Neither the configuration nor the input named a sentinel.
    nodata_defaulted: bool,
}

pub struct Compositor {
    config: CompositeConfig,
}

impl Compositor {
    pub fn new(config: CompositeConfig) -> Self {
        Self { config }
    }

    fn resolver(&self) -> Result<GridResolver> {
        let target = match &self.config.target_crs {
            Some(definition) => Some(Crs::from_user_input(definition)?),
            None => None,
        };
        Ok(GridResolver::new(target))
    }

    fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            allow_truncation: self.config.allow_truncation,
            creation_options: creation::creation_options(
                &self.config.driver,
                self.config.compression.as_deref(),
                self.config.block_size,
            ),
            overviews: self.config.overviews,
        }
    }

    /// Output sample type and nodata, from configuration or the first input.
    fn output_encoding(&self, first: &RasterFootprint) -> OutputEncoding {
        let output_type = self
            .config
            .output_type
            .or(first.data_type)
            .unwrap_or(OutputType::Float32);

        let (nodata, nodata_defaulted) = match (self.config.nodata, first.band_nodata(0)) {
            (Some(nd), _) => (nd, false),
            (None, Some(nd)) if output_type.validate_nodata(nd).is_ok() => (nd, false),
            (None, Some(nd)) => {
                let fallback = output_type.default_nodata();
                warn!(
                    "Input nodata {} is not representable as {}, using {}",
                    nd,
                    output_type.name(),
                    fallback
                );
                (fallback, true)
            }
            (None, None) => (output_type.default_nodata(), true),
        };

        info!("Output encoding: {} with nodata {}", output_type.name(), nodata);
        OutputEncoding {
            output_type,
            nodata,
            nodata_defaulted,
        }
    }

    /// Run the whole pipeline against the configured folders.
    pub fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        let resolver = self.resolver()?;

        let paths = discover_inputs(config)?;
        let sources = self.open_sources(&paths)?;
        let opened = sources.len();
        if sources.is_empty() {
            return Err(CompositeError::Validation(format!(
                "no usable rasters under {}",
                config.input_folder.display()
            )));
        }

        let footprints: Vec<RasterFootprint> = sources.iter().map(|s| s.footprint().clone()).collect();
        let target = resolver.target_crs(&footprints)?;
        let usable = reconcile_all(
            sources,
            |source| source.path(),
            |source| Reprojection::between(&source.footprint().crs, &target),
        )?;
        if usable.is_empty() {
            return Err(CompositeError::Validation(
                "no input raster could be related to the output CRS".to_string(),
            ));
        }

        let footprints: Vec<RasterFootprint> =
            usable.iter().map(|(s, _)| s.footprint().clone()).collect();
        let grid = resolver.resolve(&footprints)?;
        let encoding = self.output_encoding(&footprints[0]);
        let profile = CompositeProfile::from_grid(
            &grid,
            config.number_of_bands,
            encoding.output_type,
            encoding.nodata,
            &config.driver,
        );
        let writer = CompositeWriter::new(profile, self.writer_options())?;

        let aligner = Aligner::new(&grid, config.resampling);
        // Empty cells stay NaN until the writer swaps in the sentinel.
        let reducer = MedianReducer::new(f64::NAN);
        let tiles = TileGrid::new(grid.width, grid.height, config.tile_size);

        let mut output = writer.create(&config.output_path)?;
        for (tile_idx, tile) in tiles.iter() {
            debug!("Processing tile {}/{}", tile_idx + 1, tiles.total_tiles);
            let data = self.compose_tile(&aligner, &reducer, &usable, &tile)?;
            output.write_tile(&tile, &data)?;
        }
        let cast = output.finish()?;
        if cast.nodata_collisions > 0 && encoding.nodata_defaulted {
            warn!(
                "nodata {} was chosen by default; set `nodata` to a value outside the data range",
                encoding.nodata
            );
        }

        let summary = RunSummary {
            output_path: config.output_path.clone(),
            inputs_used: usable.len(),
            inputs_skipped: paths.len() - usable.len(),
            width: grid.width,
            height: grid.height,
            band_count: config.number_of_bands,
            nodata: encoding.nodata,
            cast,
        };
        info!(
            "Composited {} of {} inputs ({} opened) into {}x{} x {} bands",
            summary.inputs_used,
            paths.len(),
            opened,
            summary.width,
            summary.height,
            summary.band_count
        );
        Ok(summary)
    }

    /// Open every discovered file, isolating per-file failures.
    fn open_sources(&self, paths: &[PathBuf]) -> Result<Vec<RasterSource>> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let opened = RasterSource::open(path).and_then(|source| {
                let bands = source.footprint().band_count;
                if bands < self.config.number_of_bands {
                    Err(CompositeError::Io(format!(
                        "{} has {} bands, {} required",
                        path.display(),
                        bands,
                        self.config.number_of_bands
                    )))
                } else {
                    Ok(source)
                }
            });

            match opened {
                Ok(source) => sources.push(source),
                Err(e) if self.config.strict || !e.is_recoverable() => return Err(e),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(sources)
    }

    fn compose_tile(
        &self,
        aligner: &Aligner<'_>,
        reducer: &MedianReducer,
        sources: &[(RasterSource, Reprojection)],
        tile: &TileBounds,
    ) -> Result<Array3<f64>> {
        let bands = self.config.number_of_bands;

        // GDAL handles are read one at a time; alignment runs in parallel.
        let mut windows: Vec<(RasterImage, &Reprojection)> = Vec::new();
        for (source, reprojection) in sources {
            if let Some(window) = aligner.source_window(source.footprint(), reprojection, tile)? {
                windows.push((source.read_window(&window, bands)?, reprojection));
            }
        }

        if windows.is_empty() {
            debug!("Tile {:?} has no coverage", tile);
            return Ok(Array3::from_elem((bands, tile.height(), tile.width()), f64::NAN));
        }

        let aligned: Vec<Vec<AlignedBand>> = windows
            .par_iter()
            .map(|(image, reprojection)| aligner.align_tile(image, reprojection, tile))
            .collect::<Result<_>>()?;
        reducer.reduce(&aligned, bands)
    }

    /// Composite images already held in memory onto their canonical grid.
    ///
    /// Cells without a valid sample hold NaN; `CompositeWriter::write` stores
    /// them as the profile's nodata.
    pub fn compose(&self, images: &[RasterImage]) -> Result<MedianComposite> {
        if images.is_empty() {
            return Err(CompositeError::Validation("no images supplied".to_string()));
        }
        let bands = self.config.number_of_bands;
        if let Some(short) = images.iter().find(|img| img.band_count() < bands) {
            return Err(CompositeError::Validation(format!(
                "{} has {} bands, {} required",
                short.path.display(),
                short.band_count(),
                bands
            )));
        }

        let resolver = self.resolver()?;
        let footprints: Vec<RasterFootprint> = images.iter().map(|img| img.footprint()).collect();
        let target = resolver.target_crs(&footprints)?;
        let usable = reconcile_all(
            images.iter().collect::<Vec<&RasterImage>>(),
            |img| img.path.as_path(),
            |img| Reprojection::between(&img.crs, &target),
        )?;
        if usable.is_empty() {
            return Err(CompositeError::Validation(
                "no image could be related to the output CRS".to_string(),
            ));
        }

        let footprints: Vec<RasterFootprint> = usable.iter().map(|(img, _)| img.footprint()).collect();
        let grid = resolver.resolve(&footprints)?;
        let encoding = self.output_encoding(&footprints[0]);
        let data = compose_on_grid(&grid, &usable, self.config.resampling, bands)?;

        let profile = CompositeProfile::from_grid(
            &grid,
            bands,
            encoding.output_type,
            encoding.nodata,
            &self.config.driver,
        );
        MedianComposite::new(data, profile)
    }
}

fn compose_on_grid(
    grid: &CanonicalGrid,
    images: &[(&RasterImage, Reprojection)],
    resampling: Resampling,
    bands: usize,
) -> Result<Array3<f64>> {
    let aligner = Aligner::new(grid, resampling);
    let tile = TileBounds::full(grid.width, grid.height);
    let aligned: Vec<Vec<AlignedBand>> = images
        .par_iter()
        .map(|(image, reprojection)| aligner.align_tile(image, reprojection, &tile))
        .collect::<Result<_>>()?;
    MedianReducer::new(f64::NAN).reduce(&aligned, bands)
}

/// Pair each input with its reprojection, dropping those that cannot be
/// reconciled with the output CRS.
fn reconcile_all<T, P, F>(inputs: Vec<T>, path_of: P, reconcile: F) -> Result<Vec<(T, Reprojection)>>
where
    P: Fn(&T) -> &Path,
    F: Fn(&T) -> Result<Reprojection>,
{
    let mut usable = Vec::with_capacity(inputs.len());
    for input in inputs {
        match reconcile(&input) {
            Ok(reprojection) => usable.push((input, reprojection)),
            Err(e @ CompositeError::Alignment(_)) => {
                warn!("Skipping {}: {}", path_of(&input).display(), e)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(usable)
}
