#![allow(dead_code)]

use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager};
use median_composite::CompositeConfig;
use std::path::Path;

/// UTM zone 33N, exported by GDAL so comparisons stay string-identical.
pub fn utm33_wkt() -> String {
    SpatialRef::from_epsg(32633).unwrap().to_wkt().unwrap()
}

pub fn utm34_wkt() -> String {
    SpatialRef::from_epsg(32634).unwrap().to_wkt().unwrap()
}

/// Project a WGS 84 longitude/latitude into `epsg`, x = easting.
pub fn project_lonlat(epsg: u32, lon: f64, lat: f64) -> (f64, f64) {
    let mut geographic = SpatialRef::from_epsg(4326).unwrap();
    geographic.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    let mut projected = SpatialRef::from_epsg(epsg).unwrap();
    projected.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    let transform = CoordTransform::new(&geographic, &projected).unwrap();
    let mut xs = [lon];
    let mut ys = [lat];
    transform.transform_coords(&mut xs, &mut ys, &mut []).unwrap();
    (xs[0], ys[0])
}

pub fn write_raster<T: GdalType + Copy>(
    path: &Path,
    bands: &[Vec<T>],
    width: usize,
    height: usize,
    geotransform: [f64; 6],
    wkt: &str,
    nodata: Option<f64>,
) {
    let per_band = vec![nodata; bands.len()];
    write_raster_with_band_nodata(path, bands, width, height, geotransform, wkt, &per_band);
}

pub fn write_raster_with_band_nodata<T: GdalType + Copy>(
    path: &Path,
    bands: &[Vec<T>],
    width: usize,
    height: usize,
    geotransform: [f64; 6],
    wkt: &str,
    nodata: &[Option<f64>],
) {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<T, _>(path, width, height, bands.len())
        .unwrap();
    dataset.set_geo_transform(&geotransform).unwrap();
    if !wkt.is_empty() {
        dataset.set_projection(wkt).unwrap();
    }
    for (i, data) in bands.iter().enumerate() {
        let mut band = dataset.rasterband(i + 1).unwrap();
        if let Some(nd) = nodata[i] {
            band.set_no_data_value(Some(nd)).unwrap();
        }
        let mut buffer = Buffer::new((width, height), data.clone());
        band.write((0, 0), (width, height), &mut buffer).unwrap();
    }
}

pub struct OutputBand {
    pub values: Vec<f64>,
    pub width: usize,
    pub height: usize,
    pub nodata: Option<f64>,
}

pub fn read_band(path: &Path, band_index: usize) -> OutputBand {
    let dataset = Dataset::open(path).unwrap();
    let band = dataset.rasterband(band_index).unwrap();
    let (width, height) = (band.x_size() as usize, band.y_size() as usize);
    let buffer = band
        .read_as::<f64>((0, 0), (width, height), (width, height), None)
        .unwrap();
    OutputBand {
        values: buffer.into_iter().collect(),
        width,
        height,
        nodata: band.no_data_value(),
    }
}

pub fn config(input: &Path, output: &Path, bands: usize, extra: &str) -> CompositeConfig {
    let yaml = format!(
        "output_path: {}\nnumber_of_bands: {}\ninput_folder: {}\n{}",
        output.display(),
        bands,
        input.display(),
        extra
    );
    CompositeConfig::from_yaml_str(&yaml).unwrap()
}
