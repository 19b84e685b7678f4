mod common;

use common::{
    config, project_lonlat, read_band, utm33_wkt, utm34_wkt, write_raster,
    write_raster_with_band_nodata,
};
use gdal::Dataset;
use median_composite::{
    CompositeError, CompositeWriter, Compositor, RasterImage, RasterSource, WriterOptions,
};
use std::fs;
use std::path::Path;

const ORIGIN_X: f64 = 500_000.0;
const ORIGIN_Y: f64 = 4_200_000.0;

fn utm_transform(x_off: f64, y_off: f64, pixel: f64) -> [f64; 6] {
    [ORIGIN_X + x_off, pixel, 0.0, ORIGIN_Y + y_off, 0.0, -pixel]
}

fn median_of(values: &mut [u16]) -> f64 {
    values.sort_unstable();
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2] as f64
    } else {
        (values[n / 2 - 1] as f64 + values[n / 2] as f64) / 2.0
    }
}

#[test]
fn test_identical_extents_give_exact_median() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();
    let gt = utm_transform(0.0, 0.0, 10.0);

    let scenes: Vec<Vec<u16>> = vec![
        vec![1, 5, 9, 2, 6, 10],
        vec![3, 4, 8, 2, 7, 12],
        vec![2, 6, 7, 9, 1, 11],
    ];
    for (i, band1) in scenes.iter().enumerate() {
        let band2: Vec<u16> = band1.iter().map(|v| v * 10 + i as u16).collect();
        let path = input.path().join(format!("scene_{}.tif", i));
        write_raster(&path, &[band1.clone(), band2], 3, 2, gt, &wkt, None);
    }

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 2, ""))
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 3);
    assert_eq!(summary.inputs_skipped, 0);
    assert_eq!((summary.width, summary.height), (3, 2));

    let band1 = read_band(&output, 1);
    let band2 = read_band(&output, 2);
    for px in 0..6 {
        let mut b1: Vec<u16> = scenes.iter().map(|s| s[px]).collect();
        let mut b2: Vec<u16> = scenes
            .iter()
            .enumerate()
            .map(|(i, s)| s[px] * 10 + i as u16)
            .collect();
        assert_eq!(band1.values[px], median_of(&mut b1), "band 1 pixel {}", px);
        assert_eq!(band2.values[px], median_of(&mut b2), "band 2 pixel {}", px);
    }

    let dataset = Dataset::open(&output).unwrap();
    assert_eq!(dataset.geo_transform().unwrap(), gt);
    assert_eq!(dataset.rasterband(1).unwrap().band_type(), gdal::raster::GdalDataType::UInt16);
}

#[test]
fn test_disjoint_footprints_keep_single_values() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();

    // Two 2x1 scenes with a one-pixel gap between them.
    write_raster(
        &input.path().join("a.tif"),
        &[vec![11u16, 12]],
        2,
        1,
        utm_transform(0.0, 0.0, 10.0),
        &wkt,
        Some(9999.0),
    );
    write_raster(
        &input.path().join("b.tif"),
        &[vec![21u16, 22]],
        2,
        1,
        utm_transform(30.0, 0.0, 10.0),
        &wkt,
        Some(9999.0),
    );

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 1, ""))
        .run()
        .unwrap();
    assert_eq!((summary.width, summary.height), (5, 1));

    let band = read_band(&output, 1);
    assert_eq!(band.nodata, Some(9999.0));
    assert_eq!(band.values, vec![11.0, 12.0, 9999.0, 21.0, 22.0]);
}

#[test]
fn test_all_nodata_pixel_stays_nodata() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();
    let gt = utm_transform(0.0, 0.0, 10.0);

    write_raster(&input.path().join("a.tif"), &[vec![9999u16, 4, 9999]], 3, 1, gt, &wkt, Some(9999.0));
    write_raster(&input.path().join("b.tif"), &[vec![9999u16, 8, 5]], 3, 1, gt, &wkt, Some(9999.0));

    let output = out_dir.path().join("median.tif");
    Compositor::new(config(input.path(), &output, 1, "")).run().unwrap();

    let band = read_band(&output, 1);
    // [nodata, median(4, 8), the only valid value]
    assert_eq!(band.values, vec![9999.0, 6.0, 5.0]);
}

#[test]
fn test_even_count_median_in_float_output() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();
    let gt = utm_transform(0.0, 0.0, 10.0);

    write_raster(&input.path().join("a.tif"), &[vec![2.0f32, 10.0]], 2, 1, gt, &wkt, None);
    write_raster(&input.path().join("b.tif"), &[vec![4.0f32, 15.0]], 2, 1, gt, &wkt, None);

    let output = out_dir.path().join("median.tif");
    Compositor::new(config(input.path(), &output, 1, "output_type: float32\n"))
        .run()
        .unwrap();

    assert_eq!(read_band(&output, 1).values, vec![3.0, 12.5]);
}

#[test]
fn test_integer_output_rounds_fractional_median() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();
    let gt = utm_transform(0.0, 0.0, 10.0);

    write_raster(&input.path().join("a.tif"), &[vec![2u8, 10]], 2, 1, gt, &wkt, None);
    write_raster(&input.path().join("b.tif"), &[vec![5u8, 14]], 2, 1, gt, &wkt, None);

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 1, "output_type: uint8\n"))
        .run()
        .unwrap();

    assert_eq!(read_band(&output, 1).values, vec![4.0, 12.0]);
    assert_eq!(summary.cast.rounded, 1);
}

#[test]
fn test_out_of_range_median_fails_without_output() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();
    let gt = utm_transform(0.0, 0.0, 10.0);

    write_raster(&input.path().join("a.tif"), &[vec![300.0f32]], 1, 1, gt, &wkt, None);
    write_raster(&input.path().join("b.tif"), &[vec![310.0f32]], 1, 1, gt, &wkt, None);

    let output = out_dir.path().join("median.tif");
    let err = Compositor::new(config(input.path(), &output, 1, "output_type: uint8\n"))
        .run()
        .unwrap_err();
    assert!(matches!(err, CompositeError::TypeMismatch(_)));
    assert!(!output.exists());

    // Saturating is opt-in.
    let summary = Compositor::new(config(
        input.path(),
        &output,
        1,
        "output_type: uint8\nallow_truncation: true\n",
    ))
    .run()
    .unwrap();
    assert_eq!(read_band(&output, 1).values, vec![255.0]);
    assert_eq!(summary.cast.clamped, 1);
}

#[test]
fn test_grid_covers_union_at_finest_resolution() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();

    // 4x4 at 10 m covering x 0..40, y 0..40 (relative to the origin, downwards).
    write_raster(
        &input.path().join("fine.tif"),
        &[vec![1u16; 16]],
        4,
        4,
        utm_transform(0.0, 0.0, 10.0),
        &wkt,
        Some(0.0),
    );
    // 2x2 at 20 m covering x 30..70, y -10..-50.
    write_raster(
        &input.path().join("coarse.tif"),
        &[vec![3u16; 4]],
        2,
        2,
        utm_transform(30.0, -10.0, 20.0),
        &wkt,
        Some(0.0),
    );

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 1, ""))
        .run()
        .unwrap();
    assert_eq!((summary.width, summary.height), (7, 5));

    let dataset = Dataset::open(&output).unwrap();
    assert_eq!(dataset.geo_transform().unwrap(), utm_transform(0.0, 0.0, 10.0));

    let band = read_band(&output, 1);
    // Top-left cell only sees the fine scene, bottom-right only the coarse one.
    assert_eq!(band.values[0], 1.0);
    assert_eq!(band.values[7 * 5 - 1], 3.0);
    // Overlap at row 1, col 3 holds one sample of each: median 2.
    assert_eq!(band.values[7 + 3], 2.0);
    // Outside both footprints.
    assert_eq!(band.values[7 * 4], 0.0);
}

#[test]
fn test_small_tiles_match_single_tile() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();

    for i in 0..3u16 {
        let data: Vec<u16> = (0..35u16).map(|v| v * (i + 1) + 1).collect();
        write_raster(
            &input.path().join(format!("s{}.tif", i)),
            &[data],
            7,
            5,
            utm_transform(f64::from(i) * 10.0, 0.0, 10.0),
            &wkt,
            Some(0.0),
        );
    }

    let whole = out_dir.path().join("whole.tif");
    let tiled = out_dir.path().join("tiled.tif");
    Compositor::new(config(input.path(), &whole, 1, "")).run().unwrap();
    Compositor::new(config(input.path(), &tiled, 1, "tile_size: 2\n"))
        .run()
        .unwrap();

    assert_eq!(read_band(&whole, 1).values, read_band(&tiled, 1).values);
}

#[test]
fn test_repeated_runs_are_byte_identical() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();

    for i in 0..4u16 {
        let data: Vec<u16> = (0..12u16).map(|v| (v * 7 + i * 13) % 50 + 1).collect();
        write_raster(
            &input.path().join(format!("scene_{}.tif", i)),
            &[data],
            4,
            3,
            utm_transform(f64::from(i) * 10.0, f64::from(i) * -10.0, 10.0),
            &wkt,
            Some(0.0),
        );
    }

    let first = out_dir.path().join("first.tif");
    let second = out_dir.path().join("second.tif");
    Compositor::new(config(input.path(), &first, 1, "")).run().unwrap();
    Compositor::new(config(input.path(), &second, 1, "")).run().unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_empty_folder_writes_nothing() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("median.tif");

    let err = Compositor::new(config(input.path(), &output, 1, ""))
        .run()
        .unwrap_err();
    assert!(matches!(err, CompositeError::Validation(_)));
    assert!(!output.exists());
}

#[test]
fn test_unreadable_file_is_skipped_unless_strict() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();

    write_raster(
        &input.path().join("scene.tif"),
        &[vec![7u16, 8]],
        2,
        1,
        utm_transform(0.0, 0.0, 10.0),
        &wkt,
        None,
    );
    fs::write(input.path().join("broken.tif"), b"truncated download").unwrap();

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 1, ""))
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 1);
    assert_eq!(summary.inputs_skipped, 1);
    assert_eq!(read_band(&output, 1).values, vec![7.0, 8.0]);

    let strict_output = out_dir.path().join("strict.tif");
    let err = Compositor::new(config(input.path(), &strict_output, 1, "strict: true\n"))
        .run()
        .unwrap_err();
    assert!(matches!(err, CompositeError::Io(_)));
    assert!(!strict_output.exists());
}

#[test]
fn test_too_few_bands_is_skipped() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();
    let gt = utm_transform(0.0, 0.0, 10.0);

    write_raster(&input.path().join("a.tif"), &[vec![1u16], vec![2]], 1, 1, gt, &wkt, None);
    write_raster(&input.path().join("b.tif"), &[vec![5u16]], 1, 1, gt, &wkt, None);

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 2, ""))
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 1);
    assert_eq!(read_band(&output, 2).values, vec![2.0]);
}

#[test]
fn test_undefined_crs_is_skipped() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let gt = utm_transform(0.0, 0.0, 10.0);

    // The ungeoreferenced file sorts first but must not become the target.
    write_raster(&input.path().join("a_local.tif"), &[vec![9u16]], 1, 1, gt, "", None);
    write_raster(&input.path().join("b_utm.tif"), &[vec![4u16]], 1, 1, gt, &utm33_wkt(), None);

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 1, ""))
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 1);
    assert_eq!(summary.inputs_skipped, 1);
    assert_eq!(read_band(&output, 1).values, vec![4.0]);
}

#[test]
fn test_reprojected_output_keeps_source_values() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    // 10x10 at 100 m on the zone 33 central meridian.
    let data: Vec<u16> = (1..=100).collect();
    write_raster(
        &input.path().join("scene.tif"),
        &[data],
        10,
        10,
        [500_000.0, 100.0, 0.0, 5_000_000.0, 0.0, -100.0],
        &utm33_wkt(),
        Some(0.0),
    );

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 1, "target_crs: EPSG:4326\n"))
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 1);

    let dataset = Dataset::open(&output).unwrap();
    assert!(dataset.spatial_ref().unwrap().is_geographic());

    let band = read_band(&output, 1);
    let valid: Vec<f64> = band.values.iter().copied().filter(|v| *v != 0.0).collect();
    assert!(valid.len() >= 50, "only {} valid cells", valid.len());
    assert!(valid.iter().all(|v| (1.0..=100.0).contains(v)));
}

#[test]
fn test_unknown_driver_fails_without_output() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_raster(
        &input.path().join("scene.tif"),
        &[vec![1u16]],
        1,
        1,
        utm_transform(0.0, 0.0, 10.0),
        &utm33_wkt(),
        None,
    );

    let output = out_dir.path().join("median.img");
    let err = Compositor::new(config(input.path(), &output, 1, "driver: NoSuchDriver\n"))
        .run()
        .unwrap_err();
    assert!(matches!(err, CompositeError::Io(_)));
    assert!(!output.exists());
}

#[test]
fn test_compressed_tiled_output() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let data: Vec<u16> = (1..=64).collect();
    write_raster(
        &input.path().join("scene.tif"),
        &[data.clone()],
        8,
        8,
        utm_transform(0.0, 0.0, 10.0),
        &utm33_wkt(),
        None,
    );

    let output = out_dir.path().join("median.tif");
    Compositor::new(config(
        input.path(),
        &output,
        1,
        "compression: deflate\nblock_size: 256\noverviews: true\n",
    ))
    .run()
    .unwrap();

    let expected: Vec<f64> = data.iter().map(|v| f64::from(*v)).collect();
    assert_eq!(read_band(&output, 1).values, expected);
}

#[test]
fn test_valid_zero_median_is_counted_against_default_nodata() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();
    let gt = utm_transform(0.0, 0.0, 10.0);

    // No nodata tag anywhere, so the uint16 output falls back to 0.
    write_raster(&input.path().join("a.tif"), &[vec![0u16, 5]], 2, 1, gt, &wkt, None);
    write_raster(&input.path().join("b.tif"), &[vec![0u16, 7]], 2, 1, gt, &wkt, None);

    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 1, ""))
        .run()
        .unwrap();
    assert_eq!(summary.nodata, 0.0);
    assert_eq!(summary.cast.nodata_collisions, 1);
    assert_eq!(read_band(&output, 1).values, vec![0.0, 6.0]);

    // A configured sentinel outside the data keeps the dark pixel.
    let summary = Compositor::new(config(input.path(), &output, 1, "nodata: 65535\n"))
        .run()
        .unwrap();
    assert_eq!(summary.cast.nodata_collisions, 0);
    let band = read_band(&output, 1);
    assert_eq!(band.nodata, Some(65535.0));
    assert_eq!(band.values, vec![0.0, 6.0]);
}

#[test]
fn test_band_nodata_is_per_band() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();
    let gt = utm_transform(0.0, 0.0, 10.0);
    let nodata = [None, Some(7.0)];

    write_raster_with_band_nodata(
        &input.path().join("a.tif"),
        &[vec![7u16, 7], vec![7, 3]],
        2,
        1,
        gt,
        &wkt,
        &nodata,
    );
    write_raster_with_band_nodata(
        &input.path().join("b.tif"),
        &[vec![9u16, 9], vec![5, 5]],
        2,
        1,
        gt,
        &wkt,
        &nodata,
    );

    let output = out_dir.path().join("median.tif");
    Compositor::new(config(input.path(), &output, 2, "")).run().unwrap();

    // 7 is a real value in band 1 and a sentinel in band 2.
    assert_eq!(read_band(&output, 1).values, vec![8.0, 8.0]);
    assert_eq!(read_band(&output, 2).values, vec![5.0, 4.0]);
}

#[test]
fn test_in_memory_composite_written_by_writer() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();

    let scenes = [
        ("a.tif", vec![4.0f32, 6.0], 0.0),
        ("b.tif", vec![8.0f32, 10.0], 10.0),
        ("c.tif", vec![12.0f32], 50.0),
    ];
    let mut images: Vec<RasterImage> = Vec::new();
    for (name, data, x_off) in &scenes {
        let path = input.path().join(name);
        let width = data.len();
        write_raster(&path, &[data.clone()], width, 1, utm_transform(*x_off, 0.0, 10.0), &wkt, None);
        images.push(RasterSource::open(&path).unwrap().read_image(1).unwrap());
    }

    let output = out_dir.path().join("median.tif");
    let compositor = Compositor::new(config(input.path(), &output, 1, "nodata: -1\n"));
    let composite = compositor.compose(&images).unwrap();
    assert_eq!(composite.data.dim(), (1, 1, 6));
    // Columns 3 and 4 have no samples and stay NaN in memory.
    assert!(composite.data[[0, 0, 3]].is_nan());
    assert!(composite.data[[0, 0, 4]].is_nan());

    let writer = CompositeWriter::new(composite.profile.clone(), WriterOptions::default()).unwrap();
    assert_eq!(writer.profile().width, 6);
    assert_eq!(writer.profile().nodata, -1.0);
    let report = writer.write(&composite, &output).unwrap();
    assert_eq!(report.nodata_collisions, 0);

    let band = read_band(&output, 1);
    assert_eq!(band.nodata, Some(-1.0));
    assert_eq!(band.values, vec![4.0, 7.0, 10.0, -1.0, -1.0, 12.0]);
    let dataset = Dataset::open(&output).unwrap();
    assert_eq!(dataset.geo_transform().unwrap(), utm_transform(0.0, 0.0, 10.0));
}

/// Two 10x10 scenes at 2 km, one per UTM zone, straddling 18 E at 45 N.
/// The zone 34 scene sits about 8 km east of the zone 33 one.
fn write_utm_zone_pair(dir: &Path) {
    let scenes = [
        ("a_utm33.tif", 32633, 18.0, utm33_wkt(), 10u16),
        ("b_utm34.tif", 32634, 18.1, utm34_wkt(), 100u16),
    ];
    for (name, epsg, lon, wkt, base) in scenes {
        let (x, y) = project_lonlat(epsg, lon, 45.0);
        let data: Vec<u16> = (0..100u16).map(|i| base + i % 10).collect();
        write_raster(
            &dir.join(name),
            &[data],
            10,
            10,
            [x - 10_000.0, 2_000.0, 0.0, y + 10_000.0, 0.0, -2_000.0],
            &wkt,
            Some(0.0),
        );
    }
}

fn value_at(output: &Path, lon: f64, lat: f64) -> f64 {
    let gt = Dataset::open(output).unwrap().geo_transform().unwrap();
    let band = read_band(output, 1);
    let (x, y) = project_lonlat(32633, lon, lat);
    let col = ((x - gt[0]) / gt[1]).floor() as usize;
    let row = ((y - gt[3]) / gt[5]).floor() as usize;
    band.values[row * band.width + col]
}

#[test]
fn test_inputs_in_different_utm_zones() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_utm_zone_pair(input.path());

    // Zone 33 values are 10..=19 and zone 34 values 100..=109.
    let output = out_dir.path().join("median.tif");
    let summary = Compositor::new(config(input.path(), &output, 1, "output_type: float32\n"))
        .run()
        .unwrap();
    assert_eq!(summary.inputs_used, 2);

    let dataset = Dataset::open(&output).unwrap();
    assert!(dataset.projection().contains("33N"));

    let west = value_at(&output, 17.91, 45.0);
    assert!((10.0..=19.0).contains(&west), "west {}", west);
    let east = value_at(&output, 18.19, 45.0);
    assert!((100.0..=109.0).contains(&east), "east {}", east);
    // The overlap averages one sample from each zone.
    let overlap = value_at(&output, 18.05, 45.0);
    assert!((55.0..=64.0).contains(&overlap), "overlap {}", overlap);

    let band = read_band(&output, 1);
    assert!(band.values.iter().all(|v| *v == 0.0
        || (10.0..=19.0).contains(v)
        || (100.0..=109.0).contains(v)
        || (55.0..=64.0).contains(v)));
}

#[test]
fn test_bilinear_reprojection_is_tile_independent() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_utm_zone_pair(input.path());

    let whole = out_dir.path().join("whole.tif");
    let tiled = out_dir.path().join("tiled.tif");
    let extra = "resampling: bilinear\noutput_type: float32\n";
    Compositor::new(config(input.path(), &whole, 1, extra)).run().unwrap();
    Compositor::new(config(input.path(), &tiled, 1, &format!("{}tile_size: 2\n", extra)))
        .run()
        .unwrap();

    let whole = read_band(&whole, 1);
    let tiled = read_band(&tiled, 1);
    assert!(whole.values.iter().any(|v| *v != 0.0));
    assert_eq!(whole.values.len(), tiled.values.len());
    // Window origins shift the pixel arithmetic by at most a few ulps.
    for (i, (a, b)) in whole.values.iter().zip(&tiled.values).enumerate() {
        assert!((a - b).abs() < 1e-3, "cell {}: {} vs {}", i, a, b);
    }
}

#[test]
fn test_bilinear_mixed_resolution_is_tile_independent() {
    let input = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let wkt = utm33_wkt();

    let coarse: Vec<u16> = (0..16u16).map(|v| v * 3 + 1).collect();
    write_raster(&input.path().join("coarse.tif"), &[coarse], 4, 4, utm_transform(0.0, 0.0, 20.0), &wkt, Some(0.0));
    let fine: Vec<u16> = (0..36u16).map(|v| 100 + v).collect();
    write_raster(&input.path().join("fine.tif"), &[fine], 6, 6, utm_transform(25.0, -15.0, 10.0), &wkt, Some(0.0));

    let whole = out_dir.path().join("whole.tif");
    let tiled = out_dir.path().join("tiled.tif");
    let extra = "resampling: bilinear\noutput_type: float32\n";
    Compositor::new(config(input.path(), &whole, 1, extra)).run().unwrap();
    Compositor::new(config(input.path(), &tiled, 1, &format!("{}tile_size: 2\n", extra)))
        .run()
        .unwrap();

    assert_eq!(read_band(&whole, 1).values, read_band(&tiled, 1).values);
}
