use crate::align::AlignedBand;
use crate::error::{CompositeError, Result};
use crate::writer::CompositeProfile;
use log::debug;
use ndarray::{Array2, Array3, Axis};
use rayon::prelude::*;

/// Median of `values`, reordering them in place (quickselect).
///
/// Even counts average the two middle values. Returns `None` when empty.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    let len = values.len();
    if len == 0 {
        return None;
    }

    let mid = len / 2;
    let (lower, upper_mid, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper_mid;
    if len % 2 == 1 {
        Some(upper)
    } else {
        let lower_max = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((lower_max + upper) * 0.5)
    }
}

/// Per-band median stack of every image, with output cast deferred.
#[derive(Debug, Clone)]
pub struct MedianComposite {
    pub data: Array3<f64>,
    pub profile: CompositeProfile,
}

impl MedianComposite {
    pub fn new(data: Array3<f64>, profile: CompositeProfile) -> Result<Self> {
        let expected = (profile.band_count, profile.height, profile.width);
        if data.dim() != expected {
            return Err(CompositeError::Validation(format!(
                "composite shape {:?} does not match profile {:?}",
                data.dim(),
                expected
            )));
        }
        Ok(Self { data, profile })
    }
}

pub struct MedianReducer {
    fill: f64,
}

impl MedianReducer {
    /// `fill` goes into cells without a single valid sample.
    pub fn new(fill: f64) -> Self {
        Self { fill }
    }

    /// Reduce aligned bands, grouped per image, to `band_count` median bands.
    pub fn reduce(&self, images: &[Vec<AlignedBand>], band_count: usize) -> Result<Array3<f64>> {
        let first = images
            .first()
            .and_then(|bands| bands.first())
            .ok_or_else(|| {
                CompositeError::Validation("no aligned images to reduce".to_string())
            })?;
        let shape = first.shape();

        for (image_idx, bands) in images.iter().enumerate() {
            if bands.len() < band_count {
                return Err(CompositeError::Validation(format!(
                    "image {} supplies {} bands, {} required",
                    image_idx,
                    bands.len(),
                    band_count
                )));
            }
            if let Some(band) = bands.iter().find(|band| band.shape() != shape || band.mask.dim() != shape) {
                return Err(CompositeError::Validation(format!(
                    "image {} has band shape {:?}, expected {:?}",
                    image_idx,
                    band.shape(),
                    shape
                )));
            }
        }

        let medians: Vec<Array2<f64>> = (0..band_count)
            .map(|band_idx| {
                let stack: Vec<&AlignedBand> = images.iter().map(|bands| &bands[band_idx]).collect();
                debug!("Reducing band {} over {} images", band_idx, stack.len());
                self.reduce_band(&stack, shape)
            })
            .collect::<Result<_>>()?;

        let views: Vec<_> = medians.iter().map(|m| m.view()).collect();
        Ok(ndarray::stack(Axis(0), &views)?)
    }

    fn reduce_band(&self, stack: &[&AlignedBand], (nrows, ncols): (usize, usize)) -> Result<Array2<f64>> {
        let fill = self.fill;

        // Process rows in parallel
        let rows: Vec<Vec<f64>> = (0..nrows)
            .into_par_iter()
            .map(|row| {
                let mut scratch = Vec::with_capacity(stack.len());
                (0..ncols)
                    .map(|col| {
                        scratch.clear();
                        scratch.extend(
                            stack
                                .iter()
                                .filter(|band| band.mask[[row, col]])
                                .map(|band| band.data[[row, col]]),
                        );
                        median_in_place(&mut scratch).unwrap_or(fill)
                    })
                    .collect()
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((nrows, ncols), flat)?)
    }
}
