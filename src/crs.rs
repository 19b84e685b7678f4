use crate::error::{CompositeError, Result};
use crate::geometry::Extent;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use log::{debug, warn};

/// Edge densification used when reprojecting bounding boxes.
const DENSIFY_POINTS: i32 = 21;

/// A coordinate reference system carried as WKT.
///
/// An empty WKT means the raster has no georeferencing beyond its
/// geotransform; such rasters only combine with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    wkt: String,
}

impl Crs {
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self { wkt: wkt.into() }
    }

    /// Parse any GDAL user input (`EPSG:4326`, WKT, PROJ string).
    pub fn from_user_input(definition: &str) -> Result<Self> {
        let srs = SpatialRef::from_definition(definition).map_err(|e| {
            CompositeError::Geometry(format!("invalid CRS {:?}: {}", definition, e))
        })?;
        let wkt = srs.to_wkt().map_err(|e| {
            CompositeError::Geometry(format!("cannot export CRS {:?}: {}", definition, e))
        })?;
        Ok(Self { wkt })
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn is_undefined(&self) -> bool {
        self.wkt.trim().is_empty()
    }

    /// Short human label: the first quoted name in the WKT.
    pub fn label(&self) -> &str {
        if self.is_undefined() {
            return "undefined";
        }
        self.wkt
            .split('"')
            .nth(1)
            .filter(|name| !name.is_empty())
            .unwrap_or("unnamed")
    }

    fn spatial_ref(&self) -> Result<SpatialRef> {
        let mut srs = SpatialRef::from_wkt(&self.wkt).map_err(|e| {
            CompositeError::Alignment(format!("cannot parse CRS {}: {}", self.label(), e))
        })?;
        srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        Ok(srs)
    }

    /// Whether both systems describe the same coordinates.
    pub fn is_equivalent(&self, other: &Crs) -> Result<bool> {
        if self.wkt == other.wkt {
            return Ok(true);
        }
        if self.is_undefined() || other.is_undefined() {
            return Ok(false);
        }
        Ok(self.spatial_ref()? == other.spatial_ref()?)
    }
}

/// PROJ marks failed points with HUGE_VAL instead of an error.
fn finite_or_nan(x: f64, y: f64) -> (f64, f64) {
    if x.is_finite() && y.is_finite() {
        (x, y)
    } else {
        (f64::NAN, f64::NAN)
    }
}

fn coord_transform(from: &Crs, to: &Crs) -> Result<CoordTransform> {
    let from_srs = from.spatial_ref()?;
    let to_srs = to.spatial_ref()?;
    CoordTransform::new(&from_srs, &to_srs).map_err(|e| {
        CompositeError::Alignment(format!(
            "no transform from {} to {}: {}",
            from.label(),
            to.label(),
            e
        ))
    })
}

/// Relationship between one source raster's CRS and the output grid's CRS.
///
/// Holds only WKT so it is `Send + Sync`; GDAL transform objects are built
/// where they are used.
#[derive(Debug, Clone, PartialEq)]
pub enum Reprojection {
    Identity,
    Transform { source: Crs, target: Crs },
}

impl Reprojection {
    /// Reconcile `source` with `target`, failing when no transform exists.
    pub fn between(source: &Crs, target: &Crs) -> Result<Self> {
        if source.is_equivalent(target)? {
            return Ok(Reprojection::Identity);
        }
        if source.is_undefined() || target.is_undefined() {
            return Err(CompositeError::Alignment(format!(
                "cannot relate CRS {} to {}",
                source.label(),
                target.label()
            )));
        }

        // Both directions are needed: bounds forward, cell centres back.
        coord_transform(source, target)?;
        coord_transform(target, source)?;
        debug!("Reprojecting {} -> {}", source.label(), target.label());

        Ok(Reprojection::Transform {
            source: source.clone(),
            target: target.clone(),
        })
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Reprojection::Identity)
    }

    /// Bounding box of a source extent expressed in the target CRS.
    pub fn extent_to_target(&self, extent: &Extent) -> Result<Extent> {
        match self {
            Reprojection::Identity => Ok(*extent),
            Reprojection::Transform { source, target } => {
                let transform = coord_transform(source, target)?;
                let bounds = transform
                    .transform_bounds(&extent.to_bounds(), DENSIFY_POINTS)
                    .map_err(|e| {
                        CompositeError::Alignment(format!(
                            "cannot reproject extent {:?} to {}: {}",
                            extent,
                            target.label(),
                            e
                        ))
                    })?;
                Ok(Extent::from_bounds(bounds))
            }
        }
    }

    /// Transform target-CRS coordinates into the source CRS in place.
    ///
    /// Points GDAL cannot transform become NaN and fall outside any footprint.
    pub fn to_source(&self, xs: &mut [f64], ys: &mut [f64]) -> Result<()> {
        let (source, target) = match self {
            Reprojection::Identity => return Ok(()),
            Reprojection::Transform { source, target } => (source, target),
        };

        let transform = coord_transform(target, source)?;

        // GDAL overwrites the batch even when some points fail, so work on a
        // copy and retry from the untouched originals.
        let mut batch_x = xs.to_vec();
        let mut batch_y = ys.to_vec();
        if transform
            .transform_coords(&mut batch_x, &mut batch_y, &mut [])
            .is_ok()
        {
            for (i, (bx, by)) in batch_x.into_iter().zip(batch_y).enumerate() {
                (xs[i], ys[i]) = finite_or_nan(bx, by);
            }
            return Ok(());
        }

        let mut failed = 0usize;
        for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
            let mut px = [*x];
            let mut py = [*y];
            let (tx, ty) = match transform.transform_coords(&mut px, &mut py, &mut []) {
                Ok(()) => finite_or_nan(px[0], py[0]),
                Err(_) => (f64::NAN, f64::NAN),
            };
            if tx.is_nan() {
                failed += 1;
            }
            *x = tx;
            *y = ty;
        }
        if failed > 0 {
            warn!(
                "{} of {} points could not be transformed to {}",
                failed,
                xs.len(),
                source.label()
            );
        }
        Ok(())
    }
}
