use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

impl CompositeError {
    /// Per-image failures that leave the rest of the run usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CompositeError::Io(_) | CompositeError::Gdal(_) | CompositeError::Alignment(_)
        )
    }
}

impl From<std::io::Error> for CompositeError {
    fn from(err: std::io::Error) -> Self {
        CompositeError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for CompositeError {
    fn from(err: serde_yaml::Error) -> Self {
        CompositeError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompositeError>;
