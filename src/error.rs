use std::path::PathBuf;
use thiserror::Error;

/// Errors from mask loading and the aggregation engine.
#[derive(Debug, Error)]
pub enum MaskError {
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("volumes are not on the same grid ({0}); resample before composing")]
    GridMismatch(String),

    #[error("label {label} shifted by {shift} leaves the supported label range")]
    LabelRangeExceeded { label: u16, shift: u16 },

    #[error("collision set is non-empty but the foreground has no labels")]
    EmptyForegroundCollision,

    #[error("voxel value {value} in {path:?} is not a non-negative integer label")]
    InvalidLabelValue { value: f32, path: PathBuf },

    #[error("expected a 3D volume, got {0} dimensions")]
    NotThreeDimensional(usize),

    #[error("image shape {image:?} does not match mask shape {mask:?}")]
    ShapeMismatch { image: Vec<usize>, mask: Vec<usize> },

    #[error("bad glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::error::NiftiError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mask operations.
pub type Result<T> = std::result::Result<T, MaskError>;
