//! Error taxonomy for the erosion pipeline.

use thiserror::Error;

/// Errors surfaced by the erosion library.
///
/// Degenerate input (an empty or constant field handed to normalization) is
/// not an error: normalization is simply a no-op. Trajectories that hit the
/// per-trajectory iteration ceiling are logged and counted in
/// [`crate::erosion::ErosionStats`] instead of failing the run.
#[derive(Error, Debug)]
pub enum ErosionError {
    #[error("cell ({x}, {y}) is outside a {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("cell ({x}, {y}) became non-finite ({value})")]
    NonFiniteValue { x: usize, y: usize, value: f32 },
    #[error("invalid erosion settings: {0}")]
    InvalidSettings(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ErosionError>;
