use thiserror::Error;

use crate::canvas::{MAX_DIM, MIN_DIM};

/// Error type for editor operations.
///
/// Most variants are recovered inside [`crate::project::Editor`] (clamped,
/// logged, or swallowed); they surface as values only from the lower-level
/// APIs and from the CLI.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("invalid canvas size {width}×{height} (each side must be {min}–{max})", min = MIN_DIM, max = MAX_DIM)]
    InvalidDimension { width: u32, height: u32 },

    #[error("session restore failed: {0}")]
    RestoreFailed(String),

    #[error("session write failed: {0}")]
    PersistenceWriteFailed(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, EditorError>;
