// THEORY:
// Every engine in this crate is a pure function over caller-owned frames, so the
// only things that can go wrong are bad geometry and bad parameters handed in at
// the boundary. Those are rejected up front with a descriptive error instead of
// being clamped silently and read out of bounds later. The remaining variants
// wrap the I/O edges (PNG files, JSON config) and the worker pool plumbing.

use thiserror::Error;

/// The single error type shared by all `flowlens` modules.
#[derive(Debug, Error)]
pub enum VisionError {
    /// Width, height and buffer length disagree, or two frames differ in size.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A scalar parameter is outside its accepted range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The parallel worker pool could not accept or answer a task.
    #[error("worker pool: {0}")]
    WorkerPool(&'static str),
}

impl VisionError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        VisionError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;
