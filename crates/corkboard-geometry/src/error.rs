//! Error types for corkboard-geometry.

use thiserror::Error;

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Errors that can occur while converting between coordinate spaces.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The board container has not been laid out yet.
    ///
    /// Scaling a pixel delta needs a non-zero divisor; callers defer the
    /// commit until the container reports a real size.
    #[error("container not measured ({width}x{height} px)")]
    ContainerNotMeasured { width: f64, height: f64 },

    /// A logical span with a zero-length axis.
    #[error("logical span must be non-empty, got {width}x{height}")]
    EmptySpan { width: u32, height: u32 },

    /// Clamp bounds with `min > max`.
    #[error("inverted logical bounds: min {min} > max {max}")]
    InvertedBounds { min: i32, max: i32 },
}
