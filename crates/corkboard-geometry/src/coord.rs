//! Coordinate value types.
//!
//! Logical positions are integers on a fixed board grid. Deltas and render
//! positions are fractional until they are committed back onto the grid.

use std::ops::{Add, Neg, Sub};

use crate::error::{GeometryError, Result};
use crate::{DEFAULT_MAX_LOGICAL, DEFAULT_MIN_LOGICAL, DEFAULT_SPAN};

/// A card's logical center on the board grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogicalPoint {
    pub x: i32,
    pub y: i32,
}

impl LogicalPoint {
    /// Origin of the board grid.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a new point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Move by a fractional delta, rounding each axis to the nearest grid unit.
    pub fn offset(self, delta: LogicalDelta) -> Self {
        Self {
            x: round_to_grid(f64::from(self.x) + delta.dx),
            y: round_to_grid(f64::from(self.y) + delta.dy),
        }
    }
}

fn round_to_grid(value: f64) -> i32 {
    // Saturating cast; clamping happens afterwards.
    value.round() as i32
}

impl std::fmt::Display for LogicalPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A fractional offset in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogicalDelta {
    pub dx: f64,
    pub dy: f64,
}

impl LogicalDelta {
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

impl Add for LogicalDelta {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            dx: self.dx + other.dx,
            dy: self.dy + other.dy,
        }
    }
}

impl Sub for LogicalDelta {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            dx: self.dx - other.dx,
            dy: self.dy - other.dy,
        }
    }
}

impl Neg for LogicalDelta {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            dx: -self.dx,
            dy: -self.dy,
        }
    }
}

/// A pointer movement in screen pixels, relative to where the drag started.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PixelDelta {
    pub dx: f64,
    pub dy: f64,
}

impl PixelDelta {
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

/// Measured pixel size of the element the board renders into.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    /// A container that has not been laid out yet.
    pub const UNMEASURED: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both axes are strictly positive (and finite).
    pub fn is_measured(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Rendered size of a card in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CardSize {
    pub width: u32,
    pub height: u32,
}

impl CardSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Logical extent of the rendered area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogicalSpan {
    pub width: u32,
    pub height: u32,
}

impl LogicalSpan {
    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }
}

/// Inclusive clamp range applied to both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogicalBounds {
    pub min: i32,
    pub max: i32,
}

impl LogicalBounds {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, point: LogicalPoint) -> bool {
        (self.min..=self.max).contains(&point.x) && (self.min..=self.max).contains(&point.y)
    }
}

/// The fixed logical coordinate space a board lives in.
///
/// `origin` is the logical point rendered at 0%/0%, `span` is the logical
/// distance to 100%, and `bounds` is where stored coordinates are clamped.
/// Bounds may extend past the rendered area so cards can hang off an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogicalSpace {
    pub origin: LogicalPoint,
    pub span: LogicalSpan,
    pub bounds: LogicalBounds,
}

impl Default for LogicalSpace {
    fn default() -> Self {
        Self {
            origin: LogicalPoint::ORIGIN,
            span: LogicalSpan::square(DEFAULT_SPAN),
            bounds: LogicalBounds::new(DEFAULT_MIN_LOGICAL, DEFAULT_MAX_LOGICAL),
        }
    }
}

impl LogicalSpace {
    /// Create a validated space.
    pub fn new(origin: LogicalPoint, span: LogicalSpan, bounds: LogicalBounds) -> Result<Self> {
        let space = Self {
            origin,
            span,
            bounds,
        };
        space.validate()?;
        Ok(space)
    }

    /// Check the span is non-empty and the bounds are ordered.
    pub fn validate(&self) -> Result<()> {
        if self.span.width == 0 || self.span.height == 0 {
            return Err(GeometryError::EmptySpan {
                width: self.span.width,
                height: self.span.height,
            });
        }
        if self.bounds.min > self.bounds.max {
            return Err(GeometryError::InvertedBounds {
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        Ok(())
    }
}

/// A render position as a percentage of the container, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderPercent {
    pub x_percent: f64,
    pub y_percent: f64,
}

/// Top-left corner of a rendered box, in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxOrigin {
    pub left: f64,
    pub top: f64,
}
