//! Screen ↔ board coordinate conversion.
//!
//! The free functions are the primitive conversions; [`CoordinateTransformer`]
//! binds them to one [`LogicalSpace`] so callers do not thread the span and
//! bounds through every call.

use crate::coord::{
    ContainerSize, LogicalBounds, LogicalDelta, LogicalPoint, LogicalSpace, LogicalSpan,
    PixelDelta, RenderPercent,
};
use crate::error::{GeometryError, Result};

/// Scale a pixel delta into logical units, independently per axis.
///
/// Each axis is multiplied by `span / container`. An unmeasured container
/// (any axis `<= 0`) is an error rather than a division by zero; the caller
/// is expected to defer whatever it was about to commit.
pub fn screen_delta_to_logical_delta(
    delta: PixelDelta,
    container: ContainerSize,
    span: LogicalSpan,
) -> Result<LogicalDelta> {
    if !container.is_measured() {
        return Err(GeometryError::ContainerNotMeasured {
            width: container.width,
            height: container.height,
        });
    }
    Ok(LogicalDelta {
        dx: delta.dx * f64::from(span.width) / container.width,
        dy: delta.dy * f64::from(span.height) / container.height,
    })
}

/// Map a logical point into a 0–100% render position.
///
/// Points outside the rendered area map outside 0–100; the renderer centers
/// the card on the returned position.
pub fn logical_to_render_percent(
    point: LogicalPoint,
    span: LogicalSpan,
    origin: LogicalPoint,
) -> RenderPercent {
    RenderPercent {
        x_percent: axis_percent(point.x, origin.x, span.width),
        y_percent: axis_percent(point.y, origin.y, span.height),
    }
}

fn axis_percent(value: i32, origin: i32, span: u32) -> f64 {
    if span == 0 {
        return 0.0;
    }
    (f64::from(value) - f64::from(origin)) / f64::from(span) * 100.0
}

/// Clamp both axes of a point into `bounds`.
pub fn clamp_point(point: LogicalPoint, bounds: LogicalBounds) -> LogicalPoint {
    LogicalPoint {
        x: point.x.clamp(bounds.min, bounds.max),
        y: point.y.clamp(bounds.min, bounds.max),
    }
}

/// Coordinate conversions bound to a single board space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinateTransformer {
    space: LogicalSpace,
}

impl CoordinateTransformer {
    /// Create a transformer for a validated space.
    pub fn new(space: LogicalSpace) -> Result<Self> {
        space.validate()?;
        Ok(Self { space })
    }

    /// The space this transformer converts into.
    pub const fn space(&self) -> &LogicalSpace {
        &self.space
    }

    /// Convert a pixel delta using this board's span.
    pub fn to_logical_delta(&self, delta: PixelDelta, container: ContainerSize) -> Result<LogicalDelta> {
        screen_delta_to_logical_delta(delta, container, self.space.span)
    }

    /// Render position of a logical point.
    pub fn render_percent(&self, point: LogicalPoint) -> RenderPercent {
        logical_to_render_percent(point, self.space.span, self.space.origin)
    }

    /// Clamp a point into this board's bounds.
    pub fn clamp(&self, point: LogicalPoint) -> LogicalPoint {
        clamp_point(point, self.space.bounds)
    }

    /// Where a card centered at `from` lands after a drag of `delta`.
    ///
    /// Converts, rounds onto the grid, then clamps.
    pub fn apply_drag(
        &self,
        from: LogicalPoint,
        delta: PixelDelta,
        container: ContainerSize,
    ) -> Result<LogicalPoint> {
        let logical = self.to_logical_delta(delta, container)?;
        Ok(self.clamp(from.offset(logical)))
    }

    /// Fractional render position of a card mid-drag.
    ///
    /// Used for preview only; the result is clamped but not rounded so the
    /// card follows the pointer smoothly.
    pub fn preview_percent(
        &self,
        from: LogicalPoint,
        delta: PixelDelta,
        container: ContainerSize,
    ) -> Result<RenderPercent> {
        let logical = self.to_logical_delta(delta, container)?;
        let bounds = self.space.bounds;
        let x = (f64::from(from.x) + logical.dx).clamp(f64::from(bounds.min), f64::from(bounds.max));
        let y = (f64::from(from.y) + logical.dy).clamp(f64::from(bounds.min), f64::from(bounds.max));
        let origin = self.space.origin;
        Ok(RenderPercent {
            x_percent: (x - f64::from(origin.x)) / f64::from(self.space.span.width) * 100.0,
            y_percent: (y - f64::from(origin.y)) / f64::from(self.space.span.height) * 100.0,
        })
    }
}
