//! Corkboard Geometry
//!
//! Pure coordinate math for the shared idea board.
//!
//! # Coordinate Model
//!
//! Cards live in a fixed logical coordinate space that is independent of the
//! pixel size of whatever container renders the board. A card's stored
//! `(x, y)` is always its logical *center*:
//!
//! - Pointer gestures arrive as pixel deltas and are scaled into logical
//!   deltas per axis ([`screen_delta_to_logical_delta`]).
//! - The renderer places a card at a 0–100% position
//!   ([`logical_to_render_percent`]) and translates by half of the card's
//!   *current* rendered size.
//! - Every mutated coordinate is clamped into the board bounds; overshoot
//!   from a fast drag is clamped, never rejected.
//!
//! # Anchor Reconciliation
//!
//! Collapsing or expanding a card changes its rendered size. Because the
//! stored point is the center, a toggle never moves the stored point; the
//! [`AnchorReconciler`] computes a zero delta under
//! [`AnchorConvention::Center`] and only becomes corrective if the board is
//! ever configured with top-left anchoring.

mod anchor;
mod coord;
mod error;
mod transform;

pub use anchor::{AnchorConvention, AnchorReconciler, SizeTable};
pub use coord::{
    BoxOrigin, CardSize, ContainerSize, LogicalBounds, LogicalDelta, LogicalPoint, LogicalSpace,
    LogicalSpan, PixelDelta, RenderPercent,
};
pub use error::{GeometryError, Result};
pub use transform::{
    clamp_point, logical_to_render_percent, screen_delta_to_logical_delta, CoordinateTransformer,
};

/// Lowest logical coordinate on either axis of the default board.
pub const DEFAULT_MIN_LOGICAL: i32 = -20;

/// Highest logical coordinate on either axis of the default board.
pub const DEFAULT_MAX_LOGICAL: i32 = 540;

/// Logical extent of the rendered area on each axis of the default board.
pub const DEFAULT_SPAN: u32 = 520;

// The rendered area must sit inside the clamp bounds.
const _: () = assert!(DEFAULT_MIN_LOGICAL <= 0 && DEFAULT_SPAN as i32 <= DEFAULT_MAX_LOGICAL);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_space_matches_constants() {
        let space = LogicalSpace::default();
        assert_eq!(space.bounds.min, DEFAULT_MIN_LOGICAL);
        assert_eq!(space.bounds.max, DEFAULT_MAX_LOGICAL);
        assert_eq!(space.span.width, DEFAULT_SPAN);
        assert_eq!(space.span.height, DEFAULT_SPAN);
    }
}
