//! Size-aware anchor reconciliation.
//!
//! A card's rendered size depends on whether it is collapsed. The renderer
//! anchors the box on the stored point and offsets it by half of the current
//! size, so under [`AnchorConvention::Center`] a collapse toggle must leave
//! the stored point untouched and [`AnchorReconciler::reconcile`] returns
//! [`LogicalDelta::ZERO`].
//!
//! Under [`AnchorConvention::TopLeft`] the stored point is the box corner and
//! the corner has to move by `-(new - old) / 2` to keep the visual center in
//! place. That path exists so a new size tier or a renderer change has one
//! place to be fixed; nothing stores per-card "dimensions at last write".

use crate::coord::{BoxOrigin, CardSize, LogicalDelta, LogicalPoint};

/// Which point of the rendered box the stored coordinates denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AnchorConvention {
    /// Stored coordinates are the box center.
    #[default]
    Center,
    /// Stored coordinates are the box's top-left corner.
    TopLeft,
}

/// Rendered card sizes per collapse state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeTable {
    pub collapsed: CardSize,
    pub expanded: CardSize,
}

impl Default for SizeTable {
    fn default() -> Self {
        Self {
            collapsed: CardSize::new(120, 40),
            expanded: CardSize::new(200, 150),
        }
    }
}

impl SizeTable {
    /// Size of a card in the given state.
    pub const fn size_for(&self, is_collapsed: bool) -> CardSize {
        if is_collapsed {
            self.collapsed
        } else {
            self.expanded
        }
    }
}

/// Computes the coordinate adjustment for a size change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnchorReconciler {
    convention: AnchorConvention,
    sizes: SizeTable,
}

impl AnchorReconciler {
    pub const fn new(convention: AnchorConvention, sizes: SizeTable) -> Self {
        Self { convention, sizes }
    }

    pub const fn convention(&self) -> AnchorConvention {
        self.convention
    }

    pub const fn sizes(&self) -> &SizeTable {
        &self.sizes
    }

    /// `Δ = (new − old) / 2` under top-left anchoring, zero under center.
    ///
    /// The stored corner moves by `-Δ`; see [`Self::apply`].
    pub fn reconcile(&self, old: CardSize, new: CardSize) -> LogicalDelta {
        match self.convention {
            AnchorConvention::Center => LogicalDelta::ZERO,
            AnchorConvention::TopLeft => LogicalDelta {
                dx: (f64::from(new.width) - f64::from(old.width)) / 2.0,
                dy: (f64::from(new.height) - f64::from(old.height)) / 2.0,
            },
        }
    }

    /// Adjustment for a collapse toggle between two states.
    pub fn reconcile_toggle(&self, was_collapsed: bool, is_collapsed: bool) -> LogicalDelta {
        self.reconcile(
            self.sizes.size_for(was_collapsed),
            self.sizes.size_for(is_collapsed),
        )
    }

    /// Stored point after a toggle; identity under center anchoring.
    pub fn apply(&self, stored: LogicalPoint, was_collapsed: bool, is_collapsed: bool) -> LogicalPoint {
        let delta = self.reconcile_toggle(was_collapsed, is_collapsed);
        if delta.is_zero() {
            return stored;
        }
        stored.offset(-delta)
    }

    /// Top-left corner the renderer draws a card at.
    pub fn render_anchor(&self, stored: LogicalPoint, is_collapsed: bool) -> BoxOrigin {
        let size = self.sizes.size_for(is_collapsed);
        match self.convention {
            AnchorConvention::Center => BoxOrigin {
                left: f64::from(stored.x) - f64::from(size.width) / 2.0,
                top: f64::from(stored.y) - f64::from(size.height) / 2.0,
            },
            AnchorConvention::TopLeft => BoxOrigin {
                left: f64::from(stored.x),
                top: f64::from(stored.y),
            },
        }
    }

    /// Visual center of a rendered card.
    pub fn visual_center(&self, stored: LogicalPoint, is_collapsed: bool) -> (f64, f64) {
        let size = self.sizes.size_for(is_collapsed);
        let origin = self.render_anchor(stored, is_collapsed);
        (
            origin.left + f64::from(size.width) / 2.0,
            origin.top + f64::from(size.height) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_convention_is_a_no_op() {
        let reconciler = AnchorReconciler::default();
        assert_eq!(reconciler.convention(), AnchorConvention::Center);

        assert!(reconciler.reconcile_toggle(true, false).is_zero());
        assert!(reconciler.reconcile_toggle(false, true).is_zero());
        assert!(reconciler
            .reconcile(CardSize::new(1, 1), CardSize::new(999, 999))
            .is_zero());

        let stored = LogicalPoint::new(350, 200);
        assert_eq!(reconciler.apply(stored, true, false), stored);
        assert_eq!(reconciler.apply(stored, false, true), stored);
    }

    #[test]
    fn center_round_trip_keeps_point() {
        let reconciler = AnchorReconciler::default();
        let stored = LogicalPoint::new(-7, 533);
        let expanded = reconciler.apply(stored, true, false);
        let collapsed = reconciler.apply(expanded, false, true);
        assert_eq!(collapsed, stored);
    }

    #[test]
    fn render_anchor_moves_but_center_does_not() {
        let reconciler = AnchorReconciler::default();
        let stored = LogicalPoint::new(300, 200);

        let collapsed = reconciler.render_anchor(stored, true);
        let expanded = reconciler.render_anchor(stored, false);
        assert_ne!(collapsed, expanded);
        assert_eq!(collapsed, BoxOrigin { left: 240.0, top: 180.0 });

        assert_eq!(reconciler.visual_center(stored, true), (300.0, 200.0));
        assert_eq!(reconciler.visual_center(stored, false), (300.0, 200.0));
    }

    #[test]
    fn top_left_convention_preserves_visual_center() {
        let reconciler = AnchorReconciler::new(AnchorConvention::TopLeft, SizeTable::default());
        let delta = reconciler.reconcile_toggle(true, false);
        assert_eq!(delta, LogicalDelta::new(40.0, 55.0));

        let corner = LogicalPoint::new(100, 100);
        let before = reconciler.visual_center(corner, true);
        let moved = reconciler.apply(corner, true, false);
        assert_eq!(moved, LogicalPoint::new(60, 45));
        assert_eq!(reconciler.visual_center(moved, false), before);
    }

    #[test]
    fn size_table_lookup() {
        let sizes = SizeTable::default();
        assert_eq!(sizes.size_for(true), sizes.collapsed);
        assert_eq!(sizes.size_for(false), sizes.expanded);
    }
}
