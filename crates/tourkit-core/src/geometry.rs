#![forbid(unsafe_code)]

//! Pixel geometry and tooltip placement resolution.
//!
//! Coordinates are `f64` CSS pixels with the origin at the viewport's
//! top-left corner, matching what a host gets out of
//! `getBoundingClientRect`-style measurement.
//!
//! # Placement algorithm
//!
//! 1. Compute the naive position for the preferred placement: the tooltip
//!    is centered against the target's opposite edge with a fixed gap.
//! 2. Clamp horizontally into `[gap, viewport_width - tooltip_width - gap]`.
//! 3. If placement is `Top` and the computed top sits above the viewport's
//!    top margin, flip to `Bottom` and recompute from the target's bottom
//!    edge; symmetric for `Bottom` overflowing the viewport's bottom.
//! 4. `Center` ignores the target and centers the tooltip in the viewport.
//!
//! The resolver is a pure function. Callers re-run it on every scroll and
//! resize while a step is active (see [`crate::reflow`]); results are never
//! cached because target and viewport move independently of engine state.

use serde::{Deserialize, Serialize};

/// Gap in pixels between the target edge and the tooltip, and the minimum
/// margin kept from the viewport edges.
pub const PLACEMENT_GAP: f64 = 12.0;

/// An axis-aligned rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Left edge. Alias for `self.x`.
    #[inline]
    #[must_use]
    pub const fn left(&self) -> f64 {
        self.x
    }

    /// Top edge. Alias for `self.y`.
    #[inline]
    #[must_use]
    pub const fn top(&self) -> f64 {
        self.y
    }

    /// Right edge.
    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Horizontal center.
    #[inline]
    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Vertical center.
    #[inline]
    #[must_use]
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Check if the rectangle has zero area.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Create a new size.
    #[inline]
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Which side of the target the tooltip prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Top,
    #[default]
    Bottom,
    Left,
    Right,
    /// Ignore the target entirely and center in the viewport.
    Center,
}

/// Resolved tooltip position: where to render, and which placement survived
/// overflow handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPosition {
    pub top: f64,
    pub left: f64,
    pub placement: Placement,
}

/// Compute where a tooltip of `tooltip` size should render relative to
/// `target`, preferring `preferred`, inside a viewport of `viewport` size.
#[must_use]
pub fn resolve_placement(
    target: Rect,
    tooltip: Size,
    preferred: Placement,
    viewport: Size,
) -> ResolvedPosition {
    let gap = PLACEMENT_GAP;

    if preferred == Placement::Center {
        return ResolvedPosition {
            top: (viewport.height - tooltip.height) / 2.0,
            left: (viewport.width - tooltip.width) / 2.0,
            placement: Placement::Center,
        };
    }

    let (mut top, left, mut placement) = match preferred {
        Placement::Top => (
            target.top() - tooltip.height - gap,
            target.center_x() - tooltip.width / 2.0,
            Placement::Top,
        ),
        Placement::Bottom => (
            target.bottom() + gap,
            target.center_x() - tooltip.width / 2.0,
            Placement::Bottom,
        ),
        Placement::Left => (
            target.center_y() - tooltip.height / 2.0,
            target.left() - tooltip.width - gap,
            Placement::Left,
        ),
        Placement::Right => (
            target.center_y() - tooltip.height / 2.0,
            target.right() + gap,
            Placement::Right,
        ),
        Placement::Center => unreachable!("handled above"),
    };

    // Horizontal clamp happens before the vertical flip so a flipped
    // tooltip keeps its clamped horizontal position.
    let left = clamp_axis(left, tooltip.width, viewport.width, gap);

    match placement {
        Placement::Top if top < gap => {
            placement = Placement::Bottom;
            top = target.bottom() + gap;
        }
        Placement::Bottom if top + tooltip.height > viewport.height - gap => {
            placement = Placement::Top;
            top = target.top() - tooltip.height - gap;
        }
        Placement::Left | Placement::Right => {
            top = clamp_axis(top, tooltip.height, viewport.height, gap);
        }
        _ => {}
    }

    ResolvedPosition {
        top,
        left,
        placement,
    }
}

/// Clamp a position into `[gap, extent - size - gap]` along one axis.
///
/// When the tooltip is wider than the available extent the lower bound
/// wins, keeping the tooltip's leading edge visible.
fn clamp_axis(pos: f64, size: f64, extent: f64, gap: f64) -> f64 {
    let max = (extent - size - gap).max(gap);
    pos.clamp(gap, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Size = Size::new(800.0, 600.0);

    #[test]
    fn rect_edges_and_centers() {
        let r = Rect::new(10.0, 20.0, 100.0, 40.0);
        assert_eq!(r.left(), 10.0);
        assert_eq!(r.top(), 20.0);
        assert_eq!(r.right(), 110.0);
        assert_eq!(r.bottom(), 60.0);
        assert_eq!(r.center_x(), 60.0);
        assert_eq!(r.center_y(), 40.0);
        assert!(!r.is_empty());
        assert!(Rect::new(0.0, 0.0, 0.0, 10.0).is_empty());
    }

    #[test]
    fn bottom_placement_centers_on_target() {
        let target = Rect::new(300.0, 100.0, 200.0, 50.0);
        let pos = resolve_placement(target, Size::new(100.0, 60.0), Placement::Bottom, VIEWPORT);
        assert_eq!(pos.placement, Placement::Bottom);
        assert_eq!(pos.top, 150.0 + PLACEMENT_GAP);
        // Target center 400, tooltip half-width 50.
        assert_eq!(pos.left, 350.0);
    }

    #[test]
    fn top_overflow_flips_to_bottom() {
        // The case from the placement contract: a tall tooltip above a
        // target near the top edge must flip below it.
        let target = Rect::new(10.0, 10.0, 100.0, 20.0);
        let pos = resolve_placement(target, Size::new(200.0, 80.0), Placement::Top, VIEWPORT);
        assert_eq!(pos.placement, Placement::Bottom);
        assert_eq!(pos.top, target.bottom() + PLACEMENT_GAP);
        // Naive left is 60 - 100 = -40, clamped to the gap.
        assert_eq!(pos.left, PLACEMENT_GAP);
    }

    #[test]
    fn bottom_overflow_flips_to_top() {
        let target = Rect::new(300.0, 560.0, 100.0, 30.0);
        let pos = resolve_placement(target, Size::new(120.0, 80.0), Placement::Bottom, VIEWPORT);
        assert_eq!(pos.placement, Placement::Top);
        assert_eq!(pos.top, target.top() - 80.0 - PLACEMENT_GAP);
    }

    #[test]
    fn top_placement_stays_when_it_fits() {
        let target = Rect::new(300.0, 300.0, 100.0, 30.0);
        let pos = resolve_placement(target, Size::new(120.0, 80.0), Placement::Top, VIEWPORT);
        assert_eq!(pos.placement, Placement::Top);
        assert_eq!(pos.top, 300.0 - 80.0 - PLACEMENT_GAP);
    }

    #[test]
    fn horizontal_clamp_right_edge() {
        let target = Rect::new(750.0, 300.0, 40.0, 30.0);
        let pos = resolve_placement(target, Size::new(200.0, 60.0), Placement::Bottom, VIEWPORT);
        assert_eq!(pos.left, 800.0 - 200.0 - PLACEMENT_GAP);
    }

    #[test]
    fn center_ignores_target() {
        let target = Rect::new(0.0, 0.0, 10.0, 10.0);
        let pos = resolve_placement(target, Size::new(200.0, 100.0), Placement::Center, VIEWPORT);
        assert_eq!(pos.placement, Placement::Center);
        assert_eq!(pos.left, 300.0);
        assert_eq!(pos.top, 250.0);
    }

    #[test]
    fn left_and_right_clamp_vertically() {
        let target = Rect::new(400.0, 5.0, 40.0, 10.0);
        let pos = resolve_placement(target, Size::new(100.0, 80.0), Placement::Right, VIEWPORT);
        assert_eq!(pos.placement, Placement::Right);
        assert_eq!(pos.left, target.right() + PLACEMENT_GAP);
        // Naive top would be negative; clamped to the gap.
        assert_eq!(pos.top, PLACEMENT_GAP);
    }

    #[test]
    fn oversized_tooltip_keeps_leading_edge_visible() {
        let target = Rect::new(100.0, 300.0, 50.0, 20.0);
        let pos = resolve_placement(
            target,
            Size::new(1000.0, 60.0),
            Placement::Bottom,
            VIEWPORT,
        );
        assert_eq!(pos.left, PLACEMENT_GAP);
    }
}
