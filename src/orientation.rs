//! Dominant-axis estimation for polygons.
//!
//! Text aligned with a lot's short or long side reads as "straight" inside
//! elongated shapes, so the fitter uses these angles as rotation candidates
//! before the axis-aligned ones.

use crate::geometry::{Point, Polygon};
use serde::{Deserialize, Serialize};

/// Edges shorter than this carry no usable direction.
pub const DEGENERATE_EDGE_LEN: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeMode {
    Shortest,
    Longest,
}

/// Angle in degrees, in (-180, 180], of the shortest or longest edge of the
/// ring `points` (closed implicitly by the last-to-first edge).
///
/// Ties keep the first edge in ring order. Returns `0.0` when every edge is
/// degenerate.
pub fn dominant_edge_angle(points: &[Point], mode: EdgeMode) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }

    let mut best: Option<(f64, f64)> = None; // (length, angle)
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = dx.hypot(dy);
        if !(len >= DEGENERATE_EDGE_LEN) {
            continue;
        }
        let better = match (best, mode) {
            (None, _) => true,
            (Some((l, _)), EdgeMode::Shortest) => len < l,
            (Some((l, _)), EdgeMode::Longest) => len > l,
        };
        if better {
            let mut angle = dy.atan2(dx).to_degrees();
            // atan2(-0.0, -x) lands on -180
            if angle <= -180.0 {
                angle += 360.0;
            }
            best = Some((len, angle));
        }
    }

    best.map(|(_, angle)| angle).unwrap_or(0.0)
}

impl Polygon {
    pub fn dominant_edge_angle(&self, mode: EdgeMode) -> f64 {
        dominant_edge_angle(self.vertices(), mode)
    }
}
