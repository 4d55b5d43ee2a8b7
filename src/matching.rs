//! Association of a label position with the polygon it belongs to.
//!
//! Polygon counts per drawing are small (tens to a few hundred), so this is a
//! linear scan. An R-tree over centroids would be the upgrade if that changes.

use crate::geometry::{Point, Polygon};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Closest centroid.
    #[default]
    NearestCentroid,
    /// First polygon whose interior holds the point, else closest centroid.
    ContainingFirst,
}

/// Index of the polygon `point` belongs to, or `None` for an empty slice.
///
/// Equal distances resolve to the earliest polygon.
pub fn nearest_polygon(point: Point, polygons: &[Polygon], strategy: MatchStrategy) -> Option<usize> {
    if strategy == MatchStrategy::ContainingFirst {
        if let Some(i) = polygons.iter().position(|p| p.contains_point(point)) {
            return Some(i);
        }
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, poly) in polygons.iter().enumerate() {
        let d = poly.centroid().distance_to(point);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}
