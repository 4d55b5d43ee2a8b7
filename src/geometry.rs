//! Planar geometry used by the text fitter.
//!
//! [`Polygon`] wraps a validated [`geo::Polygon`] and caches the attributes the
//! fitter asks for on every call (centroid, area). Text boxes are modelled as
//! rectangles whose width comes from the glyph-ratio approximation in
//! [`text_width`]; there is no font measurement anywhere in this crate.

use crate::error::{FitError, FitResult};
use geo::{Area, Centroid, Contains, Coord, Line, LineString};
use serde::{Deserialize, Serialize};

/// Average glyph width relative to cap height.
pub const GLYPH_WIDTH_RATIO: f64 = 0.6;

/// Two consecutive vertices closer than this are the same vertex.
const DUPLICATE_VERTEX_EPS: f64 = 1e-9;

const MIN_AREA: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for Coord<f64> {
    fn from(p: Point) -> Self {
        Coord { x: p.x, y: p.y }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = *points.first()?;
        let mut bb = BoundingBox {
            min: first,
            max: first,
        };
        for p in &points[1..] {
            bb.min.x = bb.min.x.min(p.x);
            bb.min.y = bb.min.y.min(p.y);
            bb.max.x = bb.max.x.max(p.x);
            bb.max.y = bb.max.y.max(p.y);
        }
        Some(bb)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// A simple polygon with at least three distinct vertices and non-zero area.
///
/// The ring is stored open (no repeated closing vertex); edges wrap from the
/// last vertex back to the first.
#[derive(Debug, Clone)]
pub struct Polygon {
    vertices: Vec<Point>,
    shape: geo::Polygon<f64>,
    centroid: Point,
    area: f64,
}

impl Polygon {
    /// Validate and normalize a vertex ring.
    ///
    /// A duplicated closing vertex and consecutive duplicate vertices are
    /// dropped before validation.
    pub fn new(points: impl IntoIterator<Item = Point>) -> FitResult<Self> {
        let mut vertices: Vec<Point> = Vec::new();
        for p in points {
            if !p.is_finite() {
                return Err(FitError::NonFiniteCoordinate);
            }
            match vertices.last() {
                Some(last) if last.distance_to(p) <= DUPLICATE_VERTEX_EPS => {}
                _ => vertices.push(p),
            }
        }
        while vertices.len() > 1
            && vertices[0].distance_to(vertices[vertices.len() - 1]) <= DUPLICATE_VERTEX_EPS
        {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(FitError::invalid_polygon(format!(
                "need at least 3 distinct vertices, got {}",
                vertices.len()
            )));
        }

        let exterior: LineString<f64> = vertices.iter().map(|p| Coord::from(*p)).collect();
        let shape = geo::Polygon::new(exterior, vec![]);
        let area = shape.unsigned_area();
        if !(area > MIN_AREA) {
            return Err(FitError::invalid_polygon(format!("zero area ({area})")));
        }
        let centroid = match shape.centroid() {
            Some(c) => Point::new(c.x(), c.y()),
            None => BoundingBox::from_points(&vertices)
                .map(|bb| bb.center())
                .ok_or_else(|| FitError::invalid_polygon("no centroid"))?,
        };

        Ok(Self {
            vertices,
            shape,
            centroid,
            area,
        })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Area-weighted centroid.
    pub fn centroid(&self) -> Point {
        self.centroid
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn bounding_box(&self) -> BoundingBox {
        // vertices is never empty after validation
        BoundingBox::from_points(&self.vertices).unwrap_or(BoundingBox {
            min: self.centroid,
            max: self.centroid,
        })
    }

    /// Consecutive vertex pairs, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Strict interior containment of a point.
    pub fn contains_point(&self, p: Point) -> bool {
        self.shape.contains(&geo::Point::new(p.x, p.y))
    }

    /// Whether the text box centered at `center`, eroded inward by `buffer`,
    /// lies inside the polygon.
    ///
    /// Erosion that collapses a dimension leaves the medial segment (or the
    /// center point when both collapse), and that degenerate shape is tested
    /// instead.
    pub fn contains_eroded_box(
        &self,
        center: Point,
        width: f64,
        height: f64,
        rotation_deg: f64,
        buffer: f64,
    ) -> bool {
        let hw = (width * 0.5 - buffer).max(0.0);
        let hh = (height * 0.5 - buffer).max(0.0);
        let place = local_to_world(center, rotation_deg);
        match (hw > 0.0, hh > 0.0) {
            (true, true) => {
                let ring: LineString<f64> = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
                    .into_iter()
                    .map(|(px, py)| Coord::from(place(px, py)))
                    .collect();
                self.shape.contains(&geo::Polygon::new(ring, vec![]))
            }
            (true, false) => self.shape.contains(&Line::new(
                Coord::from(place(-hw, 0.0)),
                Coord::from(place(hw, 0.0)),
            )),
            (false, true) => self.shape.contains(&Line::new(
                Coord::from(place(0.0, -hh)),
                Coord::from(place(0.0, hh)),
            )),
            (false, false) => self.contains_point(center),
        }
    }
}

/// Approximate width of `text` set at `height`.
pub fn text_width(text: &str, height: f64, width_factor: f64) -> f64 {
    text.chars().count() as f64 * height * width_factor * GLYPH_WIDTH_RATIO
}

/// Corners of a `width` x `height` rectangle rotated by `rotation_deg` about
/// its own center and moved to `center`, counter-clockwise from bottom-left.
pub fn text_box(center: Point, width: f64, height: f64, rotation_deg: f64) -> [Point; 4] {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let place = local_to_world(center, rotation_deg);
    [
        place(-hw, -hh),
        place(hw, -hh),
        place(hw, hh),
        place(-hw, hh),
    ]
}

fn local_to_world(center: Point, rotation_deg: f64) -> impl Fn(f64, f64) -> Point {
    let (sin, cos) = rotation_deg.to_radians().sin_cos();
    move |px, py| {
        Point::new(
            center.x + px * cos - py * sin,
            center.y + px * sin + py * cos,
        )
    }
}
