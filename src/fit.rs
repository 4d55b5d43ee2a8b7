//! Deterministic fitting of a text label inside a polygon.
//!
//! Given a polygon and a text string with an initial height, [`fit`] searches
//! for a center, rotation and height such that the text's approximate
//! bounding box, eroded by a small safety buffer, lies inside the polygon:
//! - Rotation candidates come from a [`RotationStrategy`] and are tried in
//!   order; every candidate is folded into (-90, 90] so text never reads upside
//!   down
//! - For each rotation the height shrinks geometrically from the initial
//!   height until the box fits or the floor height is reached
//! - At each height, nine centers around the centroid are tried in a fixed
//!   order (centroid, four axis shifts, four diagonal shifts) so a label can
//!   step off a line crossing near the centroid without shrinking
//! - The first containing candidate wins; there is no scoring beyond that
//!
//! When nothing fits, the result is the centroid at the floor height with the
//! first rotation candidate and [`FitOutcome::fitted`] set to `false`. Only
//! structurally invalid input is an error.
//!
//! The algorithm is fully deterministic and uses no randomness.

use crate::error::{FitError, FitResult};
use crate::geometry::{Point, Polygon, text_box, text_width};
use crate::orientation::EdgeMode;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Center shifts tried at every height, in units of `height * OFFSET_SCALE`.
pub const SEARCH_OFFSETS: [(f64, f64); 9] = [
    (0.0, 0.0),
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (-1.0, 1.0),
    (1.0, -1.0),
    (-1.0, -1.0),
];

pub const OFFSET_SCALE: f64 = 0.3;

/// Default floor height as a fraction of the initial height.
pub const DEFAULT_MIN_HEIGHT_RATIO: f64 = 0.3;

/// Policy choosing which rotations are tried, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// 0 degrees, then 90.
    #[serde(rename = "fixed_0_90")]
    #[value(name = "fixed-0-90")]
    Fixed0And90,
    /// Shortest-edge angle, then that angle plus 90.
    ShortestEdge,
    /// Longest-edge angle only.
    LongestEdge,
    /// 0 degrees only.
    HorizontalOnly,
}

impl RotationStrategy {
    /// Strategy used when neither the text nor the options force one.
    pub fn default_for(polygon: &Polygon) -> Self {
        if polygon.vertex_count() >= 4 {
            Self::ShortestEdge
        } else {
            Self::Fixed0And90
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// `None` picks [`RotationStrategy::default_for`] per polygon.
    pub rotation_strategy: Option<RotationStrategy>,
    pub shrink_factor: f64,
    pub max_iterations: usize,
    /// `None` means `DEFAULT_MIN_HEIGHT_RATIO` of the initial height.
    pub min_height: Option<f64>,
    pub safety_buffer: f64,
    /// Try the nine [`SEARCH_OFFSETS`]; when off only the centroid is tried.
    pub search_offsets: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            rotation_strategy: None,
            shrink_factor: 0.9,
            max_iterations: 50,
            min_height: None,
            safety_buffer: 0.01,
            search_offsets: true,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> FitResult<()> {
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(FitError::InvalidOptions(format!(
                "shrink_factor must be in (0, 1), got {}",
                self.shrink_factor
            )));
        }
        if self.max_iterations == 0 {
            return Err(FitError::InvalidOptions(
                "max_iterations must be at least 1".into(),
            ));
        }
        if let Some(min) = self.min_height {
            if !(min.is_finite() && min > 0.0) {
                return Err(FitError::InvalidOptions(format!(
                    "min_height must be finite and positive, got {min}"
                )));
            }
        }
        if !(self.safety_buffer.is_finite() && self.safety_buffer >= 0.0) {
            return Err(FitError::InvalidOptions(format!(
                "safety_buffer must be finite and non-negative, got {}",
                self.safety_buffer
            )));
        }
        Ok(())
    }

    /// Floor height for a label starting at `init_height`. Also the height of
    /// the fallback placement.
    pub fn effective_min_height(&self, init_height: f64) -> f64 {
        self.min_height
            .unwrap_or(init_height * DEFAULT_MIN_HEIGHT_RATIO)
    }
}

/// A text payload with its initial height.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpec {
    pub text: String,
    pub height: f64,
    pub width_factor: f64,
    /// Overrides [`FitOptions::rotation_strategy`] for this text.
    pub rotation_strategy: Option<RotationStrategy>,
}

impl TextSpec {
    pub fn new(text: impl Into<String>, height: f64) -> Self {
        Self {
            text: text.into(),
            height,
            width_factor: 1.0,
            rotation_strategy: None,
        }
    }

    pub fn with_width_factor(mut self, width_factor: f64) -> Self {
        self.width_factor = width_factor;
        self
    }

    pub fn with_rotation_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.rotation_strategy = Some(strategy);
        self
    }

    /// Approximate box width when set at `height`.
    pub fn width_at(&self, height: f64) -> f64 {
        text_width(&self.text, height, self.width_factor)
    }
}

/// Final label geometry. `(x, y)` is the center of the text box and
/// `rotation` is in degrees counter-clockwise from +x.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub rotation: f64,
}

impl Placement {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Corners of the (uneroded) box this placement gives `text`.
    pub fn text_box(&self, text: &TextSpec) -> [Point; 4] {
        text_box(
            self.center(),
            text.width_at(self.height),
            self.height,
            self.rotation,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitOutcome {
    pub placement: Placement,
    /// `false` when no candidate fitted and `placement` is the fallback.
    pub fitted: bool,
    /// Rotations tried, in order.
    pub rotation_candidates: Vec<f64>,
}

/// One unit of work for [`fit_batch`].
#[derive(Debug, Clone)]
pub struct FitJob<'a> {
    pub polygon: &'a Polygon,
    pub text: TextSpec,
}

/// Fold an angle into (-90, 90]. Adding or removing half turns keeps the
/// text's axis and only flips its reading direction.
pub fn readable_angle(deg: f64) -> f64 {
    let mut a = deg % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    if a > 90.0 {
        a -= 180.0;
    } else if a <= -90.0 {
        a += 180.0;
    }
    a
}

/// Ordered rotation candidates for `strategy` on `polygon`.
pub fn rotation_candidates(polygon: &Polygon, strategy: RotationStrategy) -> Vec<f64> {
    let raw = match strategy {
        RotationStrategy::Fixed0And90 => vec![0.0, 90.0],
        RotationStrategy::ShortestEdge => {
            let a = polygon.dominant_edge_angle(EdgeMode::Shortest);
            vec![a, a + 90.0]
        }
        RotationStrategy::LongestEdge => vec![polygon.dominant_edge_angle(EdgeMode::Longest)],
        RotationStrategy::HorizontalOnly => vec![0.0],
    };
    let mut out: Vec<f64> = Vec::with_capacity(raw.len());
    for a in raw.into_iter().map(readable_angle) {
        if out.last() != Some(&a) {
            out.push(a);
        }
    }
    out
}

/// Heights tried for one rotation candidate: `init_height` shrinking by
/// `shrink_factor`, at most `max_iterations` values, none below the floor.
pub fn height_schedule(init_height: f64, options: &FitOptions) -> impl Iterator<Item = f64> {
    let floor = options.effective_min_height(init_height);
    let shrink = options.shrink_factor;
    std::iter::successors(Some(init_height), move |h| Some(h * shrink))
        .take(options.max_iterations)
        .take_while(move |h| *h >= floor)
}

/// Fit `text` inside `polygon` and return the placement.
pub fn fit(polygon: &Polygon, text: &TextSpec, options: &FitOptions) -> FitResult<Placement> {
    fit_detailed(polygon, text, options).map(|o| o.placement)
}

/// Like [`fit`], but also reports whether the placement is a true fit.
pub fn fit_detailed(
    polygon: &Polygon,
    text: &TextSpec,
    options: &FitOptions,
) -> FitResult<FitOutcome> {
    options.validate()?;
    if !(text.height.is_finite() && text.height > 0.0) {
        return Err(FitError::InvalidHeight(text.height));
    }
    if !(text.width_factor.is_finite() && text.width_factor >= 0.0) {
        return Err(FitError::InvalidOptions(format!(
            "width factor must be finite and non-negative, got {}",
            text.width_factor
        )));
    }

    let strategy = text
        .rotation_strategy
        .or(options.rotation_strategy)
        .unwrap_or_else(|| RotationStrategy::default_for(polygon));
    let candidates = rotation_candidates(polygon, strategy);

    if let Some(placement) = search(polygon, text, options, &candidates) {
        return Ok(FitOutcome {
            placement,
            fitted: true,
            rotation_candidates: candidates,
        });
    }

    let center = polygon.centroid();
    let placement = Placement {
        x: center.x,
        y: center.y,
        height: options.effective_min_height(text.height),
        rotation: candidates.first().copied().unwrap_or(0.0),
    };
    log::debug!(
        "no fit for {:?} (h={}) with {:?}; falling back to centroid at h={}",
        text.text,
        text.height,
        strategy,
        placement.height
    );
    Ok(FitOutcome {
        placement,
        fitted: false,
        rotation_candidates: candidates,
    })
}

fn search(
    polygon: &Polygon,
    text: &TextSpec,
    options: &FitOptions,
    candidates: &[f64],
) -> Option<Placement> {
    let center = polygon.centroid();
    let offsets: &[(f64, f64)] = if options.search_offsets {
        &SEARCH_OFFSETS
    } else {
        &SEARCH_OFFSETS[..1]
    };

    for &rotation in candidates {
        for h in height_schedule(text.height, options) {
            let width = text.width_at(h);
            let step = h * OFFSET_SCALE;
            for &(dx, dy) in offsets {
                let at = Point::new(center.x + dx * step, center.y + dy * step);
                if polygon.contains_eroded_box(at, width, h, rotation, options.safety_buffer) {
                    return Some(Placement {
                        x: at.x,
                        y: at.y,
                        height: h,
                        rotation,
                    });
                }
            }
        }
    }
    None
}

/// Fit every job in parallel. Results keep the input order and one job's
/// error does not affect the others.
pub fn fit_batch(jobs: &[FitJob<'_>], options: &FitOptions) -> Vec<FitResult<FitOutcome>> {
    jobs.par_iter()
        .map(|job| fit_detailed(job.polygon, &job.text, options))
        .collect()
}
