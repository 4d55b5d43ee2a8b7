//! Document-level label tidying.
//!
//! A [`LabelDocument`] exposes its closed shapes and its labels in one planar
//! coordinate system; [`relabel`] matches every label to a polygon, fits all
//! of them in parallel and writes the placements back through
//! [`LabelDocument::apply`].

use crate::fit::{FitJob, FitOptions, Placement, TextSpec, fit_batch};
use crate::geometry::{Point, Polygon};
use crate::matching::{MatchStrategy, nearest_polygon};
use serde::Serialize;

/// A label as read from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Document-specific index passed back to [`LabelDocument::apply`].
    pub index: usize,
    pub text: String,
    /// Current position, used to pick the polygon.
    pub anchor: Point,
    pub height: f64,
    pub width_factor: f64,
}

/// Seam between the fitting pipeline and a host file format.
pub trait LabelDocument {
    /// Candidate polygon rings, unvalidated.
    fn polygon_rings(&self) -> Vec<Vec<Point>>;
    fn labels(&self) -> Vec<Label>;
    /// Move label `index` to `placement`.
    fn apply(&mut self, index: usize, placement: &Placement);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelabelOptions {
    pub fit: FitOptions,
    pub matching: MatchStrategy,
    /// Rings with an area at or below this are ignored.
    pub min_polygon_area: f64,
}

impl Default for RelabelOptions {
    fn default() -> Self {
        Self {
            fit: FitOptions::default(),
            matching: MatchStrategy::default(),
            min_polygon_area: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LabelStatus {
    Placed { polygon: usize, placement: Placement },
    Fallback { polygon: usize, placement: Placement },
    NoPolygon,
    Failed { polygon: usize, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelOutcome {
    pub index: usize,
    pub text: String,
    #[serde(flatten)]
    pub status: LabelStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelabelReport {
    pub polygons: usize,
    pub skipped_polygons: usize,
    pub labels: usize,
    pub placed: usize,
    pub fallback: usize,
    pub unmatched: usize,
    pub failed: usize,
    pub outcomes: Vec<LabelOutcome>,
}

/// Validate rings into polygons, dropping invalid and tiny ones.
///
/// Returns the kept polygons and the number skipped.
pub fn collect_polygons(rings: Vec<Vec<Point>>, min_area: f64) -> (Vec<Polygon>, usize) {
    let mut kept = Vec::with_capacity(rings.len());
    let mut skipped = 0;
    for (i, ring) in rings.into_iter().enumerate() {
        match Polygon::new(ring) {
            Ok(poly) if poly.area() > min_area => kept.push(poly),
            Ok(poly) => {
                log::debug!("ring {i}: area {} below {min_area}, skipped", poly.area());
                skipped += 1;
            }
            Err(e) => {
                log::warn!("ring {i}: {e}, skipped");
                skipped += 1;
            }
        }
    }
    (kept, skipped)
}

/// Match, fit and apply every label of `doc`.
pub fn relabel<D: LabelDocument + ?Sized>(doc: &mut D, options: &RelabelOptions) -> RelabelReport {
    let (polygons, skipped_polygons) =
        collect_polygons(doc.polygon_rings(), options.min_polygon_area);
    let labels = doc.labels();

    let mut report = RelabelReport {
        polygons: polygons.len(),
        skipped_polygons,
        labels: labels.len(),
        ..Default::default()
    };

    let mut matched: Vec<(&Label, usize)> = Vec::with_capacity(labels.len());
    let mut unmatched: Vec<&Label> = Vec::new();
    for label in &labels {
        match nearest_polygon(label.anchor, &polygons, options.matching) {
            Some(p) => matched.push((label, p)),
            None => unmatched.push(label),
        }
    }

    let jobs: Vec<FitJob<'_>> = matched
        .iter()
        .map(|(label, p)| FitJob {
            polygon: &polygons[*p],
            text: TextSpec::new(label.text.clone(), label.height)
                .with_width_factor(label.width_factor),
        })
        .collect();
    let results = fit_batch(&jobs, &options.fit);

    for ((label, polygon), result) in matched.into_iter().zip(results) {
        let status = match result {
            Ok(outcome) => {
                doc.apply(label.index, &outcome.placement);
                if outcome.fitted {
                    report.placed += 1;
                    LabelStatus::Placed {
                        polygon,
                        placement: outcome.placement,
                    }
                } else {
                    report.fallback += 1;
                    LabelStatus::Fallback {
                        polygon,
                        placement: outcome.placement,
                    }
                }
            }
            Err(e) => {
                log::warn!("label {} ({:?}): {e}", label.index, label.text);
                report.failed += 1;
                LabelStatus::Failed {
                    polygon,
                    error: e.to_string(),
                }
            }
        };
        report.outcomes.push(LabelOutcome {
            index: label.index,
            text: label.text.clone(),
            status,
        });
    }

    for label in unmatched {
        log::warn!("label {} ({:?}): no polygon to place it in", label.index, label.text);
        report.unmatched += 1;
        report.outcomes.push(LabelOutcome {
            index: label.index,
            text: label.text.clone(),
            status: LabelStatus::NoPolygon,
        });
    }
    report.outcomes.sort_by_key(|o| o.index);
    report
}
