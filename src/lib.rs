//! Fit text labels inside the polygons they annotate.
//!
//! The core is [`fit::fit`]: given a polygon and a text with an initial
//! height, find a center, rotation and height such that the text's
//! approximate box sits inside the polygon with a small margin.
//! [`relabel::relabel`] runs it over whole DXF, KML or KMZ documents.
//!
//! The binary `labelfit` tidies label positions in files from the command line.

pub mod error;
pub mod fit;
pub mod formats;
pub mod geometry;
pub mod matching;
pub mod orientation;
pub mod relabel;

pub use error::FitError;
pub use fit::{FitOptions, FitOutcome, Placement, RotationStrategy, TextSpec, fit, fit_detailed};
pub use geometry::{Point, Polygon};
