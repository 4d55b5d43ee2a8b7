use thiserror::Error;

/// Errors raised for structurally invalid fitting input.
///
/// Failing to find a containing placement is not an error: [`crate::fit::fit`]
/// returns a fallback placement instead (see [`crate::fit::FitOutcome::fitted`]).
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FitError {
    #[error("invalid polygon: {reason}")]
    InvalidPolygon { reason: String },

    #[error("polygon has a non-finite coordinate")]
    NonFiniteCoordinate,

    #[error("initial text height must be finite and positive, got {0}")]
    InvalidHeight(f64),

    #[error("invalid fit options: {0}")]
    InvalidOptions(String),
}

impl FitError {
    pub(crate) fn invalid_polygon(reason: impl Into<String>) -> Self {
        Self::InvalidPolygon {
            reason: reason.into(),
        }
    }
}

pub type FitResult<T> = std::result::Result<T, FitError>;
