//! Error types raised by the distribution engines and model constructors.

use thiserror::Error;

/// The given character is not a valid symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid symbol: {0:?}")]
pub struct InvalidSymbol(pub char);

/// An error raised by a score distribution computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A distribution map grew past the configured number of entries.
    ///
    /// Resource limits are deterministic: retrying with the same
    /// parameters always fails the same way.
    #[error("distribution reached {entries} entries, over the limit of {limit}")]
    ResourceLimitExceeded { entries: usize, limit: usize },
    /// The background frequencies are malformed.
    #[error("invalid background: {0}")]
    InvalidBackground(String),
    /// The requested p-value is not in `[0, 1]`.
    #[error("invalid p-value: {0}")]
    InvalidPvalue(f64),
    /// The requested threshold cannot be reached by the model.
    #[error("threshold {threshold} outside of the achievable score range [{min}, {max}]")]
    ThresholdOutOfRange { threshold: f64, min: f64, max: f64 },
    /// The discretization rate is not a strictly positive number.
    #[error("invalid discretization rate: {0}")]
    InvalidDiscretization(f64),
    /// Discretized scores do not fit the integer range of the engines.
    #[error("discretized scores overflow with a rate of {0}")]
    DiscretizationOverflow(f64),
    /// The model has no positions to score.
    #[error("model has no positions")]
    EmptyModel,
    /// Invalid data was passed to initialize a model.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
