//! Exchange error taxonomy.
//!
//! Every failure surfaced over RPC maps to one of these kinds. Handlers
//! convert errors into `{status: "failure", response: <message>}` envelopes;
//! background loops log and continue instead of propagating.

use thiserror::Error;

/// Errors produced by the exchange controller and its collaborators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExchangeError {
    /// Unknown instrument/index/currency, bad side, non-positive size or
    /// price, leverage below one, malformed params.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The pre-trade margin gate failed, or a withdrawal exceeds the
    /// available margin.
    #[error("not enough margin")]
    InsufficientMargin,

    /// Deposit or withdrawal in a currency outside the collateral set.
    #[error("unsupported collateral: {0}")]
    UnsupportedCollateral(String),

    /// A referenced entity does not exist (e.g. cancel of an unknown order).
    #[error("not found: {0}")]
    NotFound(String),

    /// Downstream broker or oracle unreachable, or an internal consistency
    /// violation.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ExchangeError {
    /// Stable machine-readable kind for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::InvalidArgument(_) => "invalid-argument",
            ExchangeError::InsufficientMargin => "insufficient-margin",
            ExchangeError::UnsupportedCollateral(_) => "unsupported-collateral",
            ExchangeError::NotFound(_) => "not-found",
            ExchangeError::Unavailable(_) => "unavailable",
        }
    }
}

/// Convenience alias used across the crate.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
