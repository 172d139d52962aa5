//! Error taxonomy shared by the client, assembler and statistics engine.

use serde::Serialize;
use thiserror::Error;

/// Why a Johnson-SU fit was refused or abandoned.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum FitError {
    #[error("need at least {required} returns to fit Johnson-SU, got {actual}")]
    TooFewSamples { required: usize, actual: usize },
    #[error("sample has zero variance")]
    DegenerateSample,
    #[error("optimiser did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
    #[error("optimiser produced non-finite parameters")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum KlineError {
    /// Caller error: bad symbol, interval, empty sample or confidence level. Never retried.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The exchange rejected the request, the transport failed, or the body was unusable.
    #[error("data source failed (status {status:?}): {body}")]
    DataSource { status: Option<u16>, body: String },

    /// Assembled data broke an ordering/uniqueness invariant.
    #[error("series consistency violated: {0}")]
    Consistency(String),

    #[error("distribution fit failed: {0}")]
    Fit(#[from] FitError),
}

impl KlineError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn data_source(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::DataSource {
            status,
            body: body.into(),
        }
    }
}

pub type Result<T, E = KlineError> = std::result::Result<T, E>;
