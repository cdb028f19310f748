//! Error types used by `mdfa`.

use thiserror::Error;

/// `mdfa` `Result` type.
pub type Result<T> = core::result::Result<T, Error>;

/// `mdfa` error.
///
/// This enum represents all the errors that can be produced by `mdfa`.
#[derive(Error, Debug)]
pub enum Error {
    /// The series does not contain enough observations for the requested
    /// in-sample window.
    ///
    /// The spectral estimator reads the last `needed` observations of a
    /// series. The caller must supply more data; this condition is not
    /// transient and is never retried internally.
    #[error("series too short: window needs {needed} observations, {available} available")]
    InsufficientData {
        /// Number of observations the window requires.
        needed: usize,
        /// Number of observations the series holds.
        available: usize,
    },
    /// The number of supplied series does not match the configured series
    /// count.
    ///
    /// The customization builder expects exactly one spectral snapshot per
    /// configured explanatory series. This indicates a configuration error
    /// in the caller and is fatal for the solve attempt.
    #[error("series count mismatch: parameters configure {expected} series, {actual} supplied")]
    SeriesCountMismatch {
        /// Series count held by the parameter set.
        expected: usize,
        /// Series count actually supplied.
        actual: usize,
    },
    /// A matrix was requested with invalid dimensions, or a
    /// dimension-incompatible operation was attempted.
    ///
    /// This indicates a programming error in the orchestrating code rather
    /// than a data problem.
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),
    /// The normal-equations system could not be solved.
    ///
    /// The assembled system is singular, or the factorization produced
    /// non-finite values. The error is surfaced as-is; returning a
    /// plausible-looking but wrong filter would be worse than failing.
    #[error("unable to solve normal equations: {0}")]
    SingularSystem(String),
}
