//! Error types for the Excellon parsing and transform pipeline.

use thiserror::Error;

/// Errors that abort an Excellon parse or transform.
///
/// Anything not listed here is reported as a warning and processing
/// continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExcellonError {
    /// The input contained no bytes.
    #[error("empty input")]
    EmptyInput,

    /// The input is not valid UTF-8.
    #[error("invalid UTF-8 input: {0}")]
    InvalidUtf8(String),

    /// The input is G-code (a `G20`/`G21` line was found), not Excellon.
    #[error("not an Excellon file: G-code unit command `{text}` on line {line_no}")]
    WrongFormat {
        /// One-based line number of the offending line.
        line_no: usize,
        /// The offending line.
        text: String,
    },

    /// A recognized command carried a field that could not be converted.
    #[error("malformed command on line {line_no}: `{text}`")]
    Malformed {
        /// One-based line number of the offending line.
        line_no: usize,
        /// The offending line.
        text: String,
    },

    /// The host requested cancellation.
    #[error("operation cancelled")]
    Cancelled,
}
