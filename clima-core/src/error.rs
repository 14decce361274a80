use thiserror::Error;

/// Integrity problems found while reshaping a forecast response into tables.
///
/// These are never retried: a response that fails one of these checks is
/// rejected and nothing is written for that run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("response has no '{block}' block")]
    MissingBlock { block: String },

    #[error("block '{block}' has no values for requested variable '{variable}'")]
    MissingVariable { block: String, variable: String },

    #[error("variable '{variable}' in block '{block}' is not an array of numbers")]
    NonNumeric { block: String, variable: String },

    #[error(
        "variable '{variable}' in block '{block}' has {actual} values, expected {expected} (one per timestamp)"
    )]
    LengthMismatch {
        block: String,
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "block '{block}' timestamp #{index} is {actual}, too far from the expected {expected}"
    )]
    TimeAxisMismatch {
        block: String,
        index: usize,
        expected: i64,
        actual: i64,
    },

    #[error("block '{block}' has an out-of-range timestamp ({timestamp})")]
    InvalidTimestamp { block: String, timestamp: i64 },
}
