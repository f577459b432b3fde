use thiserror::Error;

/// Errors returned by vecmatch operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VecMatchError {
    #[error("vecmatch: empty vector")]
    EmptyVector,

    #[error("vecmatch: non-finite value at position {position}")]
    NonFinite { position: usize },

    #[error("vecmatch: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },
}
