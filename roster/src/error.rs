use thiserror::Error;

/// Errors returned by roster operations.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The requested groups contain no students at all.
    #[error("roster: no students found for the requested groups")]
    EmptyRoster,

    /// Students exist, but none has a usable face embedding.
    #[error("roster: no usable embeddings ({absent} absent, {malformed} malformed)")]
    NoUsableEmbeddings { absent: usize, malformed: usize },

    /// The backing data source failed.
    #[error("roster: source error: {0}")]
    Source(String),
}
