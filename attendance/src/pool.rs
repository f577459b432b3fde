use rollcall_vecmatch::{FlatIndex, VecMatchError};

use crate::matcher::UNKNOWN_NOVELTY_THRESHOLD;

/// Result of [`UnknownPool::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// True if the embedding was recorded as a new unknown face.
    pub is_new: bool,
    /// Number of distinct unknown faces recorded so far.
    pub count: usize,
}

/// Distinct unknown faces seen during one session.
///
/// An embedding is recorded when the pool is empty or when its best cosine
/// similarity to every recorded face is strictly below the novelty
/// threshold. Records are never removed, so the count only grows.
#[derive(Debug, Clone)]
pub struct UnknownPool {
    index: FlatIndex,
    novelty_threshold: f32,
}

impl UnknownPool {
    /// Creates a pool with [`UNKNOWN_NOVELTY_THRESHOLD`].
    pub fn new() -> Self {
        Self::with_threshold(UNKNOWN_NOVELTY_THRESHOLD)
    }

    pub fn with_threshold(novelty_threshold: f32) -> Self {
        Self {
            index: FlatIndex::new(),
            novelty_threshold,
        }
    }

    /// Fixes the accepted embedding length up front instead of taking it
    /// from the first recorded face.
    pub fn with_dimension(self, dim: usize) -> Self {
        Self {
            index: FlatIndex::with_dimension(dim),
            ..self
        }
    }

    /// Records `embedding` if it is not similar enough to a known unknown.
    ///
    /// A zero-norm embedding matches nothing, so it is always recorded as
    /// new. Fails if `embedding` is empty, holds non-finite values or has
    /// the wrong dimension; the pool is unchanged in that case.
    pub fn observe(&mut self, embedding: &[f32]) -> Result<Observation, VecMatchError> {
        let is_new = self
            .index
            .search(embedding)
            .is_none_or(|best| best.score < self.novelty_threshold);
        if is_new {
            self.index.push(embedding)?;
        }
        Ok(Observation {
            is_new,
            count: self.index.len(),
        })
    }

    /// Returns the number of recorded unknown faces.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Default for UnknownPool {
    fn default() -> Self {
        Self::new()
    }
}
