use crate::cosine::{cosine, l2_norm, reference_norm};
use crate::error::VecMatchError;

/// Best row found by [`FlatIndex::search`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Row index in insertion order.
    pub index: usize,

    /// Cosine similarity between the query and the row.
    pub score: f32,
}

/// Append-only matrix of equal-length vectors searched by linear scan.
///
/// Rows are stored contiguously with their norms precomputed on insert, so
/// row `i` always corresponds to the `i`-th successful [`FlatIndex::push`].
/// Rows are never removed or reordered.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
    norms: Vec<f64>,
}

impl FlatIndex {
    /// Creates an empty index whose dimension is fixed by the first push.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty index that only accepts `dim`-length vectors.
    /// A `dim` of 0 behaves like [`FlatIndex::new`].
    pub fn with_dimension(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
            norms: Vec::new(),
        }
    }

    /// Returns the row dimension, or 0 if not yet fixed.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.norms.len()
    }

    /// Returns true if the index has no rows.
    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    /// Appends a row and returns its index.
    ///
    /// Rows holding NaN or infinite values are rejected.
    pub fn push(&mut self, vector: &[f32]) -> Result<usize, VecMatchError> {
        if vector.is_empty() {
            return Err(VecMatchError::EmptyVector);
        }
        if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
            return Err(VecMatchError::NonFinite { position });
        }
        if self.dim == 0 {
            self.dim = vector.len();
        } else if vector.len() != self.dim {
            return Err(VecMatchError::DimensionMismatch {
                got: vector.len(),
                want: self.dim,
            });
        }
        self.data.extend_from_slice(vector);
        self.norms.push(reference_norm(vector));
        Ok(self.norms.len() - 1)
    }

    /// Returns row `i`, if present.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.len() {
            return None;
        }
        Some(&self.data[i * self.dim..(i + 1) * self.dim])
    }

    /// Iterates rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim.max(1))
    }

    /// Returns the row with the highest cosine similarity to `query`.
    ///
    /// Returns `None` when the index is empty, when `query` has the wrong
    /// dimension, or when `query` has zero (or non-finite) norm. Ties keep
    /// the lowest index. Rows scoring NaN never win.
    pub fn search(&self, query: &[f32]) -> Option<Match> {
        if self.is_empty() || query.len() != self.dim {
            return None;
        }
        let query_norm = l2_norm(query);
        if query_norm == 0.0 || !query_norm.is_finite() {
            return None;
        }

        let mut best: Option<Match> = None;
        for (index, (row, &row_norm)) in self.rows().zip(self.norms.iter()).enumerate() {
            let score = cosine(query, query_norm, row, row_norm);
            if score.is_nan() {
                continue;
            }
            if best.is_none_or(|b| score > b.score) {
                best = Some(Match { index, score });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_ties_keep_first() {
        let mut idx = FlatIndex::new();
        idx.push(&[1.0, 0.0]).unwrap();
        idx.push(&[1.0, 0.0]).unwrap();
        idx.push(&[0.0, 1.0]).unwrap();

        let m = idx.search(&[1.0, 0.0]).unwrap();
        assert_eq!(m, Match { index: 0, score: 1.0 });
    }

    #[test]
    fn test_search_picks_maximum() {
        let mut idx = FlatIndex::new();
        idx.push(&[0.0, 1.0, 0.0]).unwrap();
        idx.push(&[0.9, 0.1, 0.0]).unwrap();
        idx.push(&[1.0, 0.0, 0.0]).unwrap();

        let m = idx.search(&[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(m.index, 2);
        assert!((m.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_negative_scores() {
        let mut idx = FlatIndex::new();
        idx.push(&[-1.0, 0.0]).unwrap();
        idx.push(&[-1.0, -1.0]).unwrap();

        let m = idx.search(&[1.0, 0.0]).unwrap();
        assert_eq!(m.index, 1);
        assert!(m.score < 0.0);
    }

    #[test]
    fn test_search_empty() {
        let idx = FlatIndex::new();
        assert!(idx.search(&[1.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_search_zero_query() {
        let mut idx = FlatIndex::new();
        idx.push(&[1.0, 0.0]).unwrap();
        assert!(idx.search(&[0.0, 0.0]).is_none());
    }

    #[test]
    fn test_search_wrong_dimension() {
        let mut idx = FlatIndex::new();
        idx.push(&[1.0, 0.0]).unwrap();
        assert!(idx.search(&[1.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_zero_row_scores_zero() {
        let mut idx = FlatIndex::new();
        idx.push(&[0.0, 0.0]).unwrap();
        idx.push(&[0.0, 1.0]).unwrap();

        let m = idx.search(&[1.0, 0.0]).unwrap();
        // Both rows score 0.0; the first wins.
        assert_eq!(m, Match { index: 0, score: 0.0 });
    }

    #[test]
    fn test_push_fixes_dimension() {
        let mut idx = FlatIndex::new();
        assert_eq!(idx.dim(), 0);
        assert_eq!(idx.push(&[1.0, 2.0, 3.0]), Ok(0));
        assert_eq!(idx.dim(), 3);
        assert_eq!(
            idx.push(&[1.0, 2.0]),
            Err(VecMatchError::DimensionMismatch { got: 2, want: 3 })
        );
        assert_eq!(idx.push(&[]), Err(VecMatchError::EmptyVector));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_push_rejects_non_finite() {
        let mut idx = FlatIndex::new();
        assert_eq!(
            idx.push(&[f32::INFINITY, 0.0]),
            Err(VecMatchError::NonFinite { position: 0 })
        );
        assert_eq!(
            idx.push(&[0.0, f32::NAN]),
            Err(VecMatchError::NonFinite { position: 1 })
        );
        assert!(idx.is_empty());
        assert_eq!(idx.dim(), 0);
    }

    #[test]
    fn test_nan_row_never_wins() {
        // Bypasses push validation to plant an overflowed row at index 0.
        let idx = FlatIndex {
            dim: 2,
            data: vec![f32::INFINITY, 0.0, 0.0, 1.0],
            norms: vec![f64::INFINITY, 1.0],
        };
        assert_eq!(idx.search(&[0.0, 1.0]), Some(Match { index: 1, score: 1.0 }));
    }

    #[test]
    fn test_search_with_nan_query_component() {
        let mut idx = FlatIndex::new();
        idx.push(&[1.0, 0.0]).unwrap();
        assert!(idx.search(&[f32::NAN, 1.0]).is_none());
    }

    #[test]
    fn test_with_dimension() {
        let mut idx = FlatIndex::with_dimension(2);
        assert!(idx.push(&[1.0, 0.0, 0.0]).is_err());
        assert_eq!(idx.push(&[1.0, 0.0]), Ok(0));
    }

    #[test]
    fn test_rows_in_order() {
        let mut idx = FlatIndex::new();
        idx.push(&[1.0, 2.0]).unwrap();
        idx.push(&[3.0, 4.0]).unwrap();

        let rows: Vec<&[f32]> = idx.rows().collect();
        assert_eq!(rows, vec![&[1.0, 2.0][..], &[3.0, 4.0][..]]);
        assert_eq!(idx.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(idx.row(2), None);
    }
}
