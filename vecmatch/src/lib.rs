//! Brute-force cosine nearest-neighbor search.
//!
//! Sized for session-scale sets (a classroom roster, the unknown faces seen
//! during one stream), where a linear scan beats any index structure.
//!
//! # Usage
//!
//! ```
//! use rollcall_vecmatch::FlatIndex;
//!
//! let mut index = FlatIndex::new();
//! index.push(&[1.0, 0.0]).unwrap();
//! index.push(&[1.0, 0.0]).unwrap();
//! index.push(&[0.0, 1.0]).unwrap();
//!
//! let best = index.search(&[1.0, 0.0]).unwrap();
//! assert_eq!(best.index, 0);
//! assert_eq!(best.score, 1.0);
//! ```
//!
//! # Semantics
//!
//! - [`FlatIndex::search`] never applies a threshold; callers decide what
//!   score counts as a match.
//! - An empty index, a zero-norm query or a query of the wrong dimension
//!   yields `None`, which callers read as score `0.0`.
//! - Zero-norm rows are scored with [`ZERO_NORM_EPSILON`] as their norm;
//!   rows with NaN or infinite values are rejected on push.
//! - Ties resolve to the lowest row index.

mod cosine;
mod error;
mod flat;

pub use cosine::{ZERO_NORM_EPSILON, l2_norm};
pub use error::VecMatchError;
pub use flat::{FlatIndex, Match};
