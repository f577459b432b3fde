//! Roster loading for face matching sessions.
//!
//! A [`RosterIndex`] is built once per session from the students of one or
//! more groups, as returned by a [`RosterSource`]. Students without a usable
//! face embedding are skipped with a warning; the remaining embeddings form
//! a [`FlatIndex`](rollcall_vecmatch::FlatIndex) whose row `i` belongs to
//! `students()[i]`.
//!
//! # Sources
//!
//! - [`MemoryRosterSource`]: group id -> records, for tests and file-backed
//!   rosters.
//! - [`RestRosterSource`]: PostgREST `student_group_members` query
//!   (Supabase-compatible).

mod error;
mod index;
mod record;
mod rest;
mod source;

pub use error::RosterError;
pub use index::RosterIndex;
pub use record::{GroupId, SkipReason, Student, StudentId, StudentRecord, parse_embedding};
pub use rest::RestRosterSource;
pub use source::{MemoryRosterSource, RosterSource};
