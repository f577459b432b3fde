//! Real-time attendance from a stream of face detections.
//!
//! # Architecture
//!
//! A connection goes through one [`MatchSession`]:
//!
//! 1. The first inbound message selects the student groups
//!    (`{"group_ids": [...]}`).
//! 2. The groups' students are loaded into a
//!    [`RosterIndex`](rollcall_roster::RosterIndex) and a `status: ready`
//!    event is sent.
//! 3. Every later message is an encoded image. The [`FaceDetector`] turns it
//!    into [`DetectedFace`]s, and the [`AttendanceTracker`] matches each face
//!    against the roster or the session's [`UnknownPool`].
//!
//! Per frame the session emits, in order: one `match` event per student seen
//! for the first time, one `unknown_update` per new unknown face, then a
//! single `frame_data` event with every box of the frame.
//!
//! [`BatchResolver`] runs the same matching once over a single image and
//! partitions the roster into present and absent students.
//!
//! # Thresholds
//!
//! ```text
//! known match:    score >  0.15  (roster search)
//! new unknown:    score <  0.5   (unknown pool search)
//! ```

mod batch;
mod error;
mod event;
mod face;
mod frame;
mod matcher;
mod pool;
mod session;
mod tracker;
pub mod transport;

pub use batch::{BatchReport, BatchResolver, PresentStudent};
pub use error::{BatchError, DetectError, SessionError, TransportError};
pub use event::{BoxColor, BoxDescriptor, Event};
pub use face::{BoundingBox, DetectedFace, FaceDetector};
pub use frame::decode_frame;
pub use matcher::{
    KNOWN_MATCH_THRESHOLD, MatchConfig, MatchKind, MatchResult, UNKNOWN_NOVELTY_THRESHOLD,
    confidence_percent,
};
pub use pool::{Observation, UnknownPool};
pub use session::{MatchSession, Phase, SessionConfig, SessionSummary, parse_config};
pub use tracker::AttendanceTracker;
pub use transport::{Inbound, SessionTransport};
