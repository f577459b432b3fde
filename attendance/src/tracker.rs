use std::collections::HashSet;

use rollcall_roster::{RosterIndex, StudentId};
use tracing::{debug, info};

use crate::event::{BoxDescriptor, Event};
use crate::face::DetectedFace;
use crate::matcher::{MatchConfig, classify};
use crate::pool::UnknownPool;

/// Matching state of one session: the roster, the unknown pool and the
/// students already reported.
///
/// `seen` only grows; it is the sole guard that keeps `match` events to one
/// per student per session.
#[derive(Debug)]
pub struct AttendanceTracker {
    roster: RosterIndex,
    unknowns: UnknownPool,
    seen: HashSet<StudentId>,
    config: MatchConfig,
}

impl AttendanceTracker {
    pub fn new(roster: RosterIndex, config: MatchConfig) -> Self {
        let unknowns =
            UnknownPool::with_threshold(config.novelty_threshold).with_dimension(roster.dim());
        Self {
            roster,
            unknowns,
            seen: HashSet::new(),
            config,
        }
    }

    /// Matches one frame's faces and returns the events to emit, in order.
    ///
    /// `match` and `unknown_update` events appear in face order as they
    /// occur; the frame's `frame_data` event is always last and carries one
    /// box per face. A zero-norm embedding is an unknown face that is new
    /// every time; faces the pool cannot store (wrong dimension, non-finite
    /// values) are boxed as unknown without an `unknown_update`.
    pub fn process_frame(&mut self, faces: &[DetectedFace]) -> Vec<Event> {
        let mut events = Vec::new();
        let mut boxes = Vec::with_capacity(faces.len());

        for face in faces {
            let result = classify(&self.roster, &face.embedding, self.config.known_threshold);
            let student = result.row.and_then(|row| self.roster.student(row));
            match student {
                Some(student) if result.is_known() => {
                    boxes.push(BoxDescriptor::known(&student.name, result.score, face.bbox));
                    if self.seen.insert(student.id.clone()) {
                        info!(
                            student_id = %student.id,
                            name = %student.name,
                            score = result.score,
                            "student matched"
                        );
                        events.push(Event::Match {
                            student: student.clone(),
                        });
                    }
                }
                _ => {
                    boxes.push(BoxDescriptor::unknown(face.bbox));
                    match self.unknowns.observe(&face.embedding) {
                        Ok(obs) if obs.is_new => {
                            debug!(count = obs.count, "new unknown face");
                            events.push(Event::UnknownUpdate { count: obs.count });
                        }
                        Ok(_) => {}
                        Err(e) => debug!(error = %e, "unknown pool rejected face"),
                    }
                }
            }
        }

        events.push(Event::FrameData { boxes });
        events
    }

    pub fn roster(&self) -> &RosterIndex {
        &self.roster
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn unknown_count(&self) -> usize {
        self.unknowns.len()
    }
}
