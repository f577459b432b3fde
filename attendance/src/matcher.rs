use rollcall_roster::RosterIndex;
use rollcall_vecmatch::Match;

/// A roster search score must be strictly greater than this to count as a
/// known student.
pub const KNOWN_MATCH_THRESHOLD: f32 = 0.15;

/// An unknown face is new when its best score against the session's unknown
/// pool is strictly below this.
///
/// Deliberately higher than [`KNOWN_MATCH_THRESHOLD`]; keep the two as they
/// are unless new evidence says otherwise.
pub const UNKNOWN_NOVELTY_THRESHOLD: f32 = 0.5;

/// Matching thresholds shared by streaming sessions and batch resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    pub known_threshold: f32,
    pub novelty_threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            known_threshold: KNOWN_MATCH_THRESHOLD,
            novelty_threshold: UNKNOWN_NOVELTY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Known,
    Unknown,
}

/// Outcome of resolving one face against the roster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub kind: MatchKind,
    /// Roster row of the matched student; `None` for unknown faces.
    pub row: Option<usize>,
    /// Best similarity found, 0.0 when nothing could be compared.
    pub score: f32,
}

impl MatchResult {
    /// Applies the exclusive known-match threshold to a search result.
    pub fn from_search(best: Option<Match>, threshold: f32) -> Self {
        match best {
            Some(m) if m.score > threshold => Self {
                kind: MatchKind::Known,
                row: Some(m.index),
                score: m.score,
            },
            Some(m) => Self {
                kind: MatchKind::Unknown,
                row: None,
                score: m.score,
            },
            None => Self {
                kind: MatchKind::Unknown,
                row: None,
                score: 0.0,
            },
        }
    }

    pub fn is_known(&self) -> bool {
        self.kind == MatchKind::Known
    }
}

/// Resolves `embedding` against the roster.
///
/// Embeddings that cannot be compared (zero norm, wrong dimension,
/// non-finite values) resolve to an unknown face with score 0.0.
pub(crate) fn classify(roster: &RosterIndex, embedding: &[f32], threshold: f32) -> MatchResult {
    MatchResult::from_search(roster.search(embedding), threshold)
}

/// Converts a similarity score to a display percentage.
pub fn confidence_percent(score: f32) -> i32 {
    (score * 100.0).round() as i32
}
