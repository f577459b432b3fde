use rollcall_roster::RosterError;
use thiserror::Error;

/// Errors returned by a [`FaceDetector`](crate::FaceDetector).
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detect: invalid image: {0}")]
    InvalidImage(String),

    #[error("detect: model error: {0}")]
    Model(String),
}

/// Errors returned by a [`SessionTransport`](crate::SessionTransport).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transport: connection closed")]
    Closed,

    #[error("transport: send failed: {0}")]
    SendFailed(String),

    #[error("transport: receive failed: {0}")]
    ReceiveFailed(String),
}

/// Errors that end or interrupt a [`MatchSession`](crate::MatchSession).
///
/// Establishment errors end the session with one `error` event. Frame
/// errors only skip the frame they came from.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session: config not received in time")]
    ConfigTimeout,

    #[error("session: invalid config: {0}")]
    ConfigInvalid(String),

    #[error("session: no students found for the requested groups")]
    EmptyRoster,

    #[error("session: no usable embeddings ({absent} absent, {malformed} malformed)")]
    NoUsableEmbeddings { absent: usize, malformed: usize },

    #[error("session: roster unavailable: {0}")]
    RosterUnavailable(String),

    #[error("session: frame decode failed: {0}")]
    FrameDecode(String),

    #[error("session: {0}")]
    Detect(#[from] DetectError),

    #[error("session: transport closed")]
    TransportClosed,

    #[error("session: {0}")]
    Transport(TransportError),
}

impl SessionError {
    /// Returns the text of the `error` event sent to the client, or `None`
    /// for errors that are not reported (frame errors, closed transports).
    pub fn client_message(&self) -> Option<&'static str> {
        match self {
            Self::ConfigTimeout => Some("Did not receive config in time."),
            Self::ConfigInvalid(_) => Some("Invalid config: group_ids must be a non-empty array."),
            Self::EmptyRoster => Some("No students found for these groups."),
            Self::NoUsableEmbeddings { malformed: 0, .. } => {
                Some("No students in these groups have registered faces.")
            }
            Self::NoUsableEmbeddings { .. } => {
                Some("No students in these groups have valid registered faces.")
            }
            Self::RosterUnavailable(_) => Some("Failed to load roster."),
            Self::FrameDecode(_) | Self::Detect(_) | Self::TransportClosed | Self::Transport(_) => {
                None
            }
        }
    }
}

impl From<RosterError> for SessionError {
    fn from(e: RosterError) -> Self {
        match e {
            RosterError::EmptyRoster => Self::EmptyRoster,
            RosterError::NoUsableEmbeddings { absent, malformed } => {
                Self::NoUsableEmbeddings { absent, malformed }
            }
            RosterError::Source(msg) => Self::RosterUnavailable(msg),
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Closed => Self::TransportClosed,
            other => Self::Transport(other),
        }
    }
}

/// Errors returned by [`BatchResolver::resolve_image`](crate::BatchResolver::resolve_image).
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch: group_ids must be a non-empty array")]
    NoGroups,

    #[error("batch: {0}")]
    Roster(#[from] RosterError),

    #[error("batch: {0}")]
    Detect(#[from] DetectError),
}
