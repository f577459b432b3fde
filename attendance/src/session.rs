use std::sync::Arc;
use std::time::Duration;

use rollcall_roster::{GroupId, RosterIndex, RosterSource};
use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::event::Event;
use crate::face::FaceDetector;
use crate::frame::decode_frame;
use crate::matcher::MatchConfig;
use crate::tracker::AttendanceTracker;
use crate::transport::{Inbound, SessionTransport};

/// Tunables of a [`MatchSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for the configuration message (default: 10s).
    pub config_timeout: Duration,
    pub matching: MatchConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            config_timeout: Duration::from_secs(10),
            matching: MatchConfig::default(),
        }
    }
}

/// Lifecycle phase of a [`MatchSession`].
///
/// ```text
/// AwaitingConfig -> LoadingRoster -> Ready -> Streaming -> Closed
///        \________________\___________\_________\-----> Errored
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingConfig,
    LoadingRoster,
    Ready,
    Streaming,
    Closed,
    Errored,
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_processed: usize,
    pub frames_skipped: usize,
    pub students_seen: usize,
    pub unknown_faces: usize,
}

#[derive(Deserialize)]
struct ConfigMessage {
    #[serde(default)]
    group_ids: Option<Vec<GroupId>>,
}

/// Parses the session's first message: `{"group_ids": [...]}`, non-empty.
pub fn parse_config(msg: &Inbound) -> Result<Vec<GroupId>, SessionError> {
    let text = match msg {
        Inbound::Text(text) => text,
        Inbound::Binary(_) => {
            return Err(SessionError::ConfigInvalid("expected a text message".into()));
        }
    };
    let cfg: ConfigMessage = serde_json::from_str(text)
        .map_err(|e| SessionError::ConfigInvalid(e.to_string()))?;
    match cfg.group_ids {
        Some(ids) if !ids.is_empty() => Ok(ids),
        _ => Err(SessionError::ConfigInvalid("group_ids missing or empty".into())),
    }
}

/// One streaming attendance connection.
///
/// The detector and roster source are shared, read-only collaborators; all
/// matching state lives in the session and is dropped with it.
pub struct MatchSession {
    config: SessionConfig,
    roster_source: Arc<dyn RosterSource>,
    detector: Arc<dyn FaceDetector>,
    phase: Phase,
    tracker: Option<AttendanceTracker>,
    summary: SessionSummary,
}

impl MatchSession {
    pub fn new(
        roster_source: Arc<dyn RosterSource>,
        detector: Arc<dyn FaceDetector>,
        config: SessionConfig,
    ) -> Self {
        Self {
            config,
            roster_source,
            detector,
            phase: Phase::AwaitingConfig,
            tracker: None,
            summary: SessionSummary::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the matching state once the roster has been loaded.
    pub fn tracker(&self) -> Option<&AttendanceTracker> {
        self.tracker.as_ref()
    }

    /// Drives the session until the client disconnects or setup fails.
    ///
    /// A normal disconnect at any point returns `Ok`. Setup failures are
    /// reported to the client as one `error` event and returned as `Err`.
    pub async fn run<T>(&mut self, transport: &mut T) -> Result<SessionSummary, SessionError>
    where
        T: SessionTransport + ?Sized,
    {
        let mut tracker = match self.establish(transport).await {
            Ok(tracker) => tracker,
            Err(e) => return self.fail(transport, e).await,
        };
        let result = self.stream(transport, &mut tracker).await;
        self.summary.students_seen = tracker.seen_count();
        self.summary.unknown_faces = tracker.unknown_count();
        self.tracker = Some(tracker);
        match result {
            Ok(()) => {
                info!(
                    frames = self.summary.frames_processed,
                    skipped = self.summary.frames_skipped,
                    students = self.summary.students_seen,
                    unknown = self.summary.unknown_faces,
                    "session closed"
                );
                Ok(self.summary.clone())
            }
            Err(e) => self.fail(transport, e).await,
        }
    }

    async fn establish<T>(&mut self, transport: &mut T) -> Result<AttendanceTracker, SessionError>
    where
        T: SessionTransport + ?Sized,
    {
        self.phase = Phase::AwaitingConfig;
        let first = match timeout(self.config.config_timeout, transport.recv()).await {
            Err(_) => return Err(SessionError::ConfigTimeout),
            Ok(Ok(Some(msg))) => msg,
            Ok(Ok(None)) => return Err(SessionError::TransportClosed),
            Ok(Err(e)) => return Err(e.into()),
        };
        let group_ids = parse_config(&first)?;
        info!(group_count = group_ids.len(), "session config received");

        self.phase = Phase::LoadingRoster;
        let roster = RosterIndex::load(self.roster_source.as_ref(), &group_ids).await?;
        let tracker = AttendanceTracker::new(roster, self.config.matching);

        transport.send(&Event::ready()).await?;
        self.phase = Phase::Ready;
        info!(students = tracker.roster().len(), "session ready");
        Ok(tracker)
    }

    async fn stream<T>(
        &mut self,
        transport: &mut T,
        tracker: &mut AttendanceTracker,
    ) -> Result<(), SessionError>
    where
        T: SessionTransport + ?Sized,
    {
        loop {
            let msg = match transport.recv().await? {
                Some(msg) => msg,
                None => {
                    self.phase = Phase::Closed;
                    return Ok(());
                }
            };

            let image = match self.frame_bytes(msg) {
                Ok(Some(image)) => image,
                Ok(None) => continue,
                Err(e) => {
                    self.skip_frame(&e);
                    continue;
                }
            };
            let faces = match self.detector.detect(&image).await {
                Ok(faces) => faces,
                Err(e) => {
                    self.skip_frame(&e.into());
                    continue;
                }
            };

            self.phase = Phase::Streaming;
            self.summary.frames_processed += 1;
            debug!(faces = faces.len(), "frame detected");
            for event in tracker.process_frame(&faces) {
                transport.send(&event).await?;
            }
        }
    }

    /// Returns the encoded image carried by `msg`, or `None` for empty
    /// messages.
    fn frame_bytes(&self, msg: Inbound) -> Result<Option<Vec<u8>>, SessionError> {
        match msg {
            Inbound::Text(text) if text.trim().is_empty() => Ok(None),
            Inbound::Text(text) => decode_frame(&text).map(Some),
            Inbound::Binary(bytes) if bytes.is_empty() => Ok(None),
            Inbound::Binary(bytes) => Ok(Some(bytes)),
        }
    }

    fn skip_frame(&mut self, err: &SessionError) {
        self.summary.frames_skipped += 1;
        debug!(error = %err, "skipping frame");
    }

    async fn fail<T>(
        &mut self,
        transport: &mut T,
        err: SessionError,
    ) -> Result<SessionSummary, SessionError>
    where
        T: SessionTransport + ?Sized,
    {
        match &err {
            SessionError::TransportClosed => {
                self.phase = Phase::Closed;
                info!("client disconnected");
                return Ok(self.summary.clone());
            }
            SessionError::RosterUnavailable(_) | SessionError::Transport(_) => {
                self.phase = Phase::Errored;
            }
            _ => self.phase = Phase::Closed,
        }

        if let Some(message) = err.client_message() {
            if let Err(e) = transport.send(&Event::error(message)).await {
                debug!(error = %e, "could not deliver error event");
            }
        }
        warn!(error = %err, phase = ?self.phase, "session ended");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_accepts_mixed_ids() {
        let ids = parse_config(&Inbound::Text(r#"{"group_ids": ["a", 7]}"#.into())).unwrap();
        assert_eq!(ids, vec![GroupId::new("a"), GroupId::new("7")]);
    }

    #[test]
    fn parse_config_rejects_invalid() {
        for text in [
            r#"{"group_ids": []}"#,
            r#"{"group_ids": null}"#,
            r#"{"groups": ["a"]}"#,
            "not json",
            "",
        ] {
            assert!(
                matches!(
                    parse_config(&Inbound::Text(text.into())),
                    Err(SessionError::ConfigInvalid(_))
                ),
                "{text:?} should be rejected"
            );
        }
        assert!(parse_config(&Inbound::Binary(b"{}".to_vec())).is_err());
    }

    #[test]
    fn default_config() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.config_timeout, Duration::from_secs(10));
        assert_eq!(cfg.matching, MatchConfig::default());
    }
}
