//! Session lifecycle states and the notifications sent to the UI layer.
//!
//! Architecture:
//! - bounded `mpsc` for one-shot events (state changes, rates, errors)
//! - non-blocking `try_send` so the acquisition thread never waits on the UI
//! - the latest frame itself is published through a `watch` channel in
//!   `gx-session`, not through this queue

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;

/// Capacity of the session event queue.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Identifies one camera pipeline (0 for the first camera, 1 for the second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u8);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cam{}", self.0)
    }
}

/// Device session lifecycle.
///
/// ```text
/// Closed → Opening → Open ⇄ Acquiring
///    ▲        │        │
///    └────────┴────────┘ (open failure / close)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No device handle.
    #[default]
    Closed,
    /// Open in progress.
    Opening,
    /// Device open, not streaming.
    Open,
    /// Acquisition loop running.
    Acquiring,
}

impl SessionState {
    /// Lowercase label used in errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Closed => "closed",
            SessionState::Opening => "opening",
            SessionState::Open => "open",
            SessionState::Acquiring => "acquiring",
        }
    }

    /// True while a device handle is held.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, SessionState::Open | SessionState::Acquiring)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session moved to a new state.
    StateChanged {
        /// Session that changed.
        session: SessionId,
        /// New state.
        state: SessionState,
    },
    /// A frame rate reporting tick completed.
    FrameRateUpdated {
        /// Reporting session.
        session: SessionId,
        /// Acquired frames per second over the last interval.
        acquisition_fps: f64,
        /// Displayed frames per second over the last interval.
        display_fps: f64,
        /// Frames acquired since acquisition start.
        total_frames: u64,
    },
    /// The acquisition loop stopped on a device fault.
    AcquisitionError {
        /// Failing session.
        session: SessionId,
        /// SDK supplied description.
        message: String,
    },
    /// Frames could not be turned into display images. Acquisition goes on.
    ///
    /// Sent at most once per
    /// [`FRAME_REJECT_NOTICE_INTERVAL`](crate::limits::FRAME_REJECT_NOTICE_INTERVAL).
    FrameRejected {
        /// Reporting session.
        session: SessionId,
        /// Why the latest rejected frame was dropped.
        message: String,
        /// Frames rejected since acquisition start.
        rejected: u64,
    },
}

impl SessionEvent {
    /// Session the event belongs to.
    #[must_use]
    pub fn session(&self) -> SessionId {
        match self {
            SessionEvent::StateChanged { session, .. }
            | SessionEvent::FrameRateUpdated { session, .. }
            | SessionEvent::AcquisitionError { session, .. }
            | SessionEvent::FrameRejected { session, .. } => *session,
        }
    }
}

/// Sending half of the event queue, cloneable across threads.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<SessionEvent>,
}

impl EventSender {
    /// Queue an event without blocking; drops it with a warning if the UI
    /// side is gone or the queue is full.
    pub fn emit(&self, event: SessionEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(session = %event.session(), ?event, "Event queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Create a bounded event queue shared by every session of a viewer.
pub fn event_channel() -> (EventSender, mpsc::Receiver<SessionEvent>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventSender { tx }, rx)
}
