//! Presentation side of a session: display refresh and snapshot requests.
//!
//! The controlling thread calls [`Presenter::tick`] on a fixed period. A tick
//! reads the latest frame without taking it away from anyone, hands new
//! frames to the [`DisplaySurface`] and completes at most one pending
//! snapshot request.

use crate::frame_rate::FrameRateCounter;
use crate::latest::LatestFrameReader;
use gx_core::{Frame, GxResult, SessionId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where display frames go (a widget, a window, a test recorder).
pub trait DisplaySurface: Send {
    /// Show `frame` for `session`.
    fn show(&mut self, session: SessionId, frame: &Arc<Frame>);
}

/// One-shot consumer of a frame, used for "save image".
///
/// `save` runs inside the presentation tick, so sinks that touch the disk
/// should hand the frame off and return.
pub trait SnapshotSink: Send {
    /// Persist `frame`, or queue it for persisting.
    fn save(self: Box<Self>, session: SessionId, frame: &Frame) -> GxResult<()>;
}

/// Result of one presentation tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// A new frame was handed to the display surface.
    pub shown: bool,
    /// Result of a snapshot completed in this tick.
    pub snapshot: Option<GxResult<()>>,
}

/// Per-session presentation state.
pub struct Presenter<S: DisplaySurface> {
    session: SessionId,
    reader: LatestFrameReader,
    surface: S,
    pending_snapshot: Option<Box<dyn SnapshotSink>>,
    display_rate: FrameRateCounter,
}

impl<S: DisplaySurface> Presenter<S> {
    /// Presenter reading from `reader` and drawing on `surface`.
    pub fn new(session: SessionId, reader: LatestFrameReader, surface: S) -> Self {
        Self {
            session,
            reader,
            surface,
            pending_snapshot: None,
            display_rate: FrameRateCounter::new(),
        }
    }

    /// Session this presenter serves.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Save the next available frame to `sink`. Replaces an earlier
    /// request that has not been served yet.
    pub fn request_snapshot(&mut self, sink: Box<dyn SnapshotSink>) {
        if self.pending_snapshot.replace(sink).is_some() {
            debug!(session = %self.session, "Replacing pending snapshot request");
        }
    }

    /// Whether a snapshot request is waiting for a frame.
    pub fn snapshot_pending(&self) -> bool {
        self.pending_snapshot.is_some()
    }

    /// Refresh the display and serve a pending snapshot.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if let Some(frame) = self.reader.take_new() {
            self.surface.show(self.session, &frame);
            self.display_rate.record_frame();
            outcome.shown = true;
        }

        if self.pending_snapshot.is_some() {
            if let Some(frame) = self.reader.snapshot() {
                if let Some(sink) = self.pending_snapshot.take() {
                    let result = sink.save(self.session, &frame);
                    if let Err(err) = &result {
                        warn!(session = %self.session, error = %err, "Snapshot failed");
                    }
                    outcome.snapshot = Some(result);
                }
            }
        }

        outcome
    }

    /// Displayed frames per second since the previous call.
    pub fn take_display_fps(&self) -> f64 {
        self.display_rate.tick()
    }

    /// Total frames handed to the surface.
    pub fn frames_shown(&self) -> u64 {
        self.display_rate.total()
    }

    /// The display surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }
}
