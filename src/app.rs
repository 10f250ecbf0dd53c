//! Viewer runtime: up to two camera sessions driven from one async task.
//!
//! The controlling task owns every [`SessionController`] and [`Presenter`].
//! Acquisition runs on the sessions' own threads; this loop only reacts to
//! timers and session events:
//!
//! - show interval (33 ms): refresh each presenter
//! - rate interval (500 ms): publish acquisition and display frame rates
//! - `AcquisitionError`: fold the dead session back to `Open`
//! - `FrameRejected`: surface conversion failures, acquisition continues
//! - optional snapshot timer: request one "save image" per session
//! - snapshot jobs: encode and write on the blocking pool, never inline

use crate::config::{AcquisitionConfig, SessionConfig, MAX_SESSIONS};
use crate::snapshot::{QueuedSnapshot, SnapshotJob};
use gx_core::{
    event_channel, DeviceBaseInfo, DeviceSdk, EventSender, Frame, GxError, GxResult,
    SessionEvent, SessionId, SessionState,
};
use gx_session::{DeviceParams, DisplaySurface, Presenter, SessionController, StatsSnapshot};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

/// Display surface for runs without a window: logs each frame it is given.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    shown: u64,
    last_mean: f64,
}

impl HeadlessSurface {
    /// Frames handed to this surface.
    pub fn shown(&self) -> u64 {
        self.shown
    }

    /// Mean sample value of the most recent frame.
    pub fn last_mean(&self) -> f64 {
        self.last_mean
    }
}

impl DisplaySurface for HeadlessSurface {
    fn show(&mut self, session: SessionId, frame: &Arc<Frame>) {
        self.shown += 1;
        self.last_mean = frame.mean();
        trace!(
            %session,
            frame_id = frame.frame_id,
            width = frame.width,
            height = frame.height,
            mean = self.last_mean,
            "Frame shown"
        );
    }
}

struct SessionSlot<S: DisplaySurface> {
    controller: SessionController,
    presenter: Presenter<S>,
    snapshot_path: Option<PathBuf>,
    last_fps: Option<f64>,
    snapshots_saved: u32,
}

/// Per-session outcome of [`Viewer::run`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session
    pub id: SessionId,
    /// Session state when the summary was taken
    pub state: SessionState,
    /// Device index the session opened
    pub device_index: Option<u32>,
    /// Device properties read at open
    pub params: DeviceParams,
    /// Acquisition counters
    pub stats: StatsSnapshot,
    /// Frames handed to the display surface
    pub frames_shown: u64,
    /// Most recent acquisition frame rate
    pub last_fps: Option<f64>,
    /// Snapshots written
    pub snapshots_saved: u32,
    /// Device fault that stopped acquisition, if any
    pub last_error: Option<String>,
}

/// Outcome of [`Viewer::run`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// One entry per session, in session order
    pub sessions: Vec<SessionSummary>,
}

/// Owner of the camera sessions and their presenters.
pub struct Viewer<S: DisplaySurface> {
    sdk: Arc<dyn DeviceSdk>,
    timing: AcquisitionConfig,
    events: EventSender,
    event_rx: mpsc::Receiver<SessionEvent>,
    snapshot_tx: mpsc::UnboundedSender<SnapshotJob>,
    snapshot_rx: mpsc::UnboundedReceiver<SnapshotJob>,
    slots: Vec<SessionSlot<S>>,
}

impl<S: DisplaySurface> Viewer<S> {
    /// Viewer over `sdk` with the given loop timing.
    pub fn new(sdk: Arc<dyn DeviceSdk>, timing: AcquisitionConfig) -> Self {
        let (events, event_rx) = event_channel();
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        Self {
            sdk,
            timing,
            events,
            event_rx,
            snapshot_tx,
            snapshot_rx,
            slots: Vec::with_capacity(MAX_SESSIONS),
        }
    }

    /// Discover reachable cameras.
    pub fn list_devices(&self) -> GxResult<Vec<DeviceBaseInfo>> {
        let devices = self.sdk.enumerate_devices(self.timing.enumerate_timeout())?;
        debug!(count = devices.len(), "Devices enumerated");
        Ok(devices)
    }

    /// Open a camera, apply its trigger settings and start acquisition.
    ///
    /// A session that fails partway is closed again and not kept.
    pub fn add_session(&mut self, config: &SessionConfig, surface: S) -> GxResult<SessionId> {
        if self.slots.len() >= MAX_SESSIONS {
            return Err(GxError::ResourceExhausted(format!(
                "at most {} sessions per viewer",
                MAX_SESSIONS
            )));
        }
        let id = SessionId(self.slots.len() as u8);
        let mut controller = SessionController::new(id, Arc::clone(&self.sdk), self.events.clone())
            .with_dequeue_timeout(self.timing.dequeue_timeout());

        controller.open(config.device_index)?;
        if controller.params().trigger_mode_supported {
            controller.set_trigger_source(config.trigger_source)?;
            controller.set_trigger_mode(config.trigger_mode)?;
        } else if config.trigger_mode != controller.params().trigger_mode {
            warn!(session = %id, "Device has no trigger mode, ignoring trigger settings");
        }
        controller.start_acquisition()?;

        let presenter = controller.presenter(surface);
        self.slots.push(SessionSlot {
            controller,
            presenter,
            snapshot_path: config.snapshot_path.clone(),
            last_fps: None,
            snapshots_saved: 0,
        });
        info!(session = %id, device_index = config.device_index, "Session added");
        Ok(id)
    }

    /// Controller of session `id`.
    pub fn session(&self, id: SessionId) -> Option<&SessionController> {
        self.slot(id).map(|slot| &slot.controller)
    }

    /// Mutable controller of session `id`, for trigger changes and restarts.
    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut SessionController> {
        self.slot_mut(id).map(|slot| &mut slot.controller)
    }

    /// Presenter of session `id`.
    pub fn presenter(&self, id: SessionId) -> Option<&Presenter<S>> {
        self.slot(id).map(|slot| &slot.presenter)
    }

    /// Number of sessions.
    pub fn session_count(&self) -> usize {
        self.slots.len()
    }

    /// Save the next frame of session `id` to its configured snapshot path.
    ///
    /// The file is written in the background while [`Viewer::run`] is
    /// active; `snapshots_saved` counts completed writes.
    pub fn request_snapshot(&mut self, id: SessionId) -> GxResult<()> {
        let jobs = self.snapshot_tx.clone();
        let slot = self
            .slot_mut(id)
            .ok_or_else(|| GxError::Configuration(format!("no session {}", id)))?;
        request_snapshot(slot, jobs)
    }

    fn slot(&self, id: SessionId) -> Option<&SessionSlot<S>> {
        self.slots.iter().find(|slot| slot.controller.id() == id)
    }

    fn slot_mut(&mut self, id: SessionId) -> Option<&mut SessionSlot<S>> {
        self.slots.iter_mut().find(|slot| slot.controller.id() == id)
    }

    /// Drive presentation and rate reporting until `shutdown` completes.
    ///
    /// With `snapshot_after`, every session with a snapshot path saves one
    /// frame once that much time has passed. Snapshot writes still in
    /// flight at shutdown are awaited before the summary is taken.
    pub async fn run<F>(&mut self, shutdown: F, snapshot_after: Option<Duration>) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut show = tokio::time::interval(self.timing.show_interval());
        show.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut rate = tokio::time::interval(self.timing.frame_rate_interval());
        rate.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately; rates cover whole intervals
        rate.tick().await;

        let snapshot_timer = async {
            match snapshot_after {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(shutdown);
        tokio::pin!(snapshot_timer);
        let mut snapshot_armed = snapshot_after.is_some();

        let Self {
            slots,
            event_rx,
            snapshot_tx,
            snapshot_rx,
            ..
        } = self;
        let mut writes: JoinSet<(SessionId, GxResult<()>)> = JoinSet::new();
        info!(sessions = slots.len(), "Viewer running");

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = show.tick() => {
                    for slot in slots.iter_mut() {
                        slot.presenter.tick();
                    }
                }
                _ = rate.tick() => {
                    for slot in slots.iter_mut() {
                        let display_fps = slot.presenter.take_display_fps();
                        if let Some(fps) = slot.controller.report_frame_rate(display_fps) {
                            slot.last_fps = Some(fps);
                        }
                    }
                }
                () = &mut snapshot_timer, if snapshot_armed => {
                    snapshot_armed = false;
                    for slot in slots.iter_mut().filter(|slot| slot.snapshot_path.is_some()) {
                        let session = slot.controller.id();
                        if let Err(err) = request_snapshot(slot, snapshot_tx.clone()) {
                            warn!(%session, error = %err, "Snapshot request failed");
                        }
                    }
                }
                Some(job) = snapshot_rx.recv() => {
                    writes.spawn_blocking(move || job.write());
                }
                Some(joined) = writes.join_next(), if !writes.is_empty() => {
                    record_write(slots, joined);
                }
                Some(event) = event_rx.recv() => handle_event(slots, event),
            }
        }

        info!(pending_writes = writes.len(), "Viewer stopping");
        while let Ok(job) = snapshot_rx.try_recv() {
            writes.spawn_blocking(move || job.write());
        }
        while let Some(joined) = writes.join_next().await {
            record_write(slots, joined);
        }
        self.summary()
    }

    /// Counters and rates of every session.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            sessions: self
                .slots
                .iter()
                .map(|slot| SessionSummary {
                    id: slot.controller.id(),
                    state: slot.controller.state(),
                    device_index: slot.controller.device_index(),
                    params: *slot.controller.params(),
                    stats: slot.controller.stats(),
                    frames_shown: slot.presenter.frames_shown(),
                    last_fps: slot.last_fps,
                    snapshots_saved: slot.snapshots_saved,
                    last_error: slot.controller.last_error().map(str::to_owned),
                })
                .collect(),
        }
    }

    /// Close every session. Returns the last close failure, after trying all.
    pub fn shutdown(&mut self) -> GxResult<()> {
        let mut result = Ok(());
        for slot in self.slots.iter_mut().filter(|slot| slot.controller.is_open()) {
            if let Err(err) = slot.controller.close() {
                error!(session = %slot.controller.id(), error = %err, "Close failed");
                result = Err(err);
            }
        }
        result
    }
}

fn request_snapshot<S: DisplaySurface>(
    slot: &mut SessionSlot<S>,
    jobs: mpsc::UnboundedSender<SnapshotJob>,
) -> GxResult<()> {
    let path = slot.snapshot_path.clone().ok_or_else(|| {
        GxError::Configuration(format!("session {} has no snapshot_path", slot.controller.id()))
    })?;
    slot.presenter.request_snapshot(Box::new(QueuedSnapshot::new(path, jobs)));
    Ok(())
}

type WriteResult = Result<(SessionId, GxResult<()>), JoinError>;

fn record_write<S: DisplaySurface>(slots: &mut [SessionSlot<S>], joined: WriteResult) {
    match joined {
        Ok((session, Ok(()))) => {
            if let Some(slot) = slots.iter_mut().find(|slot| slot.controller.id() == session) {
                slot.snapshots_saved += 1;
            }
        }
        Ok((session, Err(err))) => warn!(%session, error = %err, "Snapshot write failed"),
        Err(err) => error!(error = %err, "Snapshot writer task failed"),
    }
}

fn handle_event<S: DisplaySurface>(slots: &mut [SessionSlot<S>], event: SessionEvent) {
    match event {
        SessionEvent::StateChanged { session, state } => {
            debug!(%session, %state, "State changed");
        }
        SessionEvent::FrameRateUpdated {
            session,
            acquisition_fps,
            display_fps,
            total_frames,
        } => {
            info!(
                %session,
                "{:.1} fps acquired, {:.1} fps shown, {} frames",
                acquisition_fps,
                display_fps,
                total_frames
            );
        }
        SessionEvent::AcquisitionError { session, message } => {
            error!(%session, %message, "Acquisition stopped on device error");
            if let Some(slot) = slots.iter_mut().find(|slot| slot.controller.id() == session) {
                slot.controller.reap_finished_acquisition();
            }
        }
        SessionEvent::FrameRejected {
            session,
            message,
            rejected,
        } => {
            warn!(%session, rejected, %message, "Camera frames cannot be displayed");
        }
    }
}
