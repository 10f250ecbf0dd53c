//! Device session controller.
//!
//! Owns one camera from open to close and is the only place that changes
//! session state:
//!
//! ```text
//! Closed ──open──► Opening ──► Open ──start_acquisition──► Acquiring
//!   ▲                 │         ▲  ◄──stop_acquisition──────┘
//!   │   (open failed) │         │  ◄──acquisition fault (reap)
//!   └─────────────────┴──close──┘
//! ```
//!
//! All methods run on the controlling thread. The acquisition thread only
//! shares the latest frame, the frame rate counter and its own run flag.

use crate::acquisition::{
    AcquisitionContext, AcquisitionLoop, AcquisitionStats, LoopExit, StatsSnapshot,
};
use crate::frame_rate::FrameRateCounter;
use crate::latest::{LatestFrame, LatestFrameReader};
use crate::presentation::{DisplaySurface, Presenter};
use gx_core::limits::{self, DEQUEUE_TIMEOUT};
use gx_core::{
    DeviceHandle, DeviceSdk, EventSender, Feature, GxError, GxResult, IntParam, SessionEvent,
    SessionId, SessionState, TriggerMode, TriggerSource,
};
use gx_pool::FrameBufferPool;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Device properties read after open.
///
/// Queries that fail leave the conservative default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceParams {
    /// Payload size reported at open time.
    pub payload_size: Option<u64>,
    /// Sensor has a colour filter.
    pub is_color: bool,
    /// Trigger mode can be switched.
    pub trigger_mode_supported: bool,
    /// Software trigger command exists.
    pub soft_trigger_supported: bool,
    /// Last trigger mode set or read.
    pub trigger_mode: TriggerMode,
    /// Last trigger source set.
    pub trigger_source: TriggerSource,
}

impl DeviceParams {
    /// Whether a software trigger may be sent in the current configuration.
    #[must_use]
    pub fn soft_trigger_enabled(&self) -> bool {
        self.soft_trigger_supported
            && self.trigger_mode == TriggerMode::On
            && self.trigger_source == TriggerSource::Software
    }
}

/// Resources alive only while acquiring.
#[derive(Debug)]
struct ActiveAcquisition {
    acquisition: AcquisitionLoop,
    pool: FrameBufferPool,
}

/// Controller for one camera session.
pub struct SessionController {
    id: SessionId,
    sdk: Arc<dyn DeviceSdk>,
    events: EventSender,
    dequeue_timeout: Duration,
    state: SessionState,
    device_index: Option<u32>,
    device: Option<Arc<dyn DeviceHandle>>,
    params: DeviceParams,
    buffer_count: Option<usize>,
    active: Option<ActiveAcquisition>,
    latest: Arc<LatestFrame>,
    counter: Arc<FrameRateCounter>,
    stats: Arc<AcquisitionStats>,
    last_error: Option<String>,
}

impl SessionController {
    /// Closed session `id` using `sdk`, reporting through `events`.
    pub fn new(id: SessionId, sdk: Arc<dyn DeviceSdk>, events: EventSender) -> Self {
        Self {
            id,
            sdk,
            events,
            dequeue_timeout: DEQUEUE_TIMEOUT,
            state: SessionState::Closed,
            device_index: None,
            device: None,
            params: DeviceParams::default(),
            buffer_count: None,
            active: None,
            latest: Arc::new(LatestFrame::new()),
            counter: Arc::new(FrameRateCounter::new()),
            stats: Arc::new(AcquisitionStats::default()),
            last_error: None,
        }
    }

    /// Override the per-call dequeue wait.
    #[must_use]
    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a device is open.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Whether the acquisition loop is bound.
    pub fn is_acquiring(&self) -> bool {
        self.state == SessionState::Acquiring
    }

    /// 1-based index of the open device.
    pub fn device_index(&self) -> Option<u32> {
        self.device_index
    }

    /// Device properties read at open.
    pub fn params(&self) -> &DeviceParams {
        &self.params
    }

    /// Buffer count used by the current or most recent acquisition.
    pub fn buffer_count(&self) -> Option<usize> {
        self.buffer_count
    }

    /// Acquisition counters since the last start.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Message of the last acquisition fault, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Reader for this session's latest frame.
    pub fn subscribe(&self) -> LatestFrameReader {
        self.latest.subscribe()
    }

    /// Presenter bound to this session's latest frame.
    pub fn presenter<S: DisplaySurface>(&self, surface: S) -> Presenter<S> {
        Presenter::new(self.id, self.subscribe(), surface)
    }

    /// Capture buffers currently free, while acquiring.
    pub fn pool_available(&self) -> Option<usize> {
        self.active.as_ref().map(|active| active.pool.available())
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!(session = %self.id, from = %self.state, to = %state, "Session state change");
        self.state = state;
        self.events.emit(SessionEvent::StateChanged {
            session: self.id,
            state,
        });
    }

    fn require(&self, operation: &'static str, allowed: &[SessionState]) -> GxResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(GxError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    fn open_device(&self, operation: &'static str) -> GxResult<&Arc<dyn DeviceHandle>> {
        self.device.as_ref().ok_or(GxError::InvalidState {
            operation,
            state: self.state.as_str(),
        })
    }

    /// Open the device at 1-based `index`.
    ///
    /// On SDK failure the session returns to `Closed` and
    /// [`GxError::DeviceOpenFailed`] is returned.
    pub fn open(&mut self, index: u32) -> GxResult<()> {
        self.require("open", &[SessionState::Closed])?;
        self.set_state(SessionState::Opening);

        let device = match self.sdk.open(index) {
            Ok(device) => device,
            Err(source) => {
                warn!(session = %self.id, index, error = %source, "Open failed");
                self.set_state(SessionState::Closed);
                return Err(GxError::DeviceOpenFailed { index, source });
            }
        };

        self.device = Some(device);
        self.device_index = Some(index);
        self.last_error = None;
        self.set_state(SessionState::Open);
        self.seed_params();
        info!(session = %self.id, index, params = ?self.params, "Device opened");
        Ok(())
    }

    fn seed_params(&mut self) {
        let Some(device) = self.device.as_ref() else {
            return;
        };
        let session = self.id;
        let mut params = DeviceParams::default();

        match device.get_int(IntParam::PayloadSize) {
            Ok(size) => params.payload_size = u64::try_from(size).ok(),
            Err(err) => warn!(%session, error = %err, "Payload size query failed"),
        }
        let feature = |feature: Feature| match device.is_implemented(feature) {
            Ok(supported) => supported,
            Err(err) => {
                warn!(%session, ?feature, error = %err, "Feature query failed");
                false
            }
        };
        params.is_color = feature(Feature::ColorFilter);
        params.trigger_mode_supported = feature(Feature::TriggerMode);
        params.soft_trigger_supported = feature(Feature::TriggerSoftware);

        if params.trigger_mode_supported {
            match device.trigger_mode() {
                Ok(mode) => params.trigger_mode = mode,
                Err(err) => warn!(%session, error = %err, "Trigger mode query failed"),
            }
        }

        self.params = params;
    }

    /// Size buffers, start streaming and spawn the acquisition thread.
    ///
    /// Only valid while `Open`. Every failure leaves the session `Open` with
    /// no acquisition resources held.
    pub fn start_acquisition(&mut self) -> GxResult<()> {
        self.require("start acquisition", &[SessionState::Open])?;
        let device = Arc::clone(self.open_device("start acquisition")?);

        let payload = device.get_int(IntParam::PayloadSize)?;
        if payload == 0 {
            warn!(session = %self.id, "Payload size is 0");
            return Err(GxError::ZeroPayload);
        }
        let payload = u64::try_from(payload).map_err(|_| GxError::InvalidPayload)?;
        let buffer_bytes = usize::try_from(payload).map_err(|_| GxError::InvalidPayload)?;

        let count = limits::buffer_count(payload)?;
        device.set_buffer_count(count)?;

        let pool = FrameBufferPool::try_new(count, buffer_bytes).map_err(|e| {
            GxError::ResourceExhausted(format!(
                "{} capture buffers of {} bytes: {}",
                count, buffer_bytes, e
            ))
        })?;

        device.stream_on()?;

        self.counter.reset_at(Instant::now());
        self.stats.reset();

        let ctx = AcquisitionContext {
            session: self.id,
            device: Arc::clone(&device),
            pool: pool.clone(),
            latest: Arc::clone(&self.latest),
            counter: Arc::clone(&self.counter),
            stats: Arc::clone(&self.stats),
            events: self.events.clone(),
            dequeue_timeout: self.dequeue_timeout,
        };
        let acquisition = match AcquisitionLoop::spawn(ctx) {
            Ok(acquisition) => acquisition,
            Err(err) => {
                if let Err(off) = device.stream_off() {
                    warn!(session = %self.id, error = %off, "Stream off after failed start");
                }
                return Err(err);
            }
        };

        self.buffer_count = Some(count);
        self.active = Some(ActiveAcquisition { acquisition, pool });
        self.last_error = None;
        self.set_state(SessionState::Acquiring);
        info!(session = %self.id, buffer_count = count, payload, "Acquisition started");
        Ok(())
    }

    /// Stop the acquisition thread, stop streaming and release the buffers.
    ///
    /// Blocks until the thread exits, which is bounded by the dequeue
    /// timeout unless the SDK call itself hangs.
    pub fn stop_acquisition(&mut self) -> GxResult<()> {
        self.require("stop acquisition", &[SessionState::Acquiring])?;
        let exit = self.teardown_acquisition();
        info!(session = %self.id, ?exit, stats = ?self.stats.snapshot(), "Acquisition stopped");
        Ok(())
    }

    /// Fold a dead acquisition thread back into `Open`.
    ///
    /// Returns how the thread ended when it stopped on its own (device
    /// fault or panic), `None` when nothing needed reaping.
    pub fn reap_finished_acquisition(&mut self) -> Option<LoopExit> {
        // A failing loop clears its own run flag before reporting the error
        let finished = self.active.as_ref().is_some_and(|active| {
            !active.acquisition.is_running() || active.acquisition.is_finished()
        });
        if !finished {
            return None;
        }
        let exit = self.teardown_acquisition();
        if let LoopExit::Failed(message) = &exit {
            self.last_error = Some(message.clone());
        }
        warn!(session = %self.id, ?exit, "Acquisition ended without a stop request");
        Some(exit)
    }

    fn teardown_acquisition(&mut self) -> LoopExit {
        let exit = match self.active.take() {
            Some(ActiveAcquisition { acquisition, pool }) => {
                let exit = acquisition.stop();
                if let Some(device) = self.device.as_ref() {
                    if let Err(err) = device.stream_off() {
                        warn!(session = %self.id, error = %err, "Stream off failed");
                    }
                }
                self.latest.detach();
                debug!(
                    session = %self.id,
                    available = pool.available(),
                    size = pool.size(),
                    "Releasing capture buffers"
                );
                exit
            }
            None => LoopExit::Stopped,
        };
        self.set_state(SessionState::Open);
        exit
    }

    /// Close the device, stopping acquisition first if needed.
    ///
    /// If the SDK refuses to close, the session stays `Open` and the error
    /// is returned.
    pub fn close(&mut self) -> GxResult<()> {
        self.require("close", &[SessionState::Open, SessionState::Acquiring])?;
        if self.state == SessionState::Acquiring {
            self.stop_acquisition()?;
        }

        let device = Arc::clone(self.open_device("close")?);
        device.close()?;

        self.latest.clear();
        self.device = None;
        self.device_index = None;
        self.params = DeviceParams::default();
        self.set_state(SessionState::Closed);
        info!(session = %self.id, "Device closed");
        Ok(())
    }

    /// Switch trigger mode. Allowed while open or acquiring.
    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> GxResult<()> {
        self.require("set trigger mode", &[SessionState::Open, SessionState::Acquiring])?;
        if !self.params.trigger_mode_supported {
            return Err(GxError::Unsupported("trigger mode"));
        }
        self.open_device("set trigger mode")?.set_trigger_mode(mode)?;
        self.params.trigger_mode = mode;
        info!(
            session = %self.id,
            ?mode,
            soft_trigger = self.params.soft_trigger_enabled(),
            "Trigger mode set"
        );
        Ok(())
    }

    /// Select the trigger source. Allowed while open or acquiring.
    pub fn set_trigger_source(&mut self, source: TriggerSource) -> GxResult<()> {
        self.require("set trigger source", &[SessionState::Open, SessionState::Acquiring])?;
        if !self.params.trigger_mode_supported {
            return Err(GxError::Unsupported("trigger source"));
        }
        self.open_device("set trigger source")?.set_trigger_source(source)?;
        self.params.trigger_source = source;
        info!(
            session = %self.id,
            ?source,
            soft_trigger = self.params.soft_trigger_enabled(),
            "Trigger source set"
        );
        Ok(())
    }

    /// Issue a software trigger.
    ///
    /// Requires trigger mode `On` with the `Software` source.
    pub fn send_software_trigger(&self) -> GxResult<()> {
        self.require("send software trigger", &[SessionState::Open, SessionState::Acquiring])?;
        if !self.params.soft_trigger_enabled() {
            return Err(GxError::Unsupported("software trigger outside software trigger mode"));
        }
        self.open_device("send software trigger")?.send_software_trigger()?;
        debug!(session = %self.id, "Software trigger sent");
        Ok(())
    }

    /// Close the current frame rate interval and publish it.
    ///
    /// `display_fps` comes from the session's presenter. Returns the
    /// acquisition rate, or `None` when not acquiring.
    pub fn report_frame_rate(&mut self, display_fps: f64) -> Option<f64> {
        self.reap_finished_acquisition();
        if self.state != SessionState::Acquiring {
            return None;
        }
        let fps = self.counter.tick();
        let total_frames = self.counter.total();
        debug!(session = %self.id, fps, display_fps, total_frames, "Frame rate");
        self.events.emit(SessionEvent::FrameRateUpdated {
            session: self.id,
            acquisition_fps: fps,
            display_fps,
            total_frames,
        });
        Some(fps)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if !self.state.is_open() {
            return;
        }
        if let Err(err) = self.close() {
            error!(session = %self.id, error = %err, "Close on drop failed");
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("device_index", &self.device_index)
            .field("params", &self.params)
            .field("buffer_count", &self.buffer_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gx_core::{event_channel, PixelFormat, SessionEvent};
    use gx_driver_mock::{ErrorConfig, ErrorScenario, MockDeviceConfig, MockSdk};
    use tokio::sync::mpsc;

    fn controller(sdk: MockSdk) -> (SessionController, mpsc::Receiver<SessionEvent>, Arc<MockSdk>) {
        let sdk = Arc::new(sdk);
        let (events, rx) = event_channel();
        let ctl = SessionController::new(SessionId(0), sdk.clone(), events)
            .with_dequeue_timeout(Duration::from_millis(20));
        (ctl, rx, sdk)
    }

    fn one_camera() -> MockSdk {
        MockSdk::with_devices([MockDeviceConfig::new("SN1").resolution(32, 24)])
    }

    fn drain(rx: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn states(events: &[SessionEvent]) -> Vec<SessionState> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn open_seeds_params_and_emits_states() {
        let sdk = MockSdk::with_devices([MockDeviceConfig::new("SN1")
            .resolution(32, 24)
            .pixel_format(PixelFormat::BayerRg8)]);
        let (mut ctl, mut rx, _sdk) = controller(sdk);

        ctl.open(1).unwrap();
        assert_eq!(ctl.state(), SessionState::Open);
        assert_eq!(ctl.device_index(), Some(1));
        let params = ctl.params();
        assert_eq!(params.payload_size, Some(768));
        assert!(params.is_color);
        assert!(params.trigger_mode_supported);
        assert_eq!(params.trigger_mode, TriggerMode::Off);
        assert!(!params.soft_trigger_enabled());

        assert_eq!(states(&drain(&mut rx)), vec![SessionState::Opening, SessionState::Open]);
    }

    #[test]
    fn open_failure_returns_to_closed() {
        let (mut ctl, mut rx, _sdk) = controller(one_camera());
        let err = ctl.open(3).unwrap_err();
        assert!(matches!(err, GxError::DeviceOpenFailed { index: 3, .. }));
        assert_eq!(ctl.state(), SessionState::Closed);
        assert_eq!(states(&drain(&mut rx)), vec![SessionState::Opening, SessionState::Closed]);
    }

    #[test]
    fn start_from_closed_has_no_side_effects() {
        let (mut ctl, mut rx, sdk) = controller(one_camera());
        let err = ctl.start_acquisition().unwrap_err();
        assert!(matches!(err, GxError::InvalidState { state: "closed", .. }));
        assert_eq!(ctl.state(), SessionState::Closed);
        assert!(drain(&mut rx).is_empty());
        assert!(sdk.device(1).is_none(), "device was never opened");
    }

    #[test]
    fn start_sizes_buffers_and_streams() {
        let (mut ctl, _rx, sdk) = controller(MockSdk::with_devices([
            MockDeviceConfig::new("SN1").resolution(640, 480),
        ]));
        ctl.open(1).unwrap();
        ctl.start_acquisition().unwrap();

        assert_eq!(ctl.state(), SessionState::Acquiring);
        assert_eq!(ctl.buffer_count(), Some(27));
        let device = sdk.device(1).unwrap();
        assert_eq!(device.buffer_count(), 27);
        assert!(device.is_streaming());

        ctl.stop_acquisition().unwrap();
        assert_eq!(ctl.state(), SessionState::Open);
        assert!(!device.is_streaming());
        assert_eq!(ctl.pool_available(), None);
    }

    #[test]
    fn stop_releases_pool_but_keeps_last_image() {
        let (mut ctl, _rx, _sdk) = controller(MockSdk::with_devices([
            MockDeviceConfig::new("SN1").resolution(640, 480),
        ]));
        ctl.open(1).unwrap();
        ctl.start_acquisition().unwrap();
        let reader = ctl.subscribe();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while reader.snapshot().is_none() {
            assert!(std::time::Instant::now() < deadline, "no frame published");
            std::thread::sleep(Duration::from_millis(5));
        }
        let pool = ctl.active.as_ref().unwrap().pool.clone();

        ctl.stop_acquisition().unwrap();
        assert_eq!(pool.available(), pool.size(), "every capture buffer is back");
        let last = reader.snapshot().expect("last image stays visible");
        assert_eq!(last.data.len(), 640 * 480);

        drop(last);
        ctl.close().unwrap();
        assert!(ctl.subscribe().snapshot().is_none());
    }

    #[test]
    fn zero_payload_is_rejected_without_state_change() {
        let (mut ctl, mut rx, sdk) = controller(MockSdk::with_devices([
            MockDeviceConfig::new("SN1").payload_size(0),
        ]));
        ctl.open(1).unwrap();
        drain(&mut rx);

        let err = ctl.start_acquisition().unwrap_err();
        assert!(matches!(err, GxError::ZeroPayload));
        assert_eq!(ctl.state(), SessionState::Open);
        assert!(drain(&mut rx).is_empty());
        assert!(!sdk.device(1).unwrap().is_streaming());
    }

    #[test]
    fn oversized_payload_is_resource_exhausted() {
        let (mut ctl, _rx, sdk) = controller(MockSdk::with_devices([
            MockDeviceConfig::new("SN1").payload_size(i64::MAX),
        ]));
        ctl.open(1).unwrap();
        let err = ctl.start_acquisition().unwrap_err();
        assert!(matches!(err, GxError::ResourceExhausted(_)), "got {:?}", err);
        assert_eq!(ctl.state(), SessionState::Open);
        assert!(!sdk.device(1).unwrap().is_streaming());
    }

    #[test]
    fn stream_on_failure_keeps_session_open() {
        let sdk = MockSdk::builder()
            .device_with_errors(
                MockDeviceConfig::new("SN1").resolution(8, 8),
                ErrorConfig::scenario(ErrorScenario::Transient { operation: "stream_on" }),
            )
            .build();
        let (mut ctl, _rx, _sdk) = controller(sdk);
        ctl.open(1).unwrap();
        assert!(matches!(ctl.start_acquisition(), Err(GxError::Sdk(_))));
        assert_eq!(ctl.state(), SessionState::Open);
        ctl.start_acquisition().unwrap();
        assert_eq!(ctl.state(), SessionState::Acquiring);
    }

    #[test]
    fn close_while_acquiring_stops_first() {
        let (mut ctl, mut rx, sdk) = controller(one_camera());
        ctl.open(1).unwrap();
        ctl.start_acquisition().unwrap();
        ctl.close().unwrap();

        assert_eq!(ctl.state(), SessionState::Closed);
        let device = sdk.device(1).unwrap();
        assert!(!device.is_streaming());
        assert!(!device.is_open());
        assert_eq!(
            states(&drain(&mut rx)),
            vec![
                SessionState::Opening,
                SessionState::Open,
                SessionState::Acquiring,
                SessionState::Open,
                SessionState::Closed,
            ]
        );
    }

    #[test]
    fn close_failure_stays_open() {
        let sdk = MockSdk::builder()
            .device_with_errors(
                MockDeviceConfig::new("SN1"),
                ErrorConfig::scenario(ErrorScenario::Transient { operation: "close" }),
            )
            .build();
        let (mut ctl, _rx, _sdk) = controller(sdk);
        ctl.open(1).unwrap();
        assert!(ctl.close().is_err());
        assert_eq!(ctl.state(), SessionState::Open);
        ctl.close().unwrap();
        assert_eq!(ctl.state(), SessionState::Closed);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let (mut ctl, _rx, _sdk) = controller(one_camera());
        assert!(ctl.stop_acquisition().is_err());
        assert!(ctl.close().is_err());
        ctl.open(1).unwrap();
        assert!(matches!(ctl.open(1), Err(GxError::InvalidState { .. })));
        assert!(ctl.stop_acquisition().is_err());
        ctl.start_acquisition().unwrap();
        assert!(ctl.start_acquisition().is_err());
    }

    #[test]
    fn software_trigger_needs_trigger_mode_and_source() {
        let (mut ctl, _rx, sdk) = controller(one_camera());
        ctl.open(1).unwrap();
        assert!(matches!(ctl.send_software_trigger(), Err(GxError::Unsupported(_))));

        ctl.set_trigger_mode(TriggerMode::On).unwrap();
        ctl.set_trigger_source(TriggerSource::Line1).unwrap();
        assert!(!ctl.params().soft_trigger_enabled());
        assert_eq!(sdk.device(1).unwrap().trigger_source(), TriggerSource::Line1);

        ctl.set_trigger_source(TriggerSource::Software).unwrap();
        assert!(ctl.params().soft_trigger_enabled());
        ctl.send_software_trigger().unwrap();
    }

    #[test]
    fn trigger_on_unsupported_device() {
        let (mut ctl, _rx, _sdk) = controller(MockSdk::with_devices([
            MockDeviceConfig::new("SN1").without_trigger(),
        ]));
        ctl.open(1).unwrap();
        assert!(!ctl.params().trigger_mode_supported);
        assert!(matches!(ctl.set_trigger_mode(TriggerMode::On), Err(GxError::Unsupported(_))));
    }

    #[test]
    fn report_frame_rate_only_while_acquiring() {
        let (mut ctl, mut rx, _sdk) = controller(one_camera());
        ctl.open(1).unwrap();
        assert_eq!(ctl.report_frame_rate(0.0), None);

        ctl.start_acquisition().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let fps = ctl.report_frame_rate(12.5).unwrap();
        assert!(fps > 0.0);

        let update = drain(&mut rx)
            .into_iter()
            .find(|e| matches!(e, SessionEvent::FrameRateUpdated { .. }))
            .unwrap();
        match update {
            SessionEvent::FrameRateUpdated { display_fps, total_frames, .. } => {
                assert_eq!(display_fps, 12.5);
                assert!(total_frames > 0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn drop_closes_the_device() {
        let (mut ctl, _rx, sdk) = controller(one_camera());
        ctl.open(1).unwrap();
        ctl.start_acquisition().unwrap();
        drop(ctl);
        let device = sdk.device(1).unwrap();
        assert!(!device.is_open());
        assert!(!device.is_streaming());
    }
}
