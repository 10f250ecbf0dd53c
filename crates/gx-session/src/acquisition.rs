//! Acquisition thread.
//!
//! One dedicated OS thread per acquiring session performs the blocking
//! dequeue calls. Each iteration:
//!
//! 1. takes a free buffer from the session's [`FrameBufferPool`]
//! 2. lets the SDK fill it, waiting at most the dequeue timeout
//! 3. freezes the buffer into `Bytes` and converts it for display
//! 4. publishes the frame to [`LatestFrame`] and counts it
//!
//! A dequeue timeout is not an error; the loop simply polls the run flag and
//! tries again. Any other SDK error is reported as a
//! [`SessionEvent::AcquisitionError`] and ends the thread for good. Frames
//! that fail validation are counted and skipped, with a throttled
//! [`SessionEvent::FrameRejected`] notice.
//!
//! Stopping is cooperative: [`AcquisitionLoop::stop`] clears the run flag and
//! joins. A device call that never returns therefore blocks `stop`; the
//! dequeue timeout bounds this for well behaved SDKs.

use crate::convert;
use crate::frame_rate::FrameRateCounter;
use crate::latest::LatestFrame;
use gx_core::limits::{FRAME_REJECT_NOTICE_INTERVAL, POOL_EXHAUSTED_BACKOFF};
use gx_core::{DeviceHandle, EventSender, GxError, GxResult, SessionEvent, SessionId};
use gx_pool::FrameBufferPool;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::fmt::Display;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Per-session acquisition counters.
#[derive(Debug, Default)]
pub struct AcquisitionStats {
    acquired: AtomicU64,
    incomplete: AtomicU64,
    dropped: AtomicU64,
    invalid: AtomicU64,
}

/// Point-in-time copy of [`AcquisitionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Frames converted and published.
    pub acquired: u64,
    /// Frames the SDK flagged as incomplete.
    pub incomplete: u64,
    /// Iterations that found no free capture buffer.
    pub dropped: u64,
    /// Frames rejected by validation.
    pub invalid: u64,
}

impl AcquisitionStats {
    /// Copy the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            incomplete: self.incomplete.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.acquired.store(0, Ordering::Relaxed);
        self.incomplete.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.invalid.store(0, Ordering::Relaxed);
    }
}

/// Everything the acquisition thread needs, moved into it at spawn.
pub struct AcquisitionContext {
    /// Owning session, for events and thread naming.
    pub session: SessionId,
    /// Open, streaming device.
    pub device: Arc<dyn DeviceHandle>,
    /// Capture buffers sized to the payload.
    pub pool: FrameBufferPool,
    /// Where display frames are published.
    pub latest: Arc<LatestFrame>,
    /// Frame rate sample shared with the reporting tick.
    pub counter: Arc<FrameRateCounter>,
    /// Acquisition counters.
    pub stats: Arc<AcquisitionStats>,
    /// UI notification queue.
    pub events: EventSender,
    /// Upper bound of a single dequeue wait.
    pub dequeue_timeout: Duration,
}

/// How the acquisition thread ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The run flag was cleared.
    Stopped,
    /// A device error ended the loop.
    Failed(String),
    /// The thread panicked.
    Panicked,
}

/// Handle to a running acquisition thread.
#[derive(Debug)]
pub struct AcquisitionLoop {
    session: SessionId,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<LoopExit>>,
}

impl AcquisitionLoop {
    /// Start the acquisition thread.
    ///
    /// Fails with [`GxError::ResourceExhausted`] when the OS refuses a new
    /// thread; the context (and its pool) is dropped in that case.
    pub fn spawn(ctx: AcquisitionContext) -> GxResult<Self> {
        let session = ctx.session;
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name(format!("gx-acq-{}", session.0))
            .spawn(move || run(ctx, flag))
            .map_err(|e| {
                GxError::ResourceExhausted(format!("failed to spawn acquisition thread: {}", e))
            })?;

        Ok(Self {
            session,
            running,
            handle: Some(handle),
        })
    }

    /// Whether the run flag is still set.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Clear the run flag and wait for the thread to exit.
    pub fn stop(mut self) -> LoopExit {
        self.shutdown()
    }

    fn shutdown(&mut self) -> LoopExit {
        self.running.store(false, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return LoopExit::Stopped;
        };
        match handle.join() {
            Ok(exit) => {
                debug!(session = %self.session, ?exit, "Acquisition thread joined");
                exit
            }
            Err(_) => {
                error!(session = %self.session, "Acquisition thread panicked");
                LoopExit::Panicked
            }
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

fn run(ctx: AcquisitionContext, running: Arc<AtomicBool>) -> LoopExit {
    info!(
        session = %ctx.session,
        buffers = ctx.pool.size(),
        buffer_bytes = ctx.pool.buffer_capacity(),
        "Acquisition loop started"
    );

    let mut last_reject_notice = None;

    while running.load(Ordering::Acquire) {
        let Some(mut buffer) = ctx.pool.try_acquire() else {
            ctx.stats.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(session = %ctx.session, "No free capture buffer");
            std::thread::sleep(POOL_EXHAUSTED_BACKOFF);
            continue;
        };

        let info = match ctx.device.dequeue_frame(buffer.as_mut_slice(), ctx.dequeue_timeout) {
            Ok(info) => info,
            Err(err) if err.is_timeout() => continue,
            Err(err) => {
                error!(session = %ctx.session, error = %err, "Acquisition stopped on device error");
                running.store(false, Ordering::Release);
                let message = err.to_string();
                ctx.events.emit(SessionEvent::AcquisitionError {
                    session: ctx.session,
                    message: message.clone(),
                });
                return LoopExit::Failed(message);
            }
        };

        if let Err(err) = buffer.set_len(info.len) {
            reject_frame(&ctx, &mut last_reject_notice, info.frame_id, err);
            continue;
        }

        match convert::to_display(&info, buffer.freeze()) {
            Ok(Some(frame)) => {
                ctx.counter.record_frame();
                ctx.stats.acquired.fetch_add(1, Ordering::Relaxed);
                ctx.latest.publish(frame);
            }
            Ok(None) => {
                ctx.stats.incomplete.fetch_add(1, Ordering::Relaxed);
                trace!(
                    session = %ctx.session,
                    frame_id = info.frame_id,
                    "Incomplete frame skipped"
                );
            }
            Err(err) => reject_frame(&ctx, &mut last_reject_notice, info.frame_id, err),
        }
    }

    info!(session = %ctx.session, "Acquisition loop stopped");
    LoopExit::Stopped
}

fn reject_frame(
    ctx: &AcquisitionContext,
    last_notice: &mut Option<Instant>,
    frame_id: u64,
    err: impl Display,
) {
    let rejected = ctx.stats.invalid.fetch_add(1, Ordering::Relaxed) + 1;
    debug!(session = %ctx.session, frame_id, error = %err, "Frame rejected");

    let now = Instant::now();
    if last_notice.is_some_and(|at| now.duration_since(at) < FRAME_REJECT_NOTICE_INTERVAL) {
        return;
    }
    *last_notice = Some(now);
    warn!(session = %ctx.session, frame_id, rejected, error = %err, "Frames rejected");
    ctx.events.emit(SessionEvent::FrameRejected {
        session: ctx.session,
        message: err.to_string(),
        rejected,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use gx_core::{event_channel, DeviceSdk, PixelFormat};
    use gx_driver_mock::{ErrorConfig, ErrorScenario, MockDeviceConfig, MockSdk};

    struct Harness {
        sdk: MockSdk,
        latest: Arc<LatestFrame>,
        counter: Arc<FrameRateCounter>,
        stats: Arc<AcquisitionStats>,
    }

    impl Harness {
        fn new(sdk: MockSdk) -> Self {
            Self {
                sdk,
                latest: Arc::new(LatestFrame::new()),
                counter: Arc::new(FrameRateCounter::new()),
                stats: Arc::new(AcquisitionStats::default()),
            }
        }

        fn context(
            &self,
            events: EventSender,
            pool_size: usize,
            bytes: usize,
        ) -> AcquisitionContext {
            let device = self.sdk.open(1).unwrap();
            device.stream_on().unwrap();
            AcquisitionContext {
                session: SessionId(0),
                device,
                pool: FrameBufferPool::try_new(pool_size, bytes).unwrap(),
                latest: Arc::clone(&self.latest),
                counter: Arc::clone(&self.counter),
                stats: Arc::clone(&self.stats),
                events,
                dequeue_timeout: Duration::from_millis(20),
            }
        }
    }

    fn camera(width: u32, height: u32) -> MockSdk {
        MockSdk::with_devices([MockDeviceConfig::new("SN1").resolution(width, height)])
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn loop_publishes_frames_until_stopped() {
        let harness = Harness::new(camera(16, 16));
        let (events, _rx) = event_channel();
        let acq = AcquisitionLoop::spawn(harness.context(events, 5, 256)).unwrap();

        wait_until(|| harness.stats.snapshot().acquired >= 10);
        assert!(acq.is_running());
        assert_eq!(acq.stop(), LoopExit::Stopped);

        let frame = harness.latest.snapshot().unwrap();
        assert_eq!((frame.width, frame.height), (16, 16));
        assert_eq!(frame.pixel_format, PixelFormat::Mono8);
        assert!(harness.counter.total() >= 10);
    }

    #[test]
    fn thread_has_terminated_after_stop() {
        let harness = Harness::new(camera(4, 4));
        let (events, _rx) = event_channel();
        let acq = AcquisitionLoop::spawn(harness.context(events, 5, 16)).unwrap();
        let running = Arc::clone(&acq.running);
        acq.stop();

        assert!(!running.load(Ordering::Acquire));
        let before = harness.stats.snapshot().acquired;
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(harness.stats.snapshot().acquired, before, "no frames after stop returned");
    }

    #[test]
    fn timeouts_are_retried() {
        let sdk = MockSdk::builder()
            .device_with_errors(
                MockDeviceConfig::new("SN1").resolution(4, 4),
                ErrorConfig::scenario(ErrorScenario::Timeout {
                    operation: "dequeue_frame",
                }),
            )
            .build();
        let harness = Harness::new(sdk);
        let (events, mut rx) = event_channel();
        let acq = AcquisitionLoop::spawn(harness.context(events, 5, 16)).unwrap();

        std::thread::sleep(Duration::from_millis(30));
        assert!(acq.is_running());
        assert!(!acq.is_finished());
        assert_eq!(acq.stop(), LoopExit::Stopped);
        assert!(rx.try_recv().is_err(), "timeouts raise no events");
    }

    #[test]
    fn device_error_ends_loop_and_notifies() {
        let sdk = MockSdk::builder()
            .device_with_errors(
                MockDeviceConfig::new("SN1").resolution(4, 4),
                ErrorConfig::scenario(ErrorScenario::FailAfterN {
                    operation: "dequeue_frame",
                    count: 3,
                }),
            )
            .build();
        let harness = Harness::new(sdk);
        let (events, mut rx) = event_channel();
        let acq = AcquisitionLoop::spawn(harness.context(events, 5, 16)).unwrap();

        wait_until(|| acq.is_finished());
        assert!(!acq.is_running());
        assert!(matches!(acq.stop(), LoopExit::Failed(_)));
        assert_eq!(harness.stats.snapshot().acquired, 3);

        match rx.try_recv().unwrap() {
            SessionEvent::AcquisitionError { session, message } => {
                assert_eq!(session, SessionId(0));
                assert!(message.contains("dequeue_frame"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn incomplete_frames_are_counted_not_published() {
        let sdk = MockSdk::builder()
            .seed(3)
            .device(MockDeviceConfig::new("SN1").resolution(4, 4).frame_loss_rate(1.0))
            .build();
        let harness = Harness::new(sdk);
        let (events, _rx) = event_channel();
        let acq = AcquisitionLoop::spawn(harness.context(events, 5, 16)).unwrap();

        wait_until(|| harness.stats.snapshot().incomplete >= 5);
        acq.stop();
        assert!(harness.latest.snapshot().is_none());
        assert_eq!(harness.counter.total(), 0);
    }

    #[test]
    fn rejected_frames_notify_once_per_interval() {
        let sdk = MockSdk::builder()
            .seed(5)
            .device(MockDeviceConfig::new("SN1").resolution(4, 4).truncated_frame_rate(1.0))
            .build();
        let harness = Harness::new(sdk);
        let (events, mut rx) = event_channel();
        let acq = AcquisitionLoop::spawn(harness.context(events, 5, 16)).unwrap();

        wait_until(|| harness.stats.snapshot().invalid >= 20);
        assert_eq!(acq.stop(), LoopExit::Stopped);
        assert!(harness.latest.snapshot().is_none());
        assert_eq!(harness.stats.snapshot().acquired, 0);

        let notices: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(notices.len(), 1, "{:?}", notices);
        match &notices[0] {
            SessionEvent::FrameRejected { session, message, rejected } => {
                assert_eq!(*session, SessionId(0));
                assert_eq!(*rejected, 1);
                assert!(message.contains("expected 16"), "{}", message);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn exhausted_pool_backs_off_and_recovers() {
        let harness = Harness::new(camera(4, 4));
        let (events, _rx) = event_channel();
        let ctx = harness.context(events, 1, 16);
        let pool = ctx.pool.clone();
        let held = pool.try_acquire().unwrap();

        let acq = AcquisitionLoop::spawn(ctx).unwrap();
        wait_until(|| harness.stats.snapshot().dropped >= 2);
        assert_eq!(harness.stats.snapshot().acquired, 0);

        drop(held);
        // The published frame then pins the only buffer again.
        wait_until(|| harness.stats.snapshot().acquired >= 1);
        acq.stop();
    }

    #[test]
    fn undersized_buffers_fail_the_loop() {
        let harness = Harness::new(camera(8, 8));
        let (events, _rx) = event_channel();
        let acq = AcquisitionLoop::spawn(harness.context(events, 5, 16)).unwrap();
        wait_until(|| acq.is_finished());
        assert!(matches!(acq.stop(), LoopExit::Failed(_)));
    }

    #[test]
    fn dropping_the_handle_stops_the_thread() {
        let harness = Harness::new(camera(4, 4));
        let (events, _rx) = event_channel();
        let acq = AcquisitionLoop::spawn(harness.context(events, 5, 16)).unwrap();
        let running = Arc::clone(&acq.running);
        drop(acq);
        assert!(!running.load(Ordering::Acquire));
    }
}
