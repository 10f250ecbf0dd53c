//! End-to-end session lifecycle against the mock SDK
//!
//! Drives a controller and presenter the way the viewer runtime does: a
//! current-thread tokio loop with presentation and rate intervals.

use gx_core::{
    event_channel, Frame, GxError, PixelFormat, SessionEvent, SessionId, SessionState, TriggerMode,
};
use gx_driver_mock::{ErrorConfig, ErrorScenario, MockDeviceConfig, MockMode, MockSdk};
use gx_session::{DisplaySurface, LoopExit, SessionController};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    frames: Vec<Arc<Frame>>,
}

impl DisplaySurface for Recorder {
    fn show(&mut self, _session: SessionId, frame: &Arc<Frame>) {
        self.frames.push(Arc::clone(frame));
    }
}

fn realistic_camera(format: PixelFormat) -> Arc<MockSdk> {
    Arc::new(
        MockSdk::builder()
            .mode(MockMode::Realistic)
            .device(
                MockDeviceConfig::new("SN1")
                    .resolution(64, 48)
                    .pixel_format(format)
                    .frame_interval(Duration::from_millis(5)),
            )
            .build(),
    )
}

#[tokio::test]
async fn presenter_follows_acquisition() {
    let sdk = realistic_camera(PixelFormat::BayerGr8);
    let (events, mut rx) = event_channel();
    let mut ctl = SessionController::new(SessionId(0), sdk, events)
        .with_dequeue_timeout(Duration::from_millis(50));
    let mut presenter = ctl.presenter(Recorder::default());

    ctl.open(1).unwrap();
    ctl.start_acquisition().unwrap();

    let mut show = tokio::time::interval(Duration::from_millis(10));
    for _ in 0..20 {
        show.tick().await;
        presenter.tick();
    }
    let fps = ctl.report_frame_rate(presenter.take_display_fps()).unwrap();
    ctl.stop_acquisition().unwrap();

    assert!(fps > 0.0);
    let shown = &presenter.surface().frames;
    assert!(shown.len() >= 5, "only {} frames shown", shown.len());
    assert!(shown.iter().all(|f| f.pixel_format == PixelFormat::Rgb8 && f.width == 64));
    assert!(
        shown.windows(2).all(|w| w[0].frame_id < w[1].frame_id),
        "frames are shown in acquisition order"
    );

    let mut saw_rate = false;
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::FrameRateUpdated { total_frames, .. } = event {
            saw_rate = true;
            assert!(total_frames >= shown.len() as u64);
        }
    }
    assert!(saw_rate);
}

#[tokio::test]
async fn device_fault_drops_session_to_open() {
    let sdk = Arc::new(
        MockSdk::builder()
            .device_with_errors(
                MockDeviceConfig::new("SN1").resolution(8, 8),
                ErrorConfig::scenario(ErrorScenario::FailAfterN {
                    operation: "dequeue_frame",
                    count: 10,
                }),
            )
            .build(),
    );
    let (events, mut rx) = event_channel();
    let mut ctl = SessionController::new(SessionId(0), sdk.clone(), events);
    ctl.open(1).unwrap();
    ctl.start_acquisition().unwrap();

    let message = loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap() {
            SessionEvent::AcquisitionError { message, .. } => break message,
            _ => continue,
        }
    };
    assert!(message.contains("dequeue_frame"));

    // Still acquiring until the controlling side reaps the dead thread
    assert_eq!(ctl.state(), SessionState::Acquiring);
    let exit = ctl.reap_finished_acquisition().unwrap();
    assert!(matches!(exit, LoopExit::Failed(_)));
    assert_eq!(ctl.state(), SessionState::Open);
    assert_eq!(ctl.last_error(), Some(message.as_str()));
    assert_eq!(ctl.stats().acquired, 10);
    assert!(!sdk.device(1).unwrap().is_streaming());

    // No automatic restart
    assert!(ctl.reap_finished_acquisition().is_none());
    ctl.start_acquisition().unwrap();
    ctl.close().unwrap();
}

#[tokio::test]
async fn software_triggered_acquisition() {
    let sdk = Arc::new(MockSdk::with_devices([MockDeviceConfig::new("SN1").resolution(8, 8)]));
    let (events, _rx) = event_channel();
    let mut ctl = SessionController::new(SessionId(0), sdk, events)
        .with_dequeue_timeout(Duration::from_millis(10));
    let mut presenter = ctl.presenter(Recorder::default());

    ctl.open(1).unwrap();
    ctl.set_trigger_mode(TriggerMode::On).unwrap();
    ctl.start_acquisition().unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!presenter.tick().shown, "no frames without a trigger");

    for _ in 0..3 {
        ctl.send_software_trigger().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(presenter.tick().shown);
    }
    assert_eq!(ctl.stats().acquired, 3);
    ctl.close().unwrap();
}

#[tokio::test]
async fn restart_after_stop_reallocates() {
    let sdk = Arc::new(MockSdk::with_devices([MockDeviceConfig::new("SN1").resolution(16, 16)]));
    let (events, _rx) = event_channel();
    let mut ctl = SessionController::new(SessionId(0), sdk.clone(), events);
    ctl.open(1).unwrap();

    for _ in 0..3 {
        ctl.start_acquisition().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        ctl.stop_acquisition().unwrap();
        assert_eq!(ctl.state(), SessionState::Open);
    }
    assert_eq!(sdk.device(1).unwrap().stream_starts(), 3);
    assert_eq!(ctl.buffer_count(), Some(450));
    assert!(matches!(ctl.stop_acquisition(), Err(GxError::InvalidState { .. })));
}
