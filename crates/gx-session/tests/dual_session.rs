//! Two cameras driven side by side
//!
//! Each session owns its own device, pool, counters and latest frame.

use gx_core::{event_channel, DeviceSdk, PixelFormat, SessionEvent, SessionId, SessionState};
use gx_driver_mock::{ErrorConfig, ErrorScenario, MockDeviceConfig, MockSdk};
use gx_session::SessionController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn two_cameras() -> Arc<MockSdk> {
    Arc::new(MockSdk::with_devices([
        MockDeviceConfig::new("SN1").resolution(640, 480),
        MockDeviceConfig::new("SN2")
            .resolution(16, 8)
            .pixel_format(PixelFormat::BayerRg8),
    ]))
}

type Pair = (SessionController, SessionController, mpsc::Receiver<SessionEvent>);

fn pair(sdk: Arc<MockSdk>) -> Pair {
    let (events, rx) = event_channel();
    let sdk: Arc<dyn DeviceSdk> = sdk;
    let first = SessionController::new(SessionId(0), Arc::clone(&sdk), events.clone());
    let second = SessionController::new(SessionId(1), sdk, events);
    (first, second, rx)
}

#[tokio::test]
async fn closing_one_session_leaves_the_other_acquiring() {
    let sdk = two_cameras();
    let (mut first, mut second, _rx) = pair(sdk.clone());

    first.open(1).unwrap();
    second.open(2).unwrap();
    first.start_acquisition().unwrap();
    second.start_acquisition().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    first.close().unwrap();
    assert_eq!(first.state(), SessionState::Closed);
    assert_eq!(second.state(), SessionState::Acquiring);

    let before = second.stats().acquired;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(second.stats().acquired > before, "second camera keeps producing");
    assert!(sdk.device(2).unwrap().is_streaming());

    second.close().unwrap();
}

#[tokio::test]
async fn sessions_do_not_share_frames_or_counters() {
    let sdk = two_cameras();
    let (mut first, mut second, _rx) = pair(sdk);
    let first_frames = first.subscribe();
    let second_frames = second.subscribe();

    first.open(1).unwrap();
    second.open(2).unwrap();
    first.start_acquisition().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(first_frames.snapshot().is_some());
    assert!(second_frames.snapshot().is_none());
    assert!(first.stats().acquired > 0);
    assert_eq!(second.stats().acquired, 0);
    assert_eq!(second.report_frame_rate(0.0), None);

    second.start_acquisition().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let a = first_frames.snapshot().unwrap();
    let b = second_frames.snapshot().unwrap();
    assert_eq!((a.width, a.pixel_format), (640, PixelFormat::Mono8));
    assert_eq!((b.width, b.pixel_format), (16, PixelFormat::Rgb8));
    assert_eq!(first.buffer_count(), Some(27));
    assert_eq!(second.buffer_count(), Some(450));
}

#[tokio::test]
async fn fault_in_one_session_is_isolated() {
    let fault = ErrorConfig::scenario(ErrorScenario::HardwareFault {
        operation: "dequeue_frame",
        code: 7,
    });
    let sdk = Arc::new(
        MockSdk::builder()
            .device(MockDeviceConfig::new("SN1").resolution(8, 8))
            .device_with_errors(MockDeviceConfig::new("SN2").resolution(8, 8), fault.clone())
            .build(),
    );
    let (mut first, mut second, mut rx) = pair(sdk);
    first.open(1).unwrap();
    second.open(2).unwrap();
    first.start_acquisition().unwrap();
    second.start_acquisition().unwrap();

    let failed = loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap() {
            SessionEvent::AcquisitionError { session, .. } => break session,
            _ => continue,
        }
    };
    assert_eq!(failed, SessionId(1));

    assert!(second.report_frame_rate(0.0).is_none());
    assert_eq!(second.state(), SessionState::Open);
    assert_eq!(first.state(), SessionState::Acquiring);
    assert!(first.report_frame_rate(0.0).is_some());

    first.close().unwrap();
    // The sticky fault also rejects close, so the second session stays open
    assert!(second.close().is_err());
    assert_eq!(second.state(), SessionState::Open);

    // Once the device recovers the session closes normally
    fault.reset();
    second.close().unwrap();
    assert_eq!(second.state(), SessionState::Closed);
}
