//! Camera SDK boundary.
//!
//! The viewer never talks to a vendor library directly. A binding implements
//! [`DeviceSdk`] (library level: enumerate, open) and hands out
//! [`DeviceHandle`]s (one per open camera). The acquisition thread and the
//! controlling thread share a handle through `Arc`, so every method takes
//! `&self` and implementations synchronize internally.
//!
//! ```text
//! controller thread                       acquisition thread
//! ─────────────────                       ──────────────────
//! sdk.open(index) ──► Arc<dyn DeviceHandle> ──► dequeue_frame(buf, timeout)
//! set_buffer_count / stream_on / stream_off
//! send_software_trigger / close
//! ```

use crate::data::RawFrameInfo;
use crate::error::SdkError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Descriptive information reported during enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBaseInfo {
    /// Manufacturer name.
    pub vendor_name: String,
    /// Camera model.
    pub model_name: String,
    /// Serial number.
    pub serial_number: String,
    /// User facing name.
    pub display_name: String,
}

/// Integer parameters the viewer reads from a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntParam {
    /// Bytes per raw frame at the current ROI and pixel format.
    PayloadSize,
    /// Current image width.
    Width,
    /// Current image height.
    Height,
}

/// Optional device features queried after open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Sensor has a colour filter array.
    ColorFilter,
    /// Trigger mode can be switched.
    TriggerMode,
    /// Software trigger command is available.
    TriggerSoftware,
}

/// Trigger mode of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Free running acquisition.
    #[default]
    Off,
    /// One frame per trigger event.
    On,
}

/// Source of trigger events when trigger mode is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Software trigger command.
    #[default]
    Software,
    /// Hardware input line 0.
    Line0,
    /// Hardware input line 1.
    Line1,
    /// Hardware input line 2.
    Line2,
    /// Hardware input line 3.
    Line3,
}

/// Library level entry points of a camera SDK.
pub trait DeviceSdk: Send + Sync {
    /// List reachable devices, waiting at most `timeout` for discovery.
    fn enumerate_devices(&self, timeout: Duration) -> Result<Vec<DeviceBaseInfo>, SdkError>;

    /// Open the device at 1-based `index` in enumeration order.
    fn open(&self, index: u32) -> Result<Arc<dyn DeviceHandle>, SdkError>;
}

/// An open camera.
pub trait DeviceHandle: Send + Sync {
    /// Read an integer parameter.
    fn get_int(&self, param: IntParam) -> Result<i64, SdkError>;

    /// Whether the device implements `feature`.
    fn is_implemented(&self, feature: Feature) -> Result<bool, SdkError>;

    /// Current trigger mode.
    fn trigger_mode(&self) -> Result<TriggerMode, SdkError>;

    /// Switch trigger mode.
    fn set_trigger_mode(&self, mode: TriggerMode) -> Result<(), SdkError>;

    /// Select the trigger source.
    fn set_trigger_source(&self, source: TriggerSource) -> Result<(), SdkError>;

    /// Issue a software trigger.
    fn send_software_trigger(&self) -> Result<(), SdkError>;

    /// Number of buffers the SDK should queue for streaming.
    fn set_buffer_count(&self, count: usize) -> Result<(), SdkError>;

    /// Start streaming.
    fn stream_on(&self) -> Result<(), SdkError>;

    /// Stop streaming.
    fn stream_off(&self) -> Result<(), SdkError>;

    /// Wait up to `timeout` for the next frame and copy it into `buffer`.
    ///
    /// Returns an [`SdkError`] of kind `Timeout` when nothing arrived in
    /// time; callers retry on that kind.
    fn dequeue_frame(&self, buffer: &mut [u8], timeout: Duration) -> Result<RawFrameInfo, SdkError>;

    /// Release the device. Further calls fail with `InvalidHandle`.
    fn close(&self) -> Result<(), SdkError>;
}
