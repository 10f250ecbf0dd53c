//! `gx-core`
//!
//! Core trait definitions and types shared by the gx-viewer crates.
//!
//! ## Key Types
//!
//! - [`DeviceSdk`] / [`DeviceHandle`]: the camera SDK boundary
//! - [`Frame`]: decoded image shared between acquisition and display
//! - [`SessionState`] / [`SessionEvent`]: session lifecycle and UI notifications
//! - [`GxError`]: application error taxonomy
//! - [`limits::buffer_count`]: acquisition buffer sizing policy

pub mod data;
pub mod error;
pub mod events;
pub mod limits;
pub mod sdk;

pub use data::{Frame, FrameStatus, PixelFormat, RawFrameInfo};
pub use error::{GxError, GxResult, SdkError, SdkErrorKind};
pub use events::{event_channel, EventSender, SessionEvent, SessionId, SessionState};
pub use sdk::{
    DeviceBaseInfo, DeviceHandle, DeviceSdk, Feature, IntParam, TriggerMode, TriggerSource,
};
