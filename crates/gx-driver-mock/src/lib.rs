//! Mock camera SDK for gx-viewer
//!
//! This crate provides a simulated implementation of the [`gx_core::DeviceSdk`]
//! boundary for testing and demos without physical cameras.
//!
//! # Features
//!
//! - Any number of cameras, opened by 1-based index
//! - Mono8/10/12, Bayer and RGB test patterns that change every frame
//! - Free running, software triggered and hardware triggered acquisition
//! - Instant mode for unit tests, realistic frame pacing for demos
//! - Error injection per SDK entry point and seeded frame loss
//!
//! ```rust,ignore
//! use gx_driver_mock::{MockDeviceConfig, MockSdk};
//!
//! let sdk = MockSdk::with_devices([MockDeviceConfig::new("SN1")]);
//! let camera = sdk.open(1)?;
//! ```

pub mod common;
mod mock_sdk;
mod pattern;

// Re-export common types
pub use common::{ErrorConfig, ErrorScenario, MockMode, MockRng};

pub use mock_sdk::{MockDevice, MockDeviceConfig, MockSdk, MockSdkBuilder, MockSdkConfig};
pub use pattern::fill_frame;
