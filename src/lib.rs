//! # gx-viewer
//!
//! Application layer of the dual camera viewer. The camera pipeline itself
//! lives in the workspace crates:
//!
//! - `gx-core`: SDK traits, frames, errors and the buffer sizing policy
//! - `gx-pool`: reusable capture buffers
//! - `gx-session`: acquisition loop, latest frame, frame rate counter,
//!   presentation and the session controller
//! - `gx-driver-mock`: simulated cameras
//!
//! This crate wires them into a runnable viewer:
//!
//! - **`app`**: [`app::Viewer`], the controlling task that owns up to two
//!   sessions and drives display refresh and rate reporting
//! - **`config`**: TOML and environment configuration via `figment`
//! - **`snapshot`**: "save image" through the `image` crate
//! - **`tracing_setup`**: subscriber installation

pub mod app;
pub mod config;
pub mod snapshot;
pub mod tracing_setup;

pub use app::{HeadlessSurface, RunSummary, SessionSummary, Viewer};
pub use config::ViewerConfig;
