//! `gx-session`
//!
//! The producer/consumer pipeline behind one camera view:
//!
//! ```text
//!  acquisition thread (gx-acq-N)            controlling thread
//!  ─────────────────────────────            ──────────────────
//!  pool buffer ─► dequeue_frame              every 33 ms: Presenter::tick
//!      │                                          │  reads LatestFrame
//!      ▼                                          ▼
//!  convert ─► LatestFrame::publish ─────────► DisplaySurface::show
//!      │                                     every 500 ms:
//!      └────► FrameRateCounter ─────────────► SessionController::report_frame_rate
//! ```
//!
//! [`SessionController`] owns the device and the lifecycle; everything else
//! is a building block it wires together.

pub mod acquisition;
pub mod controller;
pub mod convert;
pub mod frame_rate;
pub mod latest;
pub mod presentation;

pub use acquisition::{AcquisitionLoop, AcquisitionStats, LoopExit, StatsSnapshot};
pub use controller::{DeviceParams, SessionController};
pub use frame_rate::FrameRateCounter;
pub use latest::{LatestFrame, LatestFrameReader};
pub use presentation::{DisplaySurface, Presenter, SnapshotSink, TickOutcome};
