//! Shared hard limits and the acquisition buffer sizing policy.
//!
//! This module centralizes:
//! - Buffer pool bounds (memory budget, minimum/maximum buffer count)
//! - Default timer intervals and SDK wait timeouts
//!
//! Small ROIs at high frame rates produce small payloads and need more
//! buffers to avoid drops; the count is capped so the worst case stays inside
//! [`MAX_MEMORY_SIZE`] or [`MAX_BUFFER_NUM`] slots.

use crate::error::GxError;
use std::time::Duration;

// =============================================================================
// Buffer Pool Bounds
// =============================================================================

/// Memory budget in bytes used to size the frame buffer pool (8 MiB).
pub const MAX_MEMORY_SIZE: u64 = 8 * 1024 * 1024;

/// Minimum number of frame buffers allocated for a session.
pub const MIN_BUFFER_NUM: usize = 5;

/// Maximum number of frame buffers allocated for a session.
pub const MAX_BUFFER_NUM: usize = 450;

// =============================================================================
// Timing Constants
// =============================================================================

/// Timeout for device enumeration (200 ms).
pub const ENUMERATE_TIMEOUT: Duration = Duration::from_millis(200);

/// Bounded wait for a single dequeue call in the acquisition loop.
///
/// A timeout is retried, so this only bounds how long the loop can go
/// without observing its keep-running flag.
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Presentation refresh period (~30 Hz).
pub const SHOW_IMAGE_INTERVAL: Duration = Duration::from_millis(33);

/// Frame rate reporting period.
pub const FRAME_RATE_INTERVAL: Duration = Duration::from_millis(500);

/// Back-off used by the acquisition loop when every pool buffer is in use.
pub const POOL_EXHAUSTED_BACKOFF: Duration = Duration::from_millis(1);

/// Minimum spacing of frame rejection notices from one acquisition run.
pub const FRAME_REJECT_NOTICE_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Buffer Sizing Policy
// =============================================================================

/// Number of acquisition buffers for a given payload size.
///
/// Returns `clamp(MAX_MEMORY_SIZE / payload_size_bytes, MIN_BUFFER_NUM,
/// MAX_BUFFER_NUM)`.
///
/// # Errors
///
/// [`GxError::InvalidPayload`] when `payload_size_bytes` is 0.
pub fn buffer_count(payload_size_bytes: u64) -> Result<usize, GxError> {
    if payload_size_bytes == 0 {
        return Err(GxError::InvalidPayload);
    }

    let fitted = MAX_MEMORY_SIZE / payload_size_bytes;
    let fitted = usize::try_from(fitted).unwrap_or(MAX_BUFFER_NUM);
    Ok(fitted.clamp(MIN_BUFFER_NUM, MAX_BUFFER_NUM))
}
