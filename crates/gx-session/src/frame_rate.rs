//! Frames-per-second measurement between reporting ticks.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counts frames from one thread and converts them into a rate on
/// another.
///
/// The producer only touches atomics. `tick` swaps the count to zero and
/// divides by the wall time since the previous tick.
#[derive(Debug)]
pub struct FrameRateCounter {
    since_tick: AtomicU64,
    total: AtomicU64,
    last_tick: Mutex<Instant>,
    last_fps_bits: AtomicU64,
}

impl FrameRateCounter {
    /// Counter whose first interval starts now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Counter whose first interval starts at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            since_tick: AtomicU64::new(0),
            total: AtomicU64::new(0),
            last_tick: Mutex::new(start),
            last_fps_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Count one produced frame.
    pub fn record_frame(&self) {
        self.since_tick.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Close the current interval now. See [`Self::tick_at`].
    pub fn tick(&self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// Close the current interval at `now` and return frames per second
    /// over it. The interval count restarts from zero.
    pub fn tick_at(&self, now: Instant) -> f64 {
        let elapsed = {
            let mut last = self.last_tick.lock();
            let elapsed = now.saturating_duration_since(*last);
            *last = now;
            elapsed
        };
        let frames = self.since_tick.swap(0, Ordering::AcqRel);

        let fps = if elapsed.is_zero() {
            0.0
        } else {
            frames as f64 / elapsed.as_secs_f64()
        };
        self.last_fps_bits.store(fps.to_bits(), Ordering::Release);
        fps
    }

    /// Rate computed by the most recent tick.
    pub fn last_fps(&self) -> f64 {
        f64::from_bits(self.last_fps_bits.load(Ordering::Acquire))
    }

    /// Frames counted since construction or the last reset.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Zero everything and start a fresh interval at `now`.
    pub fn reset_at(&self, now: Instant) {
        *self.last_tick.lock() = now;
        self.since_tick.store(0, Ordering::Release);
        self.total.store(0, Ordering::Release);
        self.last_fps_bits.store(0f64.to_bits(), Ordering::Release);
    }
}

impl Default for FrameRateCounter {
    fn default() -> Self {
        Self::new()
    }
}
