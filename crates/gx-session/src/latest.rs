//! Single-slot publication of the most recent display frame.
//!
//! The acquisition thread is the only writer; the presenter (and anything
//! else holding a [`LatestFrameReader`]) takes snapshots. Publication swaps
//! an `Arc<Frame>` inside a `tokio::sync::watch` channel, so a reader either
//! sees the previous frame or the new one, never a partially written image.
//! Readers hold the channel lock only long enough to clone the `Arc`.

use bytes::Bytes;
use gx_core::Frame;
use std::sync::Arc;
use tokio::sync::watch;

/// Writer side of the latest-frame slot.
#[derive(Debug)]
pub struct LatestFrame {
    tx: watch::Sender<Option<Arc<Frame>>>,
}

impl LatestFrame {
    /// Empty slot.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the current frame. Never blocks on readers and works with
    /// no readers attached.
    pub fn publish(&self, frame: Frame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }

    /// Drop the current frame.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Replace the current frame with an owned copy of its pixels.
    ///
    /// Display frames may be slices of capture buffers, which pin their
    /// whole pool. Readers are not notified; the image is unchanged.
    pub fn detach(&self) {
        self.tx.send_if_modified(|slot| {
            if let Some(frame) = slot.as_mut() {
                let owned = Frame {
                    data: Bytes::copy_from_slice(&frame.data),
                    ..Frame::clone(frame)
                };
                *frame = Arc::new(owned);
            }
            false
        });
    }

    /// Current frame, if any.
    pub fn snapshot(&self) -> Option<Arc<Frame>> {
        self.tx.borrow().clone()
    }

    /// New reader. The current frame counts as unseen.
    pub fn subscribe(&self) -> LatestFrameReader {
        let mut rx = self.tx.subscribe();
        if rx.borrow().is_some() {
            rx.mark_changed();
        }
        LatestFrameReader { rx }
    }
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side of the latest-frame slot.
#[derive(Debug, Clone)]
pub struct LatestFrameReader {
    rx: watch::Receiver<Option<Arc<Frame>>>,
}

impl LatestFrameReader {
    /// Current frame, without consuming the change notification.
    pub fn snapshot(&self) -> Option<Arc<Frame>> {
        self.rx.borrow().clone()
    }

    /// The current frame if it was published since the last call.
    pub fn take_new(&mut self) -> Option<Arc<Frame>> {
        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().clone(),
            _ => None,
        }
    }

    /// Wait until a new frame is published.
    ///
    /// Returns `None` once the writer is gone.
    pub async fn changed(&mut self) -> Option<Arc<Frame>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}
