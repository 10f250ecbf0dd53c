//! "Save image" for display frames.
//!
//! Display frames are 8-bit mono or RGB, so any format the `image` crate
//! encodes for those layouts works. The file extension picks the format
//! (`.png`, `.bmp`, `.jpg`, `.tiff`).
//!
//! The viewer never encodes on its control task: [`QueuedSnapshot`] turns a
//! request into a [`SnapshotJob`] that runs on the blocking pool.

use gx_core::{Frame, GxError, GxResult, PixelFormat, SessionId};
use gx_session::SnapshotSink;
use image::{ExtendedColorType, ImageFormat};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

/// Writes one frame to a file.
#[derive(Debug, Clone)]
pub struct ImageFileSnapshot {
    path: PathBuf,
}

impl ImageFileSnapshot {
    /// Snapshot written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, session: SessionId, frame: &Frame) -> GxResult<()> {
        save_frame(frame, &self.path)?;
        info!(%session, path = ?self.path, frame_id = frame.frame_id, "Snapshot saved");
        Ok(())
    }
}

impl SnapshotSink for ImageFileSnapshot {
    fn save(self: Box<Self>, session: SessionId, frame: &Frame) -> GxResult<()> {
        self.write(session, frame)
    }
}

/// A captured frame waiting to be encoded.
#[derive(Debug)]
pub struct SnapshotJob {
    session: SessionId,
    frame: Frame,
    target: ImageFileSnapshot,
}

impl SnapshotJob {
    /// Session the frame came from.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Encode and write the frame. Blocking.
    pub fn write(self) -> (SessionId, GxResult<()>) {
        let result = self.target.write(self.session, &self.frame);
        (self.session, result)
    }
}

/// Sink that queues the frame for a background writer.
#[derive(Debug)]
pub struct QueuedSnapshot {
    target: ImageFileSnapshot,
    jobs: mpsc::UnboundedSender<SnapshotJob>,
}

impl QueuedSnapshot {
    /// Snapshot of `path`, written by whoever drains `jobs`.
    pub fn new(path: impl Into<PathBuf>, jobs: mpsc::UnboundedSender<SnapshotJob>) -> Self {
        Self {
            target: ImageFileSnapshot::new(path),
            jobs,
        }
    }
}

impl SnapshotSink for QueuedSnapshot {
    fn save(self: Box<Self>, session: SessionId, frame: &Frame) -> GxResult<()> {
        let job = SnapshotJob {
            session,
            frame: frame.clone(),
            target: self.target,
        };
        self.jobs
            .send(job)
            .map_err(|_| GxError::Snapshot("snapshot writer is gone".to_string()))
    }
}

/// Encode `frame` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// - [`GxError::Snapshot`] for an unknown extension, a raw (undecoded)
///   frame, a size mismatch or an encoder failure
/// - [`GxError::Io`] when the parent directory cannot be created
pub fn save_frame(frame: &Frame, path: &Path) -> GxResult<()> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| GxError::Snapshot(format!("{}: {}", path.display(), e)))?;

    let color = match frame.pixel_format {
        PixelFormat::Mono8 => ExtendedColorType::L8,
        PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
        other => {
            return Err(GxError::Snapshot(format!(
                "{:?} frames are not displayable, convert before saving",
                other
            )))
        }
    };

    let expected = frame.pixel_format.image_bytes(frame.width, frame.height);
    if expected != Some(frame.data.len()) {
        return Err(GxError::Snapshot(format!(
            "Frame data size mismatch: expected {:?} bytes for {}x{}, got {}",
            expected,
            frame.width,
            frame.height,
            frame.data.len()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    image::save_buffer_with_format(path, &frame.data, frame.width, frame.height, color, format)
        .map_err(|e| GxError::Snapshot(format!("Failed to encode {}: {}", path.display(), e)))
}
