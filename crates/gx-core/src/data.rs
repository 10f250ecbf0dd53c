use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Pixel layout of raw or display image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit monochrome.
    Mono8,
    /// 10-bit monochrome in 16-bit little endian words.
    Mono10,
    /// 12-bit monochrome in 16-bit little endian words.
    Mono12,
    /// 8-bit Bayer mosaic, RG first row.
    BayerRg8,
    /// 8-bit Bayer mosaic, GB first row.
    BayerGb8,
    /// 8-bit Bayer mosaic, GR first row.
    BayerGr8,
    /// 8-bit Bayer mosaic, BG first row.
    BayerBg8,
    /// Interleaved 8-bit RGB.
    Rgb8,
}

impl PixelFormat {
    /// Bytes used by one pixel in a buffer of this format.
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Mono8
            | PixelFormat::BayerRg8
            | PixelFormat::BayerGb8
            | PixelFormat::BayerGr8
            | PixelFormat::BayerBg8 => 1,
            PixelFormat::Mono10 | PixelFormat::Mono12 => 2,
            PixelFormat::Rgb8 => 3,
        }
    }

    /// Significant bits per sample.
    #[must_use]
    pub fn bit_depth(self) -> u32 {
        match self {
            PixelFormat::Mono10 => 10,
            PixelFormat::Mono12 => 12,
            _ => 8,
        }
    }

    /// True for colour filter array (Bayer) formats.
    #[must_use]
    pub fn is_bayer(self) -> bool {
        matches!(
            self,
            PixelFormat::BayerRg8
                | PixelFormat::BayerGb8
                | PixelFormat::BayerGr8
                | PixelFormat::BayerBg8
        )
    }

    /// Colour channel (0 = R, 1 = G, 2 = B) sampled at (x, y) for Bayer
    /// formats, `None` for everything else.
    #[must_use]
    pub fn cfa_channel(self, x: u32, y: u32) -> Option<usize> {
        // Pattern named by its top-left 2x2 cell, read row-major.
        let cell: [usize; 4] = match self {
            PixelFormat::BayerRg8 => [0, 1, 1, 2],
            PixelFormat::BayerGb8 => [1, 2, 0, 1],
            PixelFormat::BayerGr8 => [1, 0, 2, 1],
            PixelFormat::BayerBg8 => [2, 1, 1, 0],
            _ => return None,
        };
        Some(cell[((y & 1) * 2 + (x & 1)) as usize])
    }

    /// Buffer size for a `width` x `height` image, `None` on overflow.
    #[must_use]
    pub fn image_bytes(self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }
}

/// Completion status the SDK attaches to a dequeued frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Frame fully received.
    Complete,
    /// Frame data is partial (packet loss, aborted transfer).
    Incomplete,
}

/// Metadata returned by the SDK when it fills a caller supplied buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrameInfo {
    /// Device frame counter.
    pub frame_id: u64,
    /// Device timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Layout of the bytes written.
    pub pixel_format: PixelFormat,
    /// Number of bytes written into the buffer.
    pub len: usize,
    /// Completion status.
    pub status: FrameStatus,
}

/// A decoded image ready for display or saving.
///
/// Pixel data is held in [`Bytes`] so a frame can be shared between the
/// acquisition thread, the presenter and a snapshot writer without copying.
/// Display frames are always [`PixelFormat::Mono8`] or [`PixelFormat::Rgb8`].
#[derive(Debug, Clone)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Pixel layout of `data`
    pub pixel_format: PixelFormat,

    /// Device frame counter
    pub frame_id: u64,

    /// Device timestamp in nanoseconds
    pub timestamp_ns: u64,

    /// Pixel data, `width * height * bytes_per_pixel` bytes
    pub data: Bytes,
}

impl Frame {
    /// Create an 8-bit monochrome frame.
    pub fn mono8(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            pixel_format: PixelFormat::Mono8,
            frame_id: 0,
            timestamp_ns: 0,
            data: data.into(),
        }
    }

    /// Create an interleaved RGB frame.
    pub fn rgb8(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            pixel_format: PixelFormat::Rgb8,
            frame_id: 0,
            timestamp_ns: 0,
            data: data.into(),
        }
    }

    /// Attach device identity to the frame.
    #[must_use]
    pub fn with_identity(mut self, frame_id: u64, timestamp_ns: u64) -> Self {
        self.frame_id = frame_id;
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// True when the frame carries colour samples.
    #[must_use]
    pub fn is_color(&self) -> bool {
        self.pixel_format == PixelFormat::Rgb8
    }

    /// Channel values at (x, y), one entry for mono, three for RGB.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.pixel_format.bytes_per_pixel();
        let start = (y as usize * self.width as usize + x as usize) * bpp;
        self.data.get(start..start + bpp)
    }

    /// Mean sample value over all channels.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| v as u64).sum();
        sum as f64 / self.data.len() as f64
    }
}
