//! Raw sensor data to display image conversion.
//!
//! Mono8 and Rgb8 frames are passed through as slices of the capture buffer.
//! Deeper mono formats are shifted down to 8 bits and Bayer mosaics are
//! demosaiced by 2x2 cell averaging into interleaved RGB.

use bytes::Bytes;
use gx_core::{Frame, FrameStatus, GxError, GxResult, PixelFormat, RawFrameInfo};

/// Convert a dequeued frame into a display frame.
///
/// Returns `Ok(None)` for incomplete frames, which are skipped rather than
/// shown. A frame whose geometry and byte count disagree is an
/// [`GxError::InvalidFrame`].
pub fn to_display(info: &RawFrameInfo, raw: Bytes) -> GxResult<Option<Frame>> {
    if info.status == FrameStatus::Incomplete {
        return Ok(None);
    }

    let (width, height) = (info.width, info.height);
    if width == 0 || height == 0 {
        return Err(GxError::InvalidFrame(format!("empty geometry {}x{}", width, height)));
    }
    let expected = info
        .pixel_format
        .image_bytes(width, height)
        .ok_or_else(|| GxError::InvalidFrame(format!("size overflow for {}x{}", width, height)))?;
    if raw.len() < expected {
        return Err(GxError::InvalidFrame(format!(
            "{} bytes for a {}x{} {:?} frame, expected {}",
            raw.len(),
            width,
            height,
            info.pixel_format,
            expected
        )));
    }

    let frame = match info.pixel_format {
        PixelFormat::Mono8 => Frame::mono8(width, height, raw.slice(..expected)),
        PixelFormat::Rgb8 => Frame::rgb8(width, height, raw.slice(..expected)),
        PixelFormat::Mono10 | PixelFormat::Mono12 => {
            let shift = info.pixel_format.bit_depth() - 8;
            Frame::mono8(width, height, narrow_to_8bit(&raw[..expected], shift))
        }
        PixelFormat::BayerRg8
        | PixelFormat::BayerGb8
        | PixelFormat::BayerGr8
        | PixelFormat::BayerBg8 => Frame::rgb8(
            width,
            height,
            demosaic(info.pixel_format, width as usize, height as usize, &raw[..expected]),
        ),
    };

    Ok(Some(frame.with_identity(info.frame_id, info.timestamp_ns)))
}

fn narrow_to_8bit(raw: &[u8], shift: u32) -> Vec<u8> {
    raw.chunks_exact(2)
        .map(|pair| {
            let sample = u16::from_le_bytes([pair[0], pair[1]]) >> shift;
            sample.min(u16::from(u8::MAX)) as u8
        })
        .collect()
}

fn demosaic(format: PixelFormat, w: usize, h: usize, raw: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; w * h * 3];

    for cy in (0..h).step_by(2) {
        for cx in (0..w).step_by(2) {
            let mut sum = [0u16; 3];
            let mut n = [0u16; 3];
            for y in cy..(cy + 2).min(h) {
                for x in cx..(cx + 2).min(w) {
                    let channel = format.cfa_channel(x as u32, y as u32).unwrap_or(1);
                    sum[channel] += u16::from(raw[y * w + x]);
                    n[channel] += 1;
                }
            }
            let rgb = [0, 1, 2].map(|c| if n[c] == 0 { 0 } else { (sum[c] / n[c]) as u8 });
            for y in cy..(cy + 2).min(h) {
                for x in cx..(cx + 2).min(w) {
                    let at = (y * w + x) * 3;
                    out[at..at + 3].copy_from_slice(&rgb);
                }
            }
        }
    }

    out
}
