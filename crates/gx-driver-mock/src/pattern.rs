//! Test pattern generation for mock camera frames.

use gx_core::PixelFormat;

/// Simple pseudo-random number generator (LCG) for reproducible noise.
#[inline]
fn prng(seed: u64) -> u64 {
    seed.wrapping_mul(1103515245).wrapping_add(12345) & 0x7fffffff
}

/// Scene intensity in `0.0..=1.0` at (x, y) for the given frame.
///
/// A diagonal gradient that scrolls one pixel per frame, so consecutive
/// frames differ and a frozen display is easy to spot.
fn luminance(x: usize, y: usize, w: usize, h: usize, frame_num: u64) -> f64 {
    let span = (w + h).max(1);
    let pos = (x + y + frame_num as usize) % span;
    pos as f64 / span as f64
}

/// Scene colour at (x, y): red ramps left to right, green top to bottom,
/// blue pulses with the frame number.
fn scene_rgb(x: usize, y: usize, w: usize, h: usize, frame_num: u64) -> [u8; 3] {
    let r = (x * 255 / w.max(1)) as u8;
    let g = (y * 255 / h.max(1)) as u8;
    let b = ((frame_num * 8) % 256) as u8;
    [r, g, b]
}

/// Fill `out` with one frame of `format` data.
///
/// `out` must hold at least `format.image_bytes(width, height)` bytes; any
/// extra tail is left untouched. Returns the number of bytes written.
pub fn fill_frame(
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_num: u64,
    out: &mut [u8],
) -> usize {
    let w = width as usize;
    let h = height as usize;
    let Some(needed) = format.image_bytes(width, height) else {
        return 0;
    };
    if out.len() < needed {
        return 0;
    }

    let frame_seed = frame_num.wrapping_mul(2654435761);

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let noise = (prng(frame_seed ^ idx as u64) & 0x7) as u8;
            match format {
                PixelFormat::Mono8 => {
                    let v = (luminance(x, y, w, h, frame_num) * 247.0) as u8;
                    out[idx] = v.saturating_add(noise);
                }
                PixelFormat::Mono10 | PixelFormat::Mono12 => {
                    let max = (1u32 << format.bit_depth()) - 1;
                    let v = (luminance(x, y, w, h, frame_num) * max as f64) as u16;
                    let bytes = v.min(max as u16).to_le_bytes();
                    out[idx * 2] = bytes[0];
                    out[idx * 2 + 1] = bytes[1];
                }
                PixelFormat::BayerRg8
                | PixelFormat::BayerGb8
                | PixelFormat::BayerGr8
                | PixelFormat::BayerBg8 => {
                    let rgb = scene_rgb(x, y, w, h, frame_num);
                    let channel = format.cfa_channel(x as u32, y as u32).unwrap_or(1);
                    out[idx] = rgb[channel];
                }
                PixelFormat::Rgb8 => {
                    let rgb = scene_rgb(x, y, w, h, frame_num);
                    out[idx * 3..idx * 3 + 3].copy_from_slice(&rgb);
                }
            }
        }
    }

    needed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono8_pattern_fills_exact_size() {
        let mut buf = vec![0u8; 64 * 48 + 10];
        let written = fill_frame(PixelFormat::Mono8, 64, 48, 0, &mut buf);
        assert_eq!(written, 64 * 48);
        assert!(buf[..written].iter().any(|&v| v > 100));
        assert!(buf[written..].iter().all(|&v| v == 0), "tail must be untouched");
    }

    #[test]
    fn pattern_moves_between_frames() {
        let mut a = vec![0u8; 32 * 32];
        let mut b = vec![0u8; 32 * 32];
        fill_frame(PixelFormat::Mono8, 32, 32, 0, &mut a);
        fill_frame(PixelFormat::Mono8, 32, 32, 5, &mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn mono12_stays_within_bit_depth() {
        let mut buf = vec![0u8; 16 * 16 * 2];
        fill_frame(PixelFormat::Mono12, 16, 16, 3, &mut buf);
        for chunk in buf.chunks_exact(2) {
            assert!(u16::from_le_bytes([chunk[0], chunk[1]]) <= 4095);
        }
    }

    #[test]
    fn bayer_samples_match_scene_channel() {
        let (w, h) = (8u32, 8u32);
        let mut buf = vec![0u8; 64];
        fill_frame(PixelFormat::BayerRg8, w, h, 2, &mut buf);
        // Top-left of an RG pattern carries red, which ramps with x.
        let expected_red = scene_rgb(4, 0, 8, 8, 2)[0];
        assert_eq!(buf[4], expected_red);
        // (1, 1) carries blue.
        assert_eq!(buf[9], scene_rgb(1, 1, 8, 8, 2)[2]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut buf = vec![0u8; 10];
        assert_eq!(fill_frame(PixelFormat::Mono8, 8, 8, 0, &mut buf), 0);
    }
}
