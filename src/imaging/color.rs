//! YUYV (4:2:2) to RGB24 conversion in fixed point
//!
//! The coefficients are rationals over 32 so the output is bit-identical on
//! every platform:
//!
//! | term        | exact  | used  |
//! |-------------|--------|-------|
//! | R from Cr   | 1.403  | 45/32 |
//! | G from Cb   | 0.3455 | 11/32 |
//! | G from Cr   | 0.7169 | 23/32 |
//! | B from Cb   | 1.7790 | 57/32 |

/// Scale a 32x fixed-point channel back to 8 bits, clamping to [0, 255].
#[inline]
fn clamp_scaled(v: i32) -> u8 {
    if v <= 0 {
        0
    } else if v >= 32 * 255 {
        255
    } else {
        (v >> 5) as u8
    }
}

/// One pixel from its luma and the chroma pair it shares with its neighbour.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = i32::from(y) << 5;
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    [
        clamp_scaled(y + 45 * cr),
        clamp_scaled(y - 11 * cb - 23 * cr),
        clamp_scaled(y + 57 * cb),
    ]
}

/// Convert `npix` YUYV pixels into `rgb` (3 bytes per pixel).
///
/// Works on pixel pairs; a trailing odd pixel and anything beyond either
/// buffer is left untouched.
pub fn yuyv_to_rgb24_into(rgb: &mut [u8], yuyv: &[u8], npix: usize) {
    let pairs = npix / 2;
    for (src, dst) in yuyv
        .chunks_exact(4)
        .zip(rgb.chunks_exact_mut(6))
        .take(pairs)
    {
        let (y0, cb, y1, cr) = (src[0], src[1], src[2], src[3]);
        dst[..3].copy_from_slice(&ycbcr_to_rgb(y0, cb, cr));
        dst[3..].copy_from_slice(&ycbcr_to_rgb(y1, cb, cr));
    }
}

/// Convert `npix` YUYV pixels into a freshly allocated RGB24 buffer.
pub fn yuyv_to_rgb24(yuyv: &[u8], npix: usize) -> Vec<u8> {
    let mut rgb = vec![0u8; npix * 3];
    yuyv_to_rgb24_into(&mut rgb, yuyv, npix);
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_passes_luma_through() {
        let yuyv = [235, 128, 235, 128, 16, 128, 16, 128];
        let rgb = yuyv_to_rgb24(&yuyv, 4);
        assert_eq!(rgb, vec![235, 235, 235, 235, 235, 235, 16, 16, 16, 16, 16, 16]);
    }

    #[test]
    fn pairs_share_chroma() {
        // Y0=100, Cb=200, Y1=50, Cr=60
        let rgb = yuyv_to_rgb24(&[100, 200, 50, 60], 2);
        assert_eq!(&rgb[..3], &ycbcr_to_rgb(100, 200, 60));
        assert_eq!(&rgb[3..], &ycbcr_to_rgb(50, 200, 60));
    }

    #[test]
    fn matches_fixed_point_formula() {
        // R = (3200 - 45*68) >> 5 = 140 >> 5
        // G = (3200 - 11*72 + 23*68) >> 5 = 3972 >> 5
        // B = (3200 + 57*72) >> 5 = 7304 >> 5
        assert_eq!(ycbcr_to_rgb(100, 200, 60), [4, 124, 228]);
    }

    #[test]
    fn saturated_inputs_clamp() {
        assert_eq!(ycbcr_to_rgb(255, 255, 255), [255, 120, 255]);
        assert_eq!(ycbcr_to_rgb(0, 0, 0), [0, 136, 0]);
        assert_eq!(ycbcr_to_rgb(0, 128, 128), [0, 0, 0]);
        assert_eq!(ycbcr_to_rgb(255, 128, 128), [255, 255, 255]);
    }

    #[test]
    fn channels_never_decrease_with_luma() {
        for cb in (0..=255u8).step_by(17) {
            for cr in (0..=255u8).step_by(17) {
                let mut prev = ycbcr_to_rgb(0, cb, cr);
                for y in 1..=255u8 {
                    let next = ycbcr_to_rgb(y, cb, cr);
                    for c in 0..3 {
                        assert!(next[c] >= prev[c], "y={y} cb={cb} cr={cr}");
                    }
                    prev = next;
                }
            }
        }
    }

    #[test]
    fn odd_pixel_count_leaves_tail_untouched() {
        let mut rgb = vec![9u8; 9];
        yuyv_to_rgb24_into(&mut rgb, &[16, 128, 16, 128, 16, 128], 3);
        assert_eq!(&rgb[..6], &[16; 6]);
        assert_eq!(&rgb[6..], &[9, 9, 9]);
    }
}
