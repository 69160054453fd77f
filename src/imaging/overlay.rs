//! Text overlay drawn straight into YUYV frames

use super::font::{glyph, GLYPH_HEIGHT, GLYPH_WIDTH};

/// Foreground luma and chroma
pub const TEXT_Y: u8 = 0xFF;
pub const TEXT_CHROMA: u8 = 0x7F;
/// Background luma and chroma
pub const BACK_Y: u8 = 0x00;
pub const BACK_CHROMA: u8 = 0x7F;

/// Render `text` with its top-left corner at pixel (`x`, `y`).
///
/// Every pixel covered by a glyph cell is overwritten: its luma byte with the
/// foreground or background level and its chroma byte with neutral grey.
/// Text is clipped at the image edges (and at the end of `yuyv` if the driver
/// delivered a short frame); it never wraps.
pub fn put_str(yuyv: &mut [u8], width: u32, height: u32, text: &str, x: u32, y: u32) {
    let (width, height) = (width as usize, height as usize);
    let (x, y) = (x as usize, y as usize);
    let bytes = text.as_bytes();

    for row in 0..GLYPH_HEIGHT {
        let py = y + row;
        if py >= height {
            break;
        }
        for col in 0..bytes.len() * GLYPH_WIDTH {
            let px = x + col;
            if px >= width {
                break;
            }

            let offset = 2 * (py * width + px);
            let Some(pixel) = yuyv.get_mut(offset..offset + 2) else {
                return;
            };

            let bits = glyph(bytes[col / GLYPH_WIDTH])[row];
            if bits & (1 << (col % GLYPH_WIDTH)) != 0 {
                pixel[0] = TEXT_Y;
                pixel[1] = TEXT_CHROMA;
            } else {
                pixel[0] = BACK_Y;
                pixel[1] = BACK_CHROMA;
            }
        }
    }
}
