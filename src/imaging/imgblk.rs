//! ImgBlk: a YUYV frame regrouped into square tiles with separate planes
//!
//! The frame is cut into tiles of 80x80 macropixels (a macropixel is one
//! Y0 Cb Y1 Cr group, so a tile covers 160x80 pixels), visited left to right
//! then top to bottom, and each tile row by row. Visiting order fills three
//! planes:
//!
//! | plane | offset       | bytes per macropixel |
//! |-------|--------------|----------------------|
//! | luma  | 0            | 2 (Y0, Y1)           |
//! | Cb    | `w*h`        | 1                    |
//! | Cr    | `w*h + w*h/2`| 1                    |
//!
//! Samples far from mid-grey lose their low bits on the way in, which makes
//! the planes compress better. The way back is exact.

use crate::error::{ConfigError, PipelineError};

/// Tile side in macropixels
pub const BLOCK_SIDE: usize = 80;

/// Drop 3 low bits beyond `coarse` from mid-grey, 2 beyond `fine`.
fn quantize(sample: u8, coarse: u8, fine: u8) -> u8 {
    let distance = sample.abs_diff(0x80);
    if distance > coarse {
        sample & 0xF8
    } else if distance > fine {
        sample & 0xFC
    } else {
        sample
    }
}

pub fn quantize_luma(y: u8) -> u8 {
    quantize(y, 0x20, 0x10)
}

pub fn quantize_chroma(c: u8) -> u8 {
    quantize(c, 0x10, 0x08)
}

/// Geometry of an ImgBlk frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    width: u32,
    height: u32,
}

impl BlockLayout {
    /// The width must be a multiple of 160 pixels and the height a multiple
    /// of 80 rows, so the frame splits into whole tiles.
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        let side = BLOCK_SIDE as u32;
        if width == 0 || height == 0 || width % (2 * side) != 0 || height % side != 0 {
            return Err(ConfigError::BlockDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Bytes in one frame, identical for YUYV and ImgBlk
    pub fn frame_len(&self) -> usize {
        2 * self.width as usize * self.height as usize
    }

    fn groups(&self) -> usize {
        self.frame_len() / 4
    }

    /// Macropixel indices (in YUYV raster order) in tile order
    fn tile_order(&self) -> impl Iterator<Item = usize> {
        let stride = self.width as usize / 2;
        let rows = self.height as usize;
        (0..rows).step_by(BLOCK_SIDE).flat_map(move |top| {
            (0..stride).step_by(BLOCK_SIDE).flat_map(move |left| {
                (top..top + BLOCK_SIDE).flat_map(move |row| {
                    (left..left + BLOCK_SIDE).map(move |col| row * stride + col)
                })
            })
        })
    }

    fn check_len(&self, len: usize) -> Result<(), PipelineError> {
        if len < self.frame_len() {
            return Err(PipelineError::ShortFrame {
                len,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Regroup and quantize a YUYV frame.
    pub fn pack(&self, yuyv: &[u8]) -> Result<Vec<u8>, PipelineError> {
        self.check_len(yuyv.len())?;

        let groups = self.groups();
        let mut blk = vec![0u8; self.frame_len()];
        let (luma, chroma) = blk.split_at_mut(2 * groups);
        let (cb, cr) = chroma.split_at_mut(groups);

        for (idx, group) in self.tile_order().enumerate() {
            let px = &yuyv[4 * group..4 * group + 4];
            luma[2 * idx] = quantize_luma(px[0]);
            luma[2 * idx + 1] = quantize_luma(px[2]);
            cb[idx] = quantize_chroma(px[1]);
            cr[idx] = quantize_chroma(px[3]);
        }
        Ok(blk)
    }

    /// Put an ImgBlk frame back into YUYV raster order.
    pub fn unpack(&self, blk: &[u8]) -> Result<Vec<u8>, PipelineError> {
        self.check_len(blk.len())?;

        let groups = self.groups();
        let (luma, chroma) = blk.split_at(2 * groups);
        let (cb, cr) = chroma.split_at(groups);
        let mut yuyv = vec![0u8; self.frame_len()];

        for (idx, group) in self.tile_order().enumerate() {
            let px = &mut yuyv[4 * group..4 * group + 4];
            px[0] = luma[2 * idx];
            px[1] = cb[idx];
            px[2] = luma[2 * idx + 1];
            px[3] = cr[idx];
        }
        Ok(yuyv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 320;
    const H: u32 = 160;

    /// Every macropixel tagged with its tile number in Y0 and its position
    /// inside the tile in the other samples, all kept near mid-grey.
    fn tagged_frame() -> Vec<u8> {
        let stride = W as usize / 2;
        let mut yuyv = vec![0u8; 2 * (W * H) as usize];
        for (group, px) in yuyv.chunks_exact_mut(4).enumerate() {
            let (row, col) = (group / stride, group % stride);
            let tile = (row / BLOCK_SIDE) * (stride / BLOCK_SIDE) + col / BLOCK_SIDE;
            px[0] = 0x78 + tile as u8;
            px[1] = 0x7C + (col % 4) as u8;
            px[2] = 0x80 + (row % 16) as u8;
            px[3] = 0x7C + (row % 8) as u8;
        }
        yuyv
    }

    #[test]
    fn layout_needs_whole_tiles() {
        assert!(BlockLayout::new(1280, 720).is_ok());
        assert!(BlockLayout::new(160, 80).is_ok());
        for (w, h) in [(0, 80), (160, 0), (80, 80), (640, 100), (1280, 90)] {
            assert!(
                matches!(BlockLayout::new(w, h), Err(ConfigError::BlockDimensions { .. })),
                "{w}x{h}"
            );
        }
    }

    #[test]
    fn planes_follow_tile_order() {
        let layout = BlockLayout::new(W, H).unwrap();
        let blk = layout.pack(&tagged_frame()).unwrap();
        let tile_len = BLOCK_SIDE * BLOCK_SIDE;

        // four tiles, each a contiguous run in the luma plane
        for tile in 0..4 {
            let y0 = blk[2 * tile * tile_len];
            assert_eq!(y0, 0x78 + tile as u8);
            assert_eq!(blk[2 * (tile + 1) * tile_len - 2], y0);
        }

        // Cb and Cr planes start right after luma
        let groups = (W * H / 2) as usize;
        assert_eq!(blk[groups * 2], 0x7C);
        assert_eq!(blk[groups * 2 + 1], 0x7D);
        assert_eq!(blk[groups * 3], 0x7C);
        assert_eq!(blk[groups * 3 + BLOCK_SIDE], 0x7D);
    }

    #[test]
    fn near_grey_frames_survive_the_round_trip() {
        let layout = BlockLayout::new(W, H).unwrap();
        let yuyv = tagged_frame();

        let blk = layout.pack(&yuyv).unwrap();
        assert_ne!(blk, yuyv);
        assert_eq!(layout.unpack(&blk).unwrap(), yuyv);
    }

    #[test]
    fn round_trip_quantizes_far_samples() {
        let layout = BlockLayout::new(160, 80).unwrap();
        let yuyv: Vec<u8> = (0..layout.frame_len()).map(|i| (i * 7) as u8).collect();

        let back = layout.unpack(&layout.pack(&yuyv).unwrap()).unwrap();
        for (i, (&orig, &got)) in yuyv.iter().zip(&back).enumerate() {
            let expected = if i % 2 == 0 {
                quantize_luma(orig)
            } else {
                quantize_chroma(orig)
            };
            assert_eq!(got, expected, "byte {i}");
        }

        // quantized frames are fixed points
        let again = layout.unpack(&layout.pack(&back).unwrap()).unwrap();
        assert_eq!(again, back);
    }

    #[test]
    fn quantization_bands() {
        assert_eq!(quantize_luma(0x90), 0x90);
        assert_eq!(quantize_luma(0x93), 0x90);
        assert_eq!(quantize_luma(0x6F), 0x6C);
        assert_eq!(quantize_luma(0xA7), 0xA0);
        assert_eq!(quantize_luma(0x5F), 0x58);

        assert_eq!(quantize_chroma(0x87), 0x87);
        assert_eq!(quantize_chroma(0x8B), 0x88);
        assert_eq!(quantize_chroma(0x6F), 0x68);
        assert_eq!(quantize_chroma(0xFF), 0xF8);
    }

    #[test]
    fn short_input_is_rejected() {
        let layout = BlockLayout::new(160, 80).unwrap();
        let short = vec![0x80; layout.frame_len() - 1];

        assert!(matches!(
            layout.pack(&short),
            Err(PipelineError::ShortFrame { width: 160, .. })
        ));
        assert!(layout.unpack(&short).is_err());
    }
}
