//! Compressed frame encoding

use bytes::{BufMut, Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::error::PipelineError;
use crate::imaging::yuyv_to_rgb24_into;

/// Encodes a packed RGB24 image
pub trait FrameEncoder {
    fn encode(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Bytes, PipelineError>;
}

/// JPEG quality for user levels 1 (smallest) to 3 (largest). Out of range
/// levels are clamped.
pub fn jpeg_quality(level: u8) -> u8 {
    match level {
        0 | 1 => 40,
        2 => 75,
        _ => 92,
    }
}

pub struct JpegFrameEncoder {
    quality: u8,
    /// Reused between frames
    rgb: Vec<u8>,
}

impl JpegFrameEncoder {
    /// `level` is the user facing 1-3 scale.
    pub fn new(level: u8) -> Self {
        Self {
            quality: jpeg_quality(level),
            rgb: Vec::new(),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Convert a YUYV frame to RGB24 and compress it.
    pub fn encode_yuyv(
        &mut self,
        yuyv: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Bytes, PipelineError> {
        let npix = width as usize * height as usize;
        if yuyv.len() < npix * 2 {
            return Err(PipelineError::ShortFrame {
                len: yuyv.len(),
                width,
                height,
            });
        }

        let mut rgb = std::mem::take(&mut self.rgb);
        rgb.resize(npix * 3, 0);
        yuyv_to_rgb24_into(&mut rgb, yuyv, npix);
        let encoded = self.encode(&rgb, width, height);
        self.rgb = rgb;
        encoded
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Bytes, PipelineError> {
        let mut writer = BytesMut::with_capacity(rgb.len() / 8).writer();
        JpegEncoder::new_with_quality(&mut writer, self.quality).encode(
            rgb,
            width,
            height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(writer.into_inner().freeze())
    }
}
