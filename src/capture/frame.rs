use std::fmt;
use std::time::Instant;

use v4l::FourCC;

/// Frame borrowed from a leased device buffer.
///
/// Only lives for the duration of one handler call; the pipeline may overwrite
/// `data` in place (overlay) but must not keep it.
pub struct Frame<'a> {
    /// Bytes the driver filled in for this frame
    pub data: &'a mut [u8],

    /// Frame metadata
    pub meta: FrameMetadata,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Index of the driver buffer holding this frame
    pub index: u32,
    /// Driver frame sequence number
    pub sequence: u32,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub bytes_used: usize,
    /// Dequeue time, for latency tracking
    pub timestamp: Instant,
}

impl FrameMetadata {
    /// Number of pixels the reported resolution describes.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Proof of exclusive access to one dequeued buffer.
///
/// Returned by `acquire`, consumed by `release`. It is deliberately neither
/// `Clone` nor `Copy`, so a buffer cannot be handed back twice.
#[derive(Debug)]
#[must_use = "a lease must be released or the buffer never returns to the driver"]
pub struct Lease {
    meta: FrameMetadata,
}

impl Lease {
    /// Used by `FrameSource` implementations when a buffer is dequeued.
    pub fn new(meta: FrameMetadata) -> Self {
        Self { meta }
    }

    pub fn index(&self) -> u32 {
        self.meta.index
    }

    pub fn meta(&self) -> &FrameMetadata {
        &self.meta
    }
}

/// Pixel formats we recognize by their fourcc tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Interleaved 4:2:2 luma/chroma (Y0 Cb Y1 Cr)
    Yuyv,
    Mjpeg,
    Rgb24,
    Other(FourCC),
}

impl PixelFormat {
    pub fn fourcc(&self) -> FourCC {
        match self {
            PixelFormat::Yuyv => FourCC::new(b"YUYV"),
            PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
            PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
            PixelFormat::Other(fourcc) => *fourcc,
        }
    }

    /// Overlay and compression only understand YUYV.
    pub fn is_yuyv(&self) -> bool {
        matches!(self, PixelFormat::Yuyv)
    }
}

impl From<FourCC> for PixelFormat {
    fn from(fourcc: FourCC) -> Self {
        match &fourcc.repr {
            b"YUYV" => PixelFormat::Yuyv,
            b"MJPG" => PixelFormat::Mjpeg,
            b"RGB3" => PixelFormat::Rgb24,
            _ => PixelFormat::Other(fourcc),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fourcc = self.fourcc();
        match fourcc.str() {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:?}", fourcc.repr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_maps_to_known_formats() {
        assert_eq!(PixelFormat::from(FourCC::new(b"YUYV")), PixelFormat::Yuyv);
        assert_eq!(PixelFormat::from(FourCC::new(b"MJPG")), PixelFormat::Mjpeg);

        let nv12 = PixelFormat::from(FourCC::new(b"NV12"));
        assert_eq!(nv12, PixelFormat::Other(FourCC::new(b"NV12")));
        assert!(!nv12.is_yuyv());
        assert_eq!(nv12.to_string(), "NV12");
    }

    #[test]
    fn pixel_count_uses_reported_resolution() {
        let meta = FrameMetadata {
            index: 0,
            sequence: 0,
            width: 640,
            height: 480,
            format: PixelFormat::Yuyv,
            bytes_used: 640 * 480 * 2,
            timestamp: Instant::now(),
        };
        assert_eq!(meta.pixel_count(), 307_200);
    }
}
