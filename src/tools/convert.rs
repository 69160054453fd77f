//! Convert a raw YUYV stream into JPEG snapshots

use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CaptureError, ConfigError, PipelineError};
use crate::imaging::BlockLayout;
use crate::pipeline::JpegFrameEncoder;
use crate::storage;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub width: u32,
    pub height: u32,
    /// JPEG level 1-3
    pub quality: u8,
    /// Replaced with every converted frame
    pub output: PathBuf,
    /// Also keep each frame in ImgBlk layout here. The JPEG is then made
    /// from the quantized frame.
    pub imgblk: Option<PathBuf>,
}

/// Fill `buf` from `input`, stopping early only at end of input.
fn read_frame<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn write_to(path: &Path, data: &[u8]) -> Result<(), PipelineError> {
    storage::write_atomic(path, data).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read consecutive YUYV frames from `input` until it ends and atomically
/// replace the output file(s) with each one. Returns the frames converted.
pub fn convert_stream<R>(input: &mut R, opts: &ConvertOptions) -> Result<u64, CaptureError>
where
    R: Read + ?Sized,
{
    let (width, height) = (opts.width, opts.height);
    if width == 0 || height == 0 {
        return Err(ConfigError::Dimensions { width, height }.into());
    }
    if !(1..=3).contains(&opts.quality) {
        return Err(ConfigError::Quality(opts.quality).into());
    }
    let blocks = match &opts.imgblk {
        Some(path) => Some((BlockLayout::new(width, height)?, path.as_path())),
        None => None,
    };

    let frame_len = 2 * width as usize * height as usize;
    let mut frame = vec![0u8; frame_len];
    let mut encoder = JpegFrameEncoder::new(opts.quality);
    let mut converted = 0u64;

    loop {
        let n = read_frame(input, &mut frame)?;
        if n == 0 {
            break;
        }
        if n < frame_len {
            warn!("Ignoring trailing partial frame ({} of {} bytes)", n, frame_len);
            break;
        }

        let jpeg = match blocks {
            Some((layout, path)) => {
                let blk = layout.pack(&frame)?;
                write_to(path, &blk)?;
                encoder.encode_yuyv(&layout.unpack(&blk)?, width, height)?
            }
            None => encoder.encode_yuyv(&frame, width, height)?,
        };
        write_to(&opts.output, &jpeg)?;
        converted += 1;
        debug!(converted, bytes = jpeg.len(), "frame converted");
    }

    info!("Converted {} frames into {}", converted, opts.output.display());
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;

    use super::*;

    fn stream(frames: usize, width: u32, height: u32) -> Vec<u8> {
        [0x78u8, 0x80].repeat(frames * (width * height) as usize)
    }

    fn jpeg_to(output: &Path, width: u32, height: u32, quality: u8) -> ConvertOptions {
        ConvertOptions {
            width,
            height,
            quality,
            output: output.to_path_buf(),
            imgblk: None,
        }
    }

    #[test]
    fn converts_every_full_frame() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("snap.jpg");
        let mut input = Cursor::new(stream(3, 8, 8));

        let n = convert_stream(&mut input, &jpeg_to(&out, 8, 8, 2)).unwrap();

        assert_eq!(n, 3);
        let jpeg = fs::read(&out).unwrap();
        assert_eq!(jpeg[..2], [0xFFu8, 0xD8]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn trailing_partial_frame_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("snap.jpg");
        let mut data = stream(1, 8, 8);
        data.extend_from_slice(&[16; 40]);

        let n = convert_stream(&mut Cursor::new(data), &jpeg_to(&out, 8, 8, 1)).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn empty_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("snap.jpg");

        let n = convert_stream(&mut io::empty(), &jpeg_to(&out, 8, 8, 3)).unwrap();
        assert_eq!(n, 0);
        assert!(!out.exists());
    }

    #[test]
    fn rejects_bad_options() {
        let out = Path::new("unused.jpg");

        let err = convert_stream(&mut io::empty(), &jpeg_to(out, 0, 8, 1)).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Config(ConfigError::Dimensions { width: 0, height: 8 })
        ));

        let err = convert_stream(&mut io::empty(), &jpeg_to(out, 8, 8, 0)).unwrap_err();
        assert!(matches!(err, CaptureError::Config(ConfigError::Quality(0))));

        // ImgBlk output needs whole tiles
        let opts = ConvertOptions {
            imgblk: Some(PathBuf::from("unused.blk")),
            ..jpeg_to(out, 8, 8, 1)
        };
        let err = convert_stream(&mut io::empty(), &opts).unwrap_err();
        assert!(matches!(err, CaptureError::Config(ConfigError::BlockDimensions { .. })));
    }

    #[test]
    fn imgblk_output_is_written_next_to_the_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ConvertOptions {
            imgblk: Some(dir.path().join("snap.blk")),
            ..jpeg_to(&dir.path().join("snap.jpg"), 160, 80, 2)
        };
        let frames = stream(2, 160, 80);

        let n = convert_stream(&mut Cursor::new(&frames), &opts).unwrap();
        assert_eq!(n, 2);

        let blk = fs::read(dir.path().join("snap.blk")).unwrap();
        let layout = BlockLayout::new(160, 80).unwrap();
        assert_eq!(blk.len(), layout.frame_len());
        // samples near mid-grey are not quantized, so the frame comes back whole
        assert_eq!(layout.unpack(&blk).unwrap(), frames[..layout.frame_len()]);
        assert_eq!(fs::read(dir.path().join("snap.jpg")).unwrap()[..2], [0xFFu8, 0xD8]);
    }
}
