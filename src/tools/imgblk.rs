//! One-shot conversion of a single frame between YUYV and ImgBlk

use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::error::{CaptureError, PipelineError};
use crate::imaging::BlockLayout;
use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// YUYV in, ImgBlk out
    ToImgBlk,
    /// ImgBlk in, YUYV out
    ToYuyv,
}

/// Read exactly one frame from `input`, or from `path` when given. Anything
/// but a whole frame is an error.
pub fn read_whole_frame<R>(
    input: &mut R,
    path: Option<&Path>,
    layout: &BlockLayout,
) -> Result<Vec<u8>, CaptureError>
where
    R: Read + ?Sized,
{
    let expected = layout.frame_len();
    let data = match path {
        Some(path) => storage::read_file(path)?,
        None => {
            // one byte more than a frame is enough to tell it is too long
            let mut data = Vec::with_capacity(expected + 1);
            input.take(expected as u64 + 1).read_to_end(&mut data)?;
            data
        }
    };

    if data.len() != expected {
        return Err(PipelineError::FrameSize {
            len: data.len(),
            expected,
        }
        .into());
    }
    Ok(data)
}

/// Convert one frame and atomically write the result to `output`.
pub fn convert_frame(
    frame: &[u8],
    layout: &BlockLayout,
    direction: Direction,
    output: &Path,
) -> Result<(), CaptureError> {
    let converted = match direction {
        Direction::ToImgBlk => layout.pack(frame)?,
        Direction::ToYuyv => layout.unpack(frame)?,
    };
    storage::write_atomic(output, &converted).map_err(|source| PipelineError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    info!("Wrote {:?} frame to {}", direction, output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{self, Cursor};

    use super::*;

    fn layout() -> BlockLayout {
        BlockLayout::new(160, 80).unwrap()
    }

    #[test]
    fn frame_must_be_exactly_one_frame_long() {
        let layout = layout();
        let len = layout.frame_len();

        let frame = read_whole_frame(&mut Cursor::new(vec![0x80; len]), None, &layout).unwrap();
        assert_eq!(frame.len(), len);

        for bad in [0, len - 1, len + 1, 2 * len] {
            let mut input = Cursor::new(vec![0x80; bad]);
            let err = read_whole_frame(&mut input, None, &layout).unwrap_err();
            match err {
                CaptureError::Pipeline(PipelineError::FrameSize { len: got, expected }) => {
                    assert_eq!(expected, len);
                    assert_eq!(got, bad.min(len + 1));
                }
                other => panic!("expected FrameSize, got {other:?}"),
            }
        }
    }

    #[test]
    fn input_file_takes_precedence_over_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.yuv");
        let layout = layout();
        fs::write(&path, vec![0x81; layout.frame_len()]).unwrap();

        let frame = read_whole_frame(&mut io::empty(), Some(&path), &layout).unwrap();
        assert!(frame.iter().all(|b| *b == 0x81));
    }

    #[test]
    fn both_directions_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let blk_path = dir.path().join("frame.blk");
        let yuv_path = dir.path().join("frame.yuv");
        let layout = layout();
        let yuyv: Vec<u8> = (0..layout.frame_len())
            .map(|i| 0x7C + (i % 8) as u8)
            .collect();

        convert_frame(&yuyv, &layout, Direction::ToImgBlk, &blk_path).unwrap();
        let blk = fs::read(&blk_path).unwrap();
        assert_ne!(blk, yuyv);

        convert_frame(&blk, &layout, Direction::ToYuyv, &yuv_path).unwrap();
        assert_eq!(fs::read(&yuv_path).unwrap(), yuyv);
    }

    #[test]
    fn unwritable_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missing").join("frame.blk");
        let layout = layout();

        let frame = vec![0x80; layout.frame_len()];

        let err = convert_frame(&frame, &layout, Direction::ToImgBlk, &out).unwrap_err();
        assert!(matches!(err, CaptureError::Pipeline(PipelineError::Write { .. })));
    }
}
