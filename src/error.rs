//! Error types for the capture engine and frame pipeline

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::capture::PixelFormat;

/// Failures of the device channel. All of them are fatal to the channel.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("{path} is not v4l2 compatible: {source}")]
    QueryCaps { path: PathBuf, source: io::Error },

    #[error("{path} does not support video capture")]
    NotCapture { path: PathBuf },

    #[error("{path} does not support streaming I/O")]
    NoStreaming { path: PathBuf },

    #[error("failed to query device format: {0}")]
    Format(io::Error),

    #[error("{op} failed: {source}")]
    Ioctl {
        op: &'static str,
        source: nix::Error,
    },

    #[error("driver granted {granted} buffers, {requested} requested")]
    BufferCount { requested: u32, granted: u32 },

    #[error("failed to map device buffer {index}: {source}")]
    Map { index: u32, source: io::Error },

    #[error("waiting for a frame failed: {0}")]
    Wait(nix::Error),

    #[error("driver returned out-of-range buffer index {index} (pool of {count})")]
    BadIndex { index: u32, count: usize },

    #[error("buffer {0} dequeued while still leased")]
    AlreadyLeased(u32),

    #[error("buffer {0} released but not leased")]
    NotLeased(u32),

    #[error("device channel is closed")]
    Closed,
}

/// Failures inside the frame handler.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot compress {0} frames, only YUYV is supported")]
    Encoding(PixelFormat),

    #[error("frame of {len} bytes is too short for {width}x{height} YUYV")]
    ShortFrame { len: usize, width: u32, height: u32 },

    #[error("jpeg encoder failed: {0}")]
    Encoder(#[from] image::ImageError),

    #[error("expected a {expected}-byte frame, got {len} bytes")]
    FrameSize { len: usize, expected: usize },

    #[error("writing {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Invalid options, raised before any capture starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("filename too long ({len} > {max} bytes): {path}")]
    PathTooLong { path: PathBuf, len: usize, max: usize },

    #[error("compression quality must be 0 (off) or 1-3, got {0}")]
    Quality(u8),

    #[error("subsample modulus must be at least 1")]
    Subsample,

    #[error("buffer count must be between 1 and {max}, got {count}")]
    BufferCount { count: u32, max: u32 },

    #[error("frame wait timeout must be at least 1 ms")]
    Timeout,

    #[error("image dimensions must be positive, got {width}x{height}")]
    Dimensions { width: u32, height: u32 },

    #[error("ImgBlk width must divide by 160 and height by 80, got {width}x{height}")]
    BlockDimensions { width: u32, height: u32 },

    #[error("no capture device given")]
    NoDevice,

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Everything a capture session can fail with.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
