//! Frame processing pipeline run on every captured frame

pub mod encode;
pub mod handler;
pub mod rate;
pub mod sinks;

pub use encode::{jpeg_quality, FrameEncoder, JpegFrameEncoder};
pub use handler::{FrameProcessor, PipelineState, TIMESTAMP_FORMAT};
pub use rate::RateLimiter;
pub use sinks::{sequence_path, SinkKind, SinkReport};
