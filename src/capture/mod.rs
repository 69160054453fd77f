pub mod capture_loop;
pub mod frame;
pub mod ioctl;
pub mod source;
pub mod v4l2;

pub use capture_loop::{CancelToken, CaptureLoop, Flow, FrameHandler, LoopExit, LoopState};
pub use frame::{Frame, FrameMetadata, Lease, PixelFormat};
pub use source::FrameSource;
pub use v4l2::{BufferState, DeviceChannel, StreamFormat};
