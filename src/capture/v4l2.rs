//! V4L2 device channel with a fixed pool of memory-mapped driver buffers

use std::os::fd::BorrowedFd;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, info, instrument, warn};
use v4l::capability::Flags as CapFlags;
use v4l::video::Capture;
use v4l::Device;

use crate::capture::capture_loop::CancelToken;
use crate::capture::frame::{Frame, FrameMetadata, Lease, PixelFormat};
use crate::capture::ioctl;
use crate::capture::source::FrameSource;
use crate::error::DeviceError;

/// Longest single poll while waiting for a frame; cancellation is noticed
/// between slices.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Who currently owns a driver buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Submitted to the driver queue
    Queued,
    /// Dequeued and handed to user code
    Leased,
}

struct MappedBuffer {
    map: MmapMut,
    state: BufferState,
}

/// Current device format, as configured by an external tool
#[derive(Debug, Clone, Copy)]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Streaming capture channel
///
/// Owns the device handle and the mapped buffers. Teardown happens exactly once,
/// through [`DeviceChannel::close`] or on drop.
pub struct DeviceChannel {
    path: PathBuf,
    device: Option<Device>,
    buffers: Vec<MappedBuffer>,
    streaming: bool,
    cancel: CancelToken,
}

impl DeviceChannel {
    /// Open `path`, map `buffer_count` driver buffers and start streaming.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, buffer_count: u32) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();

        // v4l opens the node with O_RDWR | O_NONBLOCK
        let device = Device::with_path(&path).map_err(|source| DeviceError::Open {
            path: path.clone(),
            source,
        })?;

        let mut channel = Self {
            path,
            device: Some(device),
            buffers: Vec::with_capacity(buffer_count as usize),
            streaming: false,
            cancel: CancelToken::new(),
        };

        if let Err(e) = channel.start(buffer_count) {
            channel.close();
            return Err(e);
        }

        Ok(channel)
    }

    /// Cut frame waits short once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn start(&mut self, buffer_count: u32) -> Result<(), DeviceError> {
        let device = self.device.as_ref().ok_or(DeviceError::Closed)?;

        let caps = device
            .query_caps()
            .map_err(|source| DeviceError::QueryCaps {
                path: self.path.clone(),
                source,
            })?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(DeviceError::NotCapture {
                path: self.path.clone(),
            });
        }
        if !caps.capabilities.contains(CapFlags::STREAMING) {
            return Err(DeviceError::NoStreaming {
                path: self.path.clone(),
            });
        }

        let fd = self.fd()?;
        ioctl::reset_crop(fd);

        // Preserve whatever format was configured externally
        let format = self.format()?;
        info!(
            "Stream format: {}x{} {}",
            format.width, format.height, format.format
        );

        let granted = ioctl::request_buffers(fd, buffer_count).map_err(|source| {
            DeviceError::Ioctl {
                op: "VIDIOC_REQBUFS",
                source,
            }
        })?;
        if granted != buffer_count {
            return Err(DeviceError::BufferCount {
                requested: buffer_count,
                granted,
            });
        }

        for index in 0..buffer_count {
            let desc = ioctl::query_buffer(fd, index).map_err(|source| DeviceError::Ioctl {
                op: "VIDIOC_QUERYBUF",
                source,
            })?;

            // SAFETY: offset and length come from QUERYBUF for this buffer; the
            // mapping is dropped in close() before the device handle.
            let map = unsafe {
                MmapOptions::new()
                    .offset(u64::from(desc.offset()))
                    .len(desc.length as usize)
                    .map_mut(fd)
            }
            .map_err(|source| DeviceError::Map { index, source })?;

            ioctl::queue_buffer(fd, index).map_err(|source| DeviceError::Ioctl {
                op: "VIDIOC_QBUF",
                source,
            })?;
            self.buffers.push(MappedBuffer {
                map,
                state: BufferState::Queued,
            });
        }

        ioctl::stream_on(fd).map_err(|source| DeviceError::Ioctl {
            op: "VIDIOC_STREAMON",
            source,
        })?;
        self.streaming = true;

        info!("Capture stream started with {} buffers", buffer_count);
        Ok(())
    }

    fn fd(&self) -> Result<c_int, DeviceError> {
        self.device
            .as_ref()
            .map(|device| device.handle().fd())
            .ok_or(DeviceError::Closed)
    }

    /// Re-read the device's current resolution and pixel format.
    pub fn format(&self) -> Result<StreamFormat, DeviceError> {
        let device = self.device.as_ref().ok_or(DeviceError::Closed)?;
        let fmt = device.format().map_err(DeviceError::Format)?;
        Ok(StreamFormat {
            width: fmt.width,
            height: fmt.height,
            format: PixelFormat::from(fmt.fourcc),
        })
    }

    /// Block until the device signals a filled buffer, `deadline` passes or
    /// the cancel token fires.
    fn wait_readable(&self, fd: c_int, deadline: Instant) -> Result<bool, DeviceError> {
        // SAFETY: fd stays open for as long as self.device is Some.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };

        while !self.cancel.is_cancelled() {
            if Instant::now() >= deadline {
                break;
            }
            let ready = ioctl::retry_eintr(|| {
                let timeout = slice_timeout(deadline.saturating_duration_since(Instant::now()));
                let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
                poll(&mut fds, timeout)
            })
            .map_err(DeviceError::Wait)?;
            if ready > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn try_acquire(&mut self, timeout: Duration) -> Result<Option<Lease>, DeviceError> {
        let fd = self.fd()?;
        let deadline = Instant::now() + timeout;

        let desc = loop {
            if !self.wait_readable(fd, deadline)? {
                return Ok(None);
            }
            match ioctl::dequeue_buffer(fd) {
                Ok(desc) => break desc,
                // Woken up without a finished buffer
                Err(Errno::EAGAIN) => continue,
                Err(source) => {
                    return Err(DeviceError::Ioctl {
                        op: "VIDIOC_DQBUF",
                        source,
                    })
                }
            }
        };

        let index = desc.index;
        let count = self.buffers.len();
        let buffer = self
            .buffers
            .get_mut(index as usize)
            .ok_or(DeviceError::BadIndex { index, count })?;
        if buffer.state == BufferState::Leased {
            return Err(DeviceError::AlreadyLeased(index));
        }
        buffer.state = BufferState::Leased;
        let bytes_used = (desc.bytesused as usize).min(buffer.map.len());

        let format = self.format()?;
        debug!(index, sequence = desc.sequence, bytes_used, "buffer leased");

        Ok(Some(Lease::new(FrameMetadata {
            index,
            sequence: desc.sequence,
            width: format.width,
            height: format.height,
            format: format.format,
            bytes_used,
            timestamp: Instant::now(),
        })))
    }

    fn try_release(&mut self, lease: Lease) -> Result<(), DeviceError> {
        let fd = self.fd()?;
        let index = lease.index();

        match self.buffers.get(index as usize).map(|b| b.state) {
            Some(BufferState::Leased) => {}
            _ => return Err(DeviceError::NotLeased(index)),
        }

        ioctl::queue_buffer(fd, index).map_err(|source| DeviceError::Ioctl {
            op: "VIDIOC_QBUF",
            source,
        })?;
        self.buffers[index as usize].state = BufferState::Queued;
        Ok(())
    }

    /// Stop streaming, unmap every buffer and close the device. Safe to call
    /// more than once.
    pub fn close(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };

        if self.streaming {
            if let Err(e) = ioctl::stream_off(device.handle().fd()) {
                warn!("VIDIOC_STREAMOFF failed on {}: {}", self.path.display(), e);
            }
            self.streaming = false;
        }

        // Unmap before the handle goes away
        self.buffers.clear();
        drop(device);

        info!("Closed {}", self.path.display());
    }
}

/// Poll timeout for the next slice of a wait with `remaining` time left
fn slice_timeout(remaining: Duration) -> PollTimeout {
    PollTimeout::try_from(remaining.min(WAIT_SLICE)).unwrap_or(PollTimeout::MAX)
}

impl FrameSource for DeviceChannel {
    fn acquire(&mut self, timeout: Duration) -> Result<Option<Lease>, DeviceError> {
        let result = self.try_acquire(timeout);
        if result.is_err() {
            self.close();
        }
        result
    }

    fn frame(&mut self, lease: &Lease) -> Frame<'_> {
        let meta = lease.meta().clone();
        let data: &mut [u8] = match self.buffers.get_mut(lease.index() as usize) {
            Some(buffer) => &mut buffer.map[..meta.bytes_used],
            None => &mut [],
        };
        Frame { data, meta }
    }

    fn release(&mut self, lease: Lease) -> Result<(), DeviceError> {
        let result = self.try_release(lease);
        if result.is_err() {
            self.close();
        }
        result
    }

    fn close(&mut self) {
        DeviceChannel::close(self);
    }
}

impl Drop for DeviceChannel {
    fn drop(&mut self) {
        self.close();
    }
}
