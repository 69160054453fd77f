//! Raw V4L2 buffer-protocol ioctls
//!
//! `v4l` covers device queries, but its streams hide the queue/dequeue split we
//! need for explicit buffer leases, so the streaming ioctls are declared here.
//! Layouts follow `linux/videodev2.h`.

use std::os::raw::{c_int, c_ulong, c_void};

use nix::errno::Errno;
use nix::{ioctl_readwrite, ioctl_write_ptr};

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_MEMORY_MMAP: u32 = 1;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Fract {
    pub numerator: u32,
    pub denominator: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Cropcap {
    pub type_: u32,
    pub bounds: V4l2Rect,
    pub defrect: V4l2Rect,
    pub pixelaspect: V4l2Fract,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Crop {
    pub type_: u32,
    pub c: V4l2Rect,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2RequestBuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct V4l2Timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union V4l2BufferM {
    pub offset: u32,
    pub userptr: c_ulong,
    pub planes: *mut c_void,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct V4l2Buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: libc::timeval,
    pub timecode: V4l2Timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m: V4l2BufferM,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

impl V4l2Buffer {
    /// Capture/MMAP buffer descriptor for `index`, everything else zeroed.
    pub fn mmap(index: u32) -> Self {
        // SAFETY: every field is plain data for which all-zero bits are valid.
        let mut buf: Self = unsafe { std::mem::zeroed() };
        buf.index = index;
        buf.type_ = V4L2_BUF_TYPE_VIDEO_CAPTURE;
        buf.memory = V4L2_MEMORY_MMAP;
        buf
    }

    /// Offset to pass to mmap for an MMAP buffer.
    pub fn offset(&self) -> u32 {
        // SAFETY: QUERYBUF on an MMAP buffer fills the `offset` member.
        unsafe { self.m.offset }
    }
}

ioctl_readwrite!(vidioc_reqbufs, b'V', 8, V4l2RequestBuffers);
ioctl_readwrite!(vidioc_querybuf, b'V', 9, V4l2Buffer);
ioctl_readwrite!(vidioc_qbuf, b'V', 15, V4l2Buffer);
ioctl_readwrite!(vidioc_dqbuf, b'V', 17, V4l2Buffer);
ioctl_write_ptr!(vidioc_streamon, b'V', 18, c_int);
ioctl_write_ptr!(vidioc_streamoff, b'V', 19, c_int);
ioctl_readwrite!(vidioc_cropcap, b'V', 58, V4l2Cropcap);
ioctl_write_ptr!(vidioc_s_crop, b'V', 60, V4l2Crop);

/// Run a syscall wrapper until it stops failing with `EINTR`.
pub fn retry_eintr<T>(mut op: impl FnMut() -> nix::Result<T>) -> nix::Result<T> {
    loop {
        match op() {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// Reset cropping to the driver's default rectangle. Many devices do not
/// support cropping at all, so failures are ignored.
pub fn reset_crop(fd: c_int) {
    let mut cropcap = V4l2Cropcap {
        type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
        ..Default::default()
    };
    // SAFETY: `cropcap` is a valid, writable v4l2_cropcap.
    if retry_eintr(|| unsafe { vidioc_cropcap(fd, &mut cropcap) }).is_err() {
        return;
    }
    let crop = V4l2Crop {
        type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
        c: cropcap.defrect,
    };
    // SAFETY: `crop` is a valid v4l2_crop.
    let _ = retry_eintr(|| unsafe { vidioc_s_crop(fd, &crop) });
}

/// Ask the driver for `count` MMAP capture buffers; returns the granted count.
pub fn request_buffers(fd: c_int, count: u32) -> nix::Result<u32> {
    let mut req = V4l2RequestBuffers {
        count,
        type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
        memory: V4L2_MEMORY_MMAP,
        ..Default::default()
    };
    // SAFETY: `req` is a valid, writable v4l2_requestbuffers.
    retry_eintr(|| unsafe { vidioc_reqbufs(fd, &mut req) })?;
    Ok(req.count)
}

pub fn query_buffer(fd: c_int, index: u32) -> nix::Result<V4l2Buffer> {
    let mut buf = V4l2Buffer::mmap(index);
    // SAFETY: `buf` is a valid, writable v4l2_buffer.
    retry_eintr(|| unsafe { vidioc_querybuf(fd, &mut buf) })?;
    Ok(buf)
}

pub fn queue_buffer(fd: c_int, index: u32) -> nix::Result<()> {
    let mut buf = V4l2Buffer::mmap(index);
    // SAFETY: `buf` is a valid, writable v4l2_buffer.
    retry_eintr(|| unsafe { vidioc_qbuf(fd, &mut buf) })?;
    Ok(())
}

/// Dequeue one filled buffer. On a non-blocking handle `EAGAIN` means no
/// buffer is ready yet.
pub fn dequeue_buffer(fd: c_int) -> nix::Result<V4l2Buffer> {
    let mut buf = V4l2Buffer::mmap(0);
    // SAFETY: `buf` is a valid, writable v4l2_buffer.
    retry_eintr(|| unsafe { vidioc_dqbuf(fd, &mut buf) })?;
    Ok(buf)
}

pub fn stream_on(fd: c_int) -> nix::Result<()> {
    let type_ = V4L2_BUF_TYPE_VIDEO_CAPTURE as c_int;
    // SAFETY: `type_` is a valid buffer type value.
    retry_eintr(|| unsafe { vidioc_streamon(fd, &type_) })?;
    Ok(())
}

pub fn stream_off(fd: c_int) -> nix::Result<()> {
    let type_ = V4L2_BUF_TYPE_VIDEO_CAPTURE as c_int;
    // SAFETY: `type_` is a valid buffer type value.
    retry_eintr(|| unsafe { vidioc_streamoff(fd, &type_) })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn struct_layouts_match_kernel_abi() {
        assert_eq!(size_of::<V4l2Rect>(), 16);
        assert_eq!(size_of::<V4l2Cropcap>(), 44);
        assert_eq!(size_of::<V4l2Crop>(), 20);
        assert_eq!(size_of::<V4l2RequestBuffers>(), 20);
        assert_eq!(size_of::<V4l2Timecode>(), 16);
        assert_eq!(size_of::<V4l2Buffer>(), 88);
    }

    #[test]
    fn mmap_descriptor_is_capture_type() {
        let buf = V4l2Buffer::mmap(3);
        assert_eq!(buf.index, 3);
        assert_eq!(buf.type_, V4L2_BUF_TYPE_VIDEO_CAPTURE);
        assert_eq!(buf.memory, V4L2_MEMORY_MMAP);
        assert_eq!(buf.offset(), 0);
    }

    #[test]
    fn retry_swallows_interrupts_only() {
        let mut calls = 0;
        let r = retry_eintr(|| {
            calls += 1;
            if calls < 3 {
                Err(Errno::EINTR)
            } else {
                Ok(calls)
            }
        });
        assert_eq!(r, Ok(3));

        let r: nix::Result<()> = retry_eintr(|| Err(Errno::EAGAIN));
        assert_eq!(r, Err(Errno::EAGAIN));
    }
}
