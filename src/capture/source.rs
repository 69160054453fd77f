use std::time::Duration;

use crate::capture::frame::{Frame, Lease};
use crate::error::DeviceError;

/// Anything that hands out frames under the lease protocol.
///
/// [`crate::capture::DeviceChannel`] is the real implementation; the capture
/// loop and the round-robin dumper only talk to this trait.
pub trait FrameSource {
    /// Wait up to `timeout` for a filled buffer. `Ok(None)` means the wait
    /// timed out and the caller decides whether to try again.
    fn acquire(&mut self, timeout: Duration) -> Result<Option<Lease>, DeviceError>;

    /// Mutable view of the leased buffer.
    fn frame(&mut self, lease: &Lease) -> Frame<'_>;

    /// Hand the buffer back to the driver.
    fn release(&mut self, lease: Lease) -> Result<(), DeviceError>;

    /// Tear everything down. Must be idempotent.
    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn acquire(&mut self, timeout: Duration) -> Result<Option<Lease>, DeviceError> {
        (**self).acquire(timeout)
    }

    fn frame(&mut self, lease: &Lease) -> Frame<'_> {
        (**self).frame(lease)
    }

    fn release(&mut self, lease: Lease) -> Result<(), DeviceError> {
        (**self).release(lease)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
