//! Round-robin raw frame dumper over one or more sources

use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::{CancelToken, FrameSource, Lease};
use crate::error::CaptureError;

#[derive(Debug, Clone, Copy)]
pub struct CatOptions {
    /// Frames to write in total, 0 for no limit
    pub total: u64,
    /// Frames taken from a source before moving to the next one
    pub each: u64,
    /// Frames dropped before each written frame
    pub discard: u64,
    pub timeout: Duration,
}

impl Default for CatOptions {
    fn default() -> Self {
        Self {
            total: 0,
            each: 1,
            discard: 0,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Wait for the next frame, retrying on timeout. `None` once cancelled.
fn next_lease<S>(
    source: &mut S,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Option<Lease>, CaptureError>
where
    S: FrameSource + ?Sized,
{
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        match source.acquire(timeout)? {
            Some(lease) => return Ok(Some(lease)),
            None if cancel.is_cancelled() => {}
            None => warn!("Timeout ({:?}) waiting for frame", timeout),
        }
    }
}

/// Write raw frames from `sources` to `out`, cycling through the sources.
///
/// A write failure is fatal here since the stream is the only output. Every
/// source is closed before this returns. Returns the number of frames written.
pub fn round_robin<S, W>(
    sources: &mut [S],
    opts: &CatOptions,
    out: &mut W,
    cancel: &CancelToken,
) -> Result<u64, CaptureError>
where
    S: FrameSource,
    W: Write + ?Sized,
{
    let result = pump(sources, opts, out, cancel);
    for source in sources.iter_mut() {
        source.close();
    }
    if let Ok(written) = result {
        info!("Wrote {} frames from {} sources", written, sources.len());
    }
    result
}

fn pump<S, W>(
    sources: &mut [S],
    opts: &CatOptions,
    out: &mut W,
    cancel: &CancelToken,
) -> Result<u64, CaptureError>
where
    S: FrameSource,
    W: Write + ?Sized,
{
    let each = opts.each.max(1);
    let mut written = 0u64;

    if sources.is_empty() {
        return Ok(0);
    }

    for current in (0..sources.len()).cycle() {
        let source = &mut sources[current];

        for _ in 0..each {
            for _ in 0..opts.discard {
                let Some(lease) = next_lease(source, opts.timeout, cancel)? else {
                    return Ok(written);
                };
                source.release(lease)?;
            }

            let Some(lease) = next_lease(source, opts.timeout, cancel)? else {
                return Ok(written);
            };
            let result = {
                let frame = source.frame(&lease);
                out.write_all(frame.data).and_then(|_| out.flush())
            };
            source.release(lease)?;
            result?;

            written += 1;
            debug!(source = current, written, "frame written");
            if opts.total > 0 && written >= opts.total {
                return Ok(written);
            }
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Instant;

    use super::*;
    use crate::capture::{Frame, FrameMetadata, PixelFormat};
    use crate::error::DeviceError;

    /// Single-buffer source whose frames hold `base + n` for the nth frame.
    struct Counter {
        base: u8,
        produced: u8,
        buffer: Vec<u8>,
        leased: bool,
        timeouts_first: usize,
        closed: usize,
    }

    impl Counter {
        fn new(base: u8) -> Self {
            Self {
                base,
                produced: 0,
                buffer: vec![0; 1],
                leased: false,
                timeouts_first: 0,
                closed: 0,
            }
        }
    }

    impl FrameSource for Counter {
        fn acquire(&mut self, _timeout: Duration) -> Result<Option<Lease>, DeviceError> {
            if self.timeouts_first > 0 {
                self.timeouts_first -= 1;
                return Ok(None);
            }
            assert!(!self.leased);
            self.leased = true;
            self.buffer[0] = self.base + self.produced;
            self.produced += 1;
            Ok(Some(Lease::new(FrameMetadata {
                index: 0,
                sequence: u32::from(self.produced),
                width: 1,
                height: 1,
                format: PixelFormat::Yuyv,
                bytes_used: 1,
                timestamp: Instant::now(),
            })))
        }

        fn frame(&mut self, lease: &Lease) -> Frame<'_> {
            Frame {
                data: &mut self.buffer,
                meta: lease.meta().clone(),
            }
        }

        fn release(&mut self, _lease: Lease) -> Result<(), DeviceError> {
            assert!(self.leased);
            self.leased = false;
            Ok(())
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    struct Full;

    impl Write for Full {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(28))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn opts(total: u64, each: u64, discard: u64) -> CatOptions {
        CatOptions {
            total,
            each,
            discard,
            timeout: Duration::from_millis(1),
        }
    }

    #[test]
    fn cycles_sources_with_discard() {
        let mut sources = vec![Counter::new(0), Counter::new(100)];
        let mut out = Vec::new();

        let written = round_robin(&mut sources, &opts(5, 2, 1), &mut out, &CancelToken::new())
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(out, vec![1, 3, 101, 103, 5]);
        assert!(sources.iter().all(|s| s.closed == 1 && !s.leased));
    }

    #[test]
    fn single_source_without_discard() {
        let mut sources = vec![Counter::new(10)];
        sources[0].timeouts_first = 2;
        let mut out = Vec::new();

        round_robin(&mut sources, &opts(3, 1, 0), &mut out, &CancelToken::new()).unwrap();
        assert_eq!(out, vec![10, 11, 12]);
    }

    #[test]
    fn write_failure_is_fatal_and_closes_sources() {
        let mut sources = vec![Counter::new(0), Counter::new(50)];

        let err = round_robin(&mut sources, &opts(0, 1, 0), &mut Full, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, CaptureError::Io(_)));
        assert!(sources.iter().all(|s| s.closed == 1 && !s.leased));
    }

    #[test]
    fn cancellation_ends_unbounded_dump() {
        let mut sources = vec![Counter::new(0)];
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut out = Vec::new();

        let written = round_robin(&mut sources, &opts(0, 1, 0), &mut out, &cancel).unwrap();
        assert_eq!(written, 0);
        assert!(out.is_empty());
        assert_eq!(sources[0].closed, 1);
    }
}
