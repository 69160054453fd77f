//! Acquire / dispatch / release loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::capture::frame::Frame;
use crate::capture::source::FrameSource;
use crate::error::CaptureError;

/// What the frame handler wants the loop to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Release the buffer and wait for the next frame
    Continue,
    /// Release the buffer and end the session successfully
    Stop,
}

/// Per-frame callback run by [`CaptureLoop`]
pub trait FrameHandler {
    fn on_frame(&mut self, frame: &mut Frame<'_>) -> Result<Flow, CaptureError>;
}

impl<F> FrameHandler for F
where
    F: FnMut(&mut Frame<'_>) -> Result<Flow, CaptureError>,
{
    fn on_frame(&mut self, frame: &mut Frame<'_>) -> Result<Flow, CaptureError> {
        self(frame)
    }
}

/// Cooperative cancellation flag, checked once per loop iteration
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Waiting,
    Dispatching,
    Terminated,
    Failed,
}

/// How a loop that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The handler asked to stop
    Stopped,
    /// The cancel token fired between frames
    Cancelled,
}

/// Drives one [`FrameSource`] through the lease protocol
pub struct CaptureLoop {
    timeout: Duration,
    state: LoopState,
    timeouts: u64,
}

impl CaptureLoop {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: LoopState::Idle,
            timeouts: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of waits that ended without a frame.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Run until the handler stops, an error occurs or `cancel` fires. The
    /// source is closed exactly once before this returns.
    pub fn run<S, H>(
        &mut self,
        source: &mut S,
        handler: &mut H,
        cancel: &CancelToken,
    ) -> Result<LoopExit, CaptureError>
    where
        S: FrameSource + ?Sized,
        H: FrameHandler + ?Sized,
    {
        let result = self.pump(source, handler, cancel);
        self.state = match result {
            Ok(_) => LoopState::Terminated,
            Err(ref e) => {
                error!("Capture loop failed: {}", e);
                LoopState::Failed
            }
        };
        source.close();
        result
    }

    fn pump<S, H>(
        &mut self,
        source: &mut S,
        handler: &mut H,
        cancel: &CancelToken,
    ) -> Result<LoopExit, CaptureError>
    where
        S: FrameSource + ?Sized,
        H: FrameHandler + ?Sized,
    {
        loop {
            if cancel.is_cancelled() {
                debug!("capture cancelled");
                return Ok(LoopExit::Cancelled);
            }

            self.state = LoopState::Waiting;
            let Some(lease) = source.acquire(self.timeout)? else {
                if cancel.is_cancelled() {
                    continue;
                }
                self.timeouts += 1;
                warn!("Timeout ({:?}) waiting for frame", self.timeout);
                continue;
            };

            self.state = LoopState::Dispatching;
            let flow = {
                let mut frame = source.frame(&lease);
                handler.on_frame(&mut frame)?
            };

            source.release(lease)?;
            if flow == Flow::Stop {
                return Ok(LoopExit::Stopped);
            }
        }
    }
}
