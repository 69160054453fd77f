//! Per-frame processing: rate limit, subsample, overlay, encode, write

use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::capture::{Flow, Frame, FrameHandler};
use crate::error::{CaptureError, ConfigError, PipelineError};
use crate::imaging::font::GLYPH_HEIGHT;
use crate::imaging::put_str;
use crate::pipeline::encode::JpegFrameEncoder;
use crate::pipeline::rate::RateLimiter;
use crate::pipeline::sinks::{sequence_path, SinkKind, SinkReport};
use crate::storage;
use crate::{CaptureConfig, Metrics};

/// strftime pattern of the timestamp overlay
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

fn local_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Counters owned by one session
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Frames seen by the handler, before subsampling
    pub raw_frames: u64,
    /// Frames discarded by subsampling
    pub subsampled: u64,
    /// Frames that reached the sinks. Also the next sequence index.
    pub emitted: u64,
    /// When the rate limiter last let a frame through
    pub last_accepted: Instant,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            raw_frames: 0,
            subsampled: 0,
            emitted: 0,
            last_accepted: Instant::now(),
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

/// The capture session's frame handler
pub struct FrameProcessor {
    config: CaptureConfig,
    state: PipelineState,
    limiter: RateLimiter,
    encoder: Option<JpegFrameEncoder>,
    raw_out: Option<Box<dyn Write>>,
    report: SinkReport,
    clock: fn() -> String,
}

impl FrameProcessor {
    /// Raw frames go to the process stdout when `config.stdout` is set.
    pub fn new(config: CaptureConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let raw_out: Option<Box<dyn Write>> = if config.stdout {
            Some(Box::new(io::stdout()))
        } else {
            None
        };
        let encoder = config
            .compression_enabled()
            .then(|| JpegFrameEncoder::new(config.quality));

        Ok(Self {
            limiter: RateLimiter::new(config.rate_limit()),
            state: PipelineState::new(),
            encoder,
            raw_out,
            report: SinkReport::new(),
            clock: local_timestamp,
            config,
        })
    }

    /// Send raw frames to `out` instead of stdout.
    pub fn with_raw_output(mut self, out: Box<dyn Write>) -> Self {
        self.raw_out = Some(out);
        self
    }

    /// Replace the timestamp overlay text source.
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn report(&self) -> &SinkReport {
        &self.report
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            frames_received: self.state.raw_frames,
            frames_emitted: self.state.emitted,
            frames_subsampled: self.state.subsampled,
        }
    }

    fn process(&mut self, frame: &mut Frame<'_>) -> Result<Flow, PipelineError> {
        metrics::counter!("framecap_frames_received").increment(1);

        if self.limiter.is_enabled() {
            let waited = self.limiter.throttle(&mut self.state.last_accepted);
            trace!("rate limiter held frame for {:?}", waited);
        }

        self.state.raw_frames += 1;
        if self.state.raw_frames % self.config.subsample != 0 {
            self.state.subsampled += 1;
            metrics::counter!("framecap_frames_subsampled").increment(1);
            return Ok(Flow::Continue);
        }

        if frame.meta.format.is_yuyv() {
            self.draw_overlay(frame);
        }

        self.write_raw(&*frame.data);

        let encoded: Option<Bytes> = match self.encoder.as_mut() {
            Some(encoder) => {
                if !frame.meta.format.is_yuyv() {
                    return Err(PipelineError::Encoding(frame.meta.format));
                }
                let encode_start = Instant::now();
                let jpeg = encoder.encode_yuyv(&*frame.data, frame.meta.width, frame.meta.height)?;
                metrics::histogram!("framecap_encode_time_us")
                    .record(encode_start.elapsed().as_micros() as f64);
                Some(jpeg)
            }
            None => None,
        };
        let payload: &[u8] = encoded.as_deref().unwrap_or(&*frame.data);

        if let Some(path) = self.config.output.clone() {
            let result = storage::write_atomic_staged(&path, payload).map(drop);
            self.record(SinkKind::File, Some(&path), result);
        }

        if let Some(prefix) = self.config.sequence.as_deref() {
            let path = sequence_path(prefix, self.state.emitted);
            let result = storage::write_synced(&path, payload);
            self.record(SinkKind::Sequence, Some(&path), result);
        }

        self.state.emitted += 1;
        metrics::counter!("framecap_frames_emitted").increment(1);
        debug!(
            emitted = self.state.emitted,
            sequence = frame.meta.sequence,
            bytes = payload.len(),
            "frame emitted"
        );

        if self.config.count > 0 && self.state.emitted >= self.config.count {
            debug!("frame limit {} reached", self.config.count);
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }

    fn draw_overlay(&self, frame: &mut Frame<'_>) {
        let (width, height) = (frame.meta.width, frame.meta.height);
        let mut row = 0;

        if let Some(banner) = &self.config.banner {
            put_str(frame.data, width, height, banner, 0, row);
            row += GLYPH_HEIGHT as u32;
        }
        if self.config.timestamp {
            let now = (self.clock)();
            put_str(frame.data, width, height, &now, 0, row);
        }
    }

    fn write_raw(&mut self, data: &[u8]) {
        let Some(out) = self.raw_out.as_mut() else {
            return;
        };
        let result = out.write_all(data).and_then(|_| out.flush());
        self.record(SinkKind::Stdout, None, result);
    }

    fn record(&mut self, kind: SinkKind, target: Option<&Path>, result: io::Result<()>) {
        match result {
            Ok(()) => self.report.record_write(kind),
            Err(e) => self.report.record_failure(kind, target, &e),
        }
    }
}

impl FrameHandler for FrameProcessor {
    fn on_frame(&mut self, frame: &mut Frame<'_>) -> Result<Flow, CaptureError> {
        Ok(self.process(frame)?)
    }
}
