//! One capture session: open the device, run the pipeline, tear down

use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::capture::{CancelToken, CaptureLoop, DeviceChannel, FrameSource, LoopExit};
use crate::error::{CaptureError, ConfigError, PipelineError};
use crate::pipeline::{FrameProcessor, SinkReport};
use crate::{Config, Metrics};

/// What a finished session reports
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub exit: LoopExit,
    pub metrics: Metrics,
    /// Waits that ended without a frame
    pub timeouts: u64,
    pub sink_writes: u64,
    pub sink_failures: u64,
    pub elapsed: Duration,
}

/// Run a capture session against the configured device until the frame limit
/// is reached, `cancel` fires or a fatal error occurs.
#[instrument(skip_all, fields(device = %config.device.path.display()))]
pub fn run_capture(config: &Config, cancel: &CancelToken) -> Result<SessionSummary, CaptureError> {
    config.validate()?;

    let mut channel = DeviceChannel::open(&config.device.path, config.device.buffer_count)?
        .with_cancel(cancel.clone());
    let format = channel.format()?;
    if format.width == 0 || format.height == 0 {
        channel.close();
        return Err(ConfigError::Dimensions {
            width: format.width,
            height: format.height,
        }
        .into());
    }
    if config.capture.compression_enabled() && !format.format.is_yuyv() {
        channel.close();
        return Err(PipelineError::Encoding(format.format).into());
    }

    let processor = FrameProcessor::new(config.capture.clone())?;
    run_session(&mut channel, processor, config.device.timeout(), cancel)
}

/// Drive `source` through `processor` and summarize. The source is closed
/// before this returns, whatever the outcome.
pub fn run_session<S>(
    source: &mut S,
    mut processor: FrameProcessor,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<SessionSummary, CaptureError>
where
    S: FrameSource + ?Sized,
{
    let started = Instant::now();
    let mut capture = CaptureLoop::new(timeout);
    let result = capture.run(source, &mut processor, cancel);

    let report: &SinkReport = processor.report();
    report.log_summary();
    let exit = result?;

    let summary = SessionSummary {
        exit,
        metrics: processor.metrics(),
        timeouts: capture.timeouts(),
        sink_writes: report.writes(),
        sink_failures: report.failures(),
        elapsed: started.elapsed(),
    };
    info!(
        "Session {:?} after {:.1?}: {} frames received, {} emitted, {} subsampled",
        summary.exit,
        summary.elapsed,
        summary.metrics.frames_received,
        summary.metrics.frames_emitted,
        summary.metrics.frames_subsampled,
    );
    Ok(summary)
}
