pub mod capture;
pub mod cli;
pub mod error;
pub mod imaging;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod tools;
pub mod utils;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use capture::{CancelToken, DeviceChannel, Frame, FrameSource, PixelFormat};
pub use error::{CaptureError, ConfigError, DeviceError, PipelineError};
pub use pipeline::{FrameProcessor, PipelineState};
pub use session::{run_capture, SessionSummary};

/// Longest output path or sequence prefix accepted
pub const MAX_PATH_LEN: usize = 235;

/// Most driver buffers a channel may map (`VIDEO_MAX_FRAME`)
pub const MAX_BUFFERS: u32 = 32;

/// Prefix for environment overrides, e.g. `FRAMECAP_CAPTURE__RATE_MS=500`
pub const ENV_PREFIX: &str = "FRAMECAP";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub path: PathBuf,
    /// Driver buffers to map. Two or more let the driver fill one while the
    /// pipeline is busy with another.
    pub buffer_count: u32,
    /// How long to wait for a frame before logging a timeout
    pub timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/video0"),
            buffer_count: 2,
            timeout_ms: 60_000,
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-frame processing options. Read-only once the session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Text printed at the top-left of YUYV frames
    pub banner: Option<String>,
    /// Print local date/time under the banner (YUYV only)
    pub timestamp: bool,
    /// Frames to output before stopping, 0 for no limit
    pub count: u64,
    /// Keep one of every `subsample` frames
    pub subsample: u64,
    /// JPEG quality 1 (smallest) to 3 (largest), 0 to write raw frames
    pub quality: u8,
    /// Minimum milliseconds between accepted frames
    pub rate_ms: u64,
    /// Also write raw frames to stdout
    pub stdout: bool,
    /// Atomically replaced output file
    pub output: Option<PathBuf>,
    /// Prefix for numbered sequence files
    pub sequence: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            banner: None,
            timestamp: false,
            count: 0,
            subsample: 1,
            quality: 0,
            rate_ms: 0,
            stdout: false,
            output: None,
            sequence: None,
        }
    }
}

impl CaptureConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_ms)
    }

    pub fn compression_enabled(&self) -> bool {
        self.quality > 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subsample == 0 {
            return Err(ConfigError::Subsample);
        }
        if self.quality > 3 {
            return Err(ConfigError::Quality(self.quality));
        }
        for path in [&self.output, &self.sequence].into_iter().flatten() {
            check_path_len(path)?;
        }
        Ok(())
    }
}

fn check_path_len(path: &Path) -> Result<(), ConfigError> {
    let len = path.as_os_str().len();
    if len > MAX_PATH_LEN {
        return Err(ConfigError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

impl Config {
    /// Layer defaults, an optional TOML file and `FRAMECAP_*` environment
    /// variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.device.buffer_count;
        if count == 0 || count > MAX_BUFFERS {
            return Err(ConfigError::BufferCount {
                count,
                max: MAX_BUFFERS,
            });
        }
        if self.device.timeout_ms == 0 {
            return Err(ConfigError::Timeout);
        }
        if self.device.path.as_os_str().is_empty() {
            return Err(ConfigError::NoDevice);
        }
        self.capture.validate()
    }
}

/// Counters reported when a session ends
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    /// Frames delivered by the device
    pub frames_received: u64,
    /// Frames that reached the sinks
    pub frames_emitted: u64,
    /// Frames discarded by subsampling
    pub frames_subsampled: u64,
}
