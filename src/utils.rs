use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use v4l::{capability::Flags, video::Capture, Device};

use crate::capture::PixelFormat;

/// Highest `/dev/videoN` index probed
pub const MAX_PROBE_INDEX: u32 = 9;

// Detected capture device info
#[derive(Debug, Clone)]
pub struct FoundDevice {
    pub path: PathBuf,
    pub card: String,
    pub driver: String,
    pub streaming: bool,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl fmt::Display for FoundDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{} ({})\t{}x{} {}{}",
            self.path.display(),
            self.card,
            self.driver,
            self.width,
            self.height,
            self.format,
            if self.streaming { "" } else { "\tno streaming" },
        )
    }
}

/// Query one node. `None` if it cannot be opened or is not a capture device.
pub fn probe_device(path: &Path) -> Option<FoundDevice> {
    let dev = match Device::with_path(path) {
        Ok(dev) => dev,
        Err(e) => {
            debug!("Skipping {}: {}", path.display(), e);
            return None;
        }
    };
    let caps = dev.query_caps().ok()?;
    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        debug!("Skipping {}: not a capture device", path.display());
        return None;
    }
    let fmt = dev.format().ok()?;

    Some(FoundDevice {
        path: path.to_path_buf(),
        card: caps.card,
        driver: caps.driver,
        streaming: caps.capabilities.contains(Flags::STREAMING),
        width: fmt.width,
        height: fmt.height,
        format: PixelFormat::from(fmt.fourcc),
    })
}

/// Probe `/dev/video0` through `/dev/video9` for capture devices
pub fn probe_devices() -> Vec<FoundDevice> {
    info!("Probing capture devices...");

    (0..=MAX_PROBE_INDEX)
        .map(|i| PathBuf::from(format!("/dev/video{}", i)))
        .filter(|path| path.exists())
        .filter_map(|path| probe_device(&path))
        .inspect(|found| info!("Found {} - {}", found.path.display(), found.card))
        .collect()
}

/// Print one line per device.
pub fn write_device_list<W>(devices: &[FoundDevice], out: &mut W) -> io::Result<()>
where
    W: Write + ?Sized,
{
    for device in devices {
        writeln!(out, "{}", device)?;
    }
    out.flush()
}
