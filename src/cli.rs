//! Command line surface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::tools::{CatOptions, ConvertOptions, Direction};
use crate::Config;

#[derive(Debug, Parser)]
#[command(name = "framecap")]
#[command(about = "Capture frames from V4L2 devices")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file, overridden by FRAMECAP_* variables and flags
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Capture frames from one device into files and/or stdout
    Capture(CaptureArgs),

    /// Write raw frames from one or more devices to stdout, round-robin
    Cat(CatArgs),

    /// Convert raw YUYV frames on stdin to JPEG
    Convert(ConvertArgs),

    /// Convert one YUYV frame on stdin to ImgBlk layout, or back
    Imgblk(ImgblkArgs),

    /// Print a histogram of byte values read from stdin
    Histogram,

    /// List capture devices
    List,
}

#[derive(Debug, Default, Args)]
pub struct CaptureArgs {
    /// Device node, e.g. /dev/video0
    pub device: Option<PathBuf>,

    /// Print a banner at the top-left of each frame (YUYV only)
    #[arg(short = 'b', long)]
    pub banner: Option<String>,

    /// Print the date and time under the banner (YUYV only)
    #[arg(short = 't', long)]
    pub timestamp: bool,

    /// Stop after this many frames, 0 for no limit
    #[arg(short = 'c', long)]
    pub count: Option<u64>,

    /// Keep one of every N frames
    #[arg(short = 'n', long, value_name = "N")]
    pub subsample: Option<u64>,

    /// JPEG quality 1-3, 0 to keep raw frames
    #[arg(short = 'j', long)]
    pub quality: Option<u8>,

    /// Minimum milliseconds between frames
    #[arg(short = 'r', long = "rate", value_name = "MS")]
    pub rate_ms: Option<u64>,

    /// Also write raw frames to stdout
    #[arg(short = 'o', long)]
    pub stdout: bool,

    /// Atomically replace this file with every frame
    #[arg(short = 'f', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write numbered files PREFIX-000000, PREFIX-000001, ...
    #[arg(short = 's', long, value_name = "PREFIX")]
    pub sequence: Option<PathBuf>,

    #[command(flatten)]
    pub device_opts: DeviceArgs,
}

#[derive(Debug, Default, Clone, Copy, Args)]
pub struct DeviceArgs {
    /// Driver buffers to map
    #[arg(long)]
    pub buffers: Option<u32>,

    /// Milliseconds to wait for a frame before warning
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct CatArgs {
    /// Device nodes to read from in turn
    #[arg(required = true)]
    pub devices: Vec<PathBuf>,

    /// Total frames to output, 0 for no limit
    #[arg(short = 't', long, default_value_t = 0)]
    pub total: u64,

    /// Frames to take from each device before moving on
    #[arg(short = 'e', long, default_value_t = 1,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub each: u64,

    /// Frames to discard before each captured frame
    #[arg(short = 'd', long, default_value_t = 0)]
    pub discard: u64,

    #[command(flatten)]
    pub device_opts: DeviceArgs,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[arg(long)]
    pub width: u32,

    #[arg(long)]
    pub height: u32,

    /// JPEG quality 1-3
    #[arg(short = 'j', long, default_value_t = 2)]
    pub quality: u8,

    /// Atomically replace this file with every converted frame
    #[arg(short = 'f', long, value_name = "FILE")]
    pub output: PathBuf,

    /// Also write each frame in ImgBlk layout; the JPEG then shows the
    /// quantized frame
    #[arg(short = 'i', long, value_name = "FILE")]
    pub imgblk: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImgblkArgs {
    /// Width in pixels, a multiple of 160
    #[arg(short = 'w', long, default_value_t = 1280)]
    pub width: u32,

    /// Height in pixels, a multiple of 80
    #[arg(short = 'H', long, default_value_t = 720)]
    pub height: u32,

    /// Turn an ImgBlk frame back into YUYV
    #[arg(short = 'r', long)]
    pub reverse: bool,

    /// Read the frame from this file instead of stdin
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// File to write atomically
    pub output: PathBuf,
}

impl DeviceArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(buffers) = self.buffers {
            config.device.buffer_count = buffers;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.device.timeout_ms = timeout_ms;
        }
    }
}

impl CaptureArgs {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        self.device_opts.apply(config);
        if let Some(device) = &self.device {
            config.device.path = device.clone();
        }

        let capture = &mut config.capture;
        if let Some(banner) = &self.banner {
            capture.banner = Some(banner.clone());
        }
        capture.timestamp |= self.timestamp;
        capture.stdout |= self.stdout;
        if let Some(count) = self.count {
            capture.count = count;
        }
        if let Some(subsample) = self.subsample {
            capture.subsample = subsample;
        }
        if let Some(quality) = self.quality {
            capture.quality = quality;
        }
        if let Some(rate_ms) = self.rate_ms {
            capture.rate_ms = rate_ms;
        }
        if let Some(output) = &self.output {
            capture.output = Some(output.clone());
        }
        if let Some(sequence) = &self.sequence {
            capture.sequence = Some(sequence.clone());
        }
    }
}

impl CatArgs {
    pub fn options(&self, config: &Config) -> CatOptions {
        CatOptions {
            total: self.total,
            each: self.each,
            discard: self.discard,
            timeout: config.device.timeout(),
        }
    }
}

impl ConvertArgs {
    pub fn options(&self) -> ConvertOptions {
        ConvertOptions {
            width: self.width,
            height: self.height,
            quality: self.quality,
            output: self.output.clone(),
            imgblk: self.imgblk.clone(),
        }
    }
}

impl ImgblkArgs {
    pub fn direction(&self) -> Direction {
        if self.reverse {
            Direction::ToYuyv
        } else {
            Direction::ToImgBlk
        }
    }
}
