//! framecap: V4L2 frame capture tools

use std::io;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framecap::cli::{Cli, Command};
use framecap::imaging::BlockLayout;
use framecap::tools::{self, histogram, imgblk};
use framecap::{session, utils, CancelToken, Config, DeviceChannel};

/// Token fired by Ctrl-C. Only the device-reading commands install it; the
/// others keep the default signal behaviour.
fn cancel_on_ctrlc() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;
    Ok(cancel)
}

fn main() -> Result<()> {
    // Initialize error handling and logging. stdout is reserved for frame data.
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("framecap=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Capture(args) => {
            args.apply(&mut config);
            let cancel = cancel_on_ctrlc()?;
            let summary = session::run_capture(&config, &cancel)?;
            if summary.sink_failures > 0 {
                warn!("{} sink writes failed", summary.sink_failures);
            }
        }
        Command::Cat(args) => {
            args.device_opts.apply(&mut config);
            config.validate()?;

            let cancel = cancel_on_ctrlc()?;
            let mut channels = args
                .devices
                .iter()
                .map(|path| {
                    DeviceChannel::open(path, config.device.buffer_count)
                        .map(|channel| channel.with_cancel(cancel.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            tools::round_robin(
                &mut channels,
                &args.options(&config),
                &mut io::stdout().lock(),
                &cancel,
            )?;
        }
        Command::Convert(args) => {
            tools::convert_stream(&mut io::stdin().lock(), &args.options())?;
        }
        Command::Imgblk(args) => {
            let layout = BlockLayout::new(args.width, args.height)?;
            let frame =
                imgblk::read_whole_frame(&mut io::stdin().lock(), args.input.as_deref(), &layout)?;
            imgblk::convert_frame(&frame, &layout, args.direction(), &args.output)?;
        }
        Command::Histogram => {
            histogram::histogram(&mut io::stdin().lock(), &mut io::stdout().lock())?;
        }
        Command::List => {
            let devices = utils::probe_devices();
            if devices.is_empty() {
                return Err(eyre!("No capture devices found"));
            }
            utils::write_device_list(&devices, &mut io::stdout().lock())?;
        }
    }

    info!("framecap done");
    Ok(())
}
