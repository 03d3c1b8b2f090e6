use std::path::PathBuf;
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use log::{error, info, warn};

use spacemouse_bridge::config::io::ConfigIO;
use spacemouse_bridge::{init_logging, LedSwitch, SessionConfig, SessionEvent, SpaceMouse};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LedArg {
    On,
    Off,
}

impl From<LedArg> for LedSwitch {
    fn from(arg: LedArg) -> Self {
        match arg {
            LedArg::On => LedSwitch::On,
            LedArg::Off => LedSwitch::Off,
        }
    }
}

/// Logs every event of a connected SpaceMouse.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path of the hardware-access helper, overrides the config file
    #[arg(long)]
    helper: Option<PathBuf>,

    /// Do not reconnect after the device or helper goes away
    #[arg(long)]
    no_reconnect: bool,

    /// Switch the LED once the device is connected
    #[arg(long, value_enum)]
    led: Option<LedArg>,
}

async fn load_config(args: &Args) -> SessionConfig {
    let io = match &args.config {
        Some(path) => Ok(ConfigIO::new(path.clone())),
        None => ConfigIO::from_default_location(),
    };

    let mut config = match io {
        Ok(io) => match io.read_or_default().await {
            Ok(config) => config,
            Err(err) => {
                error!("Failed to load config: {}", err);
                SessionConfig::default()
            },
        },
        Err(err) => {
            warn!("{}; using defaults", err);
            SessionConfig::default()
        },
    };

    if let Some(helper) = &args.helper {
        config.helper_path = Some(helper.clone());
    }
    if args.no_reconnect {
        config.auto_reconnect = false;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    info!(concat!("SpaceMouse monitor ", env!("CARGO_PKG_VERSION")));

    let args = Args::parse();
    let config = load_config(&args).await;

    let mouse = SpaceMouse::new(&config);
    info!("Platform: {:?}", mouse.platform_info().await?);

    let mut events = mouse.subscribe_channel().await?;
    mouse.start_monitoring().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            },
            event = events.next() => {
                let Some(event) = event else { break };

                match event {
                    SessionEvent::Connected { device_info } => {
                        info!("Connected: {} ({:04x})", device_info.name, device_info.vendor_id);
                        if let Some(led) = args.led {
                            if let Err(err) = mouse.set_led(led.into()).await {
                                warn!("Failed to switch LED: {}", err);
                            }
                        }
                    },
                    SessionEvent::Disconnected { .. } => info!("Disconnected"),
                    SessionEvent::Motion(m) => info!(
                        "x={:+.3} y={:+.3} z={:+.3} rx={:+.3} ry={:+.3} rz={:+.3}",
                        m.x, m.y, m.z, m.rx, m.ry, m.rz,
                    ),
                    SessionEvent::Button { id, action } => info!("Button {} {}", id, action),
                    SessionEvent::LedChanged { from, to, .. } => info!("LED {:?} -> {:?}", from, to),
                }
            },
        }
    }

    mouse.shutdown().await?;
    Ok(())
}
