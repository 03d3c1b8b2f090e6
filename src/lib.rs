use std::env;
use std::str::FromStr;

pub mod bridge;
pub mod config;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod session;

pub use config::types::SessionConfig;
pub use error::SessionError;
pub use platform::PlatformInfo;
pub use protocol::types::{Axis, ButtonAction, LedSwitch};
pub use session::{ButtonState, ConnectionState, DeviceInfo, LedState, MotionSample, SessionEvent, SpaceMouse};

pub fn init_logging() -> Result<(), fern::InitError> {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| log::LevelFilter::from_str(&level).ok())
        .unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(fern::log_file(log_file)?);
    }

    dispatch.apply()?;
    Ok(())
}
