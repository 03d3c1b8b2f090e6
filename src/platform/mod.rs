use std::env::current_exe;
use std::path::PathBuf;
use log::{info, warn};

use crate::config::types::SessionConfig;

pub mod adapter;
pub mod bridge_adapter;
pub mod unsupported;

pub use adapter::{AdapterEvent, AdapterEventSender, PlatformAdapter, PlatformInfo};
pub use bridge_adapter::BridgeAdapter;
pub use unsupported::UnsupportedAdapter;

/**
 * File name of the hardware-access helper when it is installed next to the executable.
 */
pub const HELPER_EXECUTABLE_NAME: &str = "spacemouse-hid-reader";

// F:\app\monitor.exe => F:\app\spacemouse-hid-reader
fn bundled_helper_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(path) => path.parent().map(|dir| dir.join(HELPER_EXECUTABLE_NAME)),
        Err(err) => {
            warn!("Failed to get current exe path: {:?}", err);
            None
        },
    }
}

/**
 * Picks the adapter for this machine. This is the only place that looks at the operating system;
 * an explicitly configured helper is used on any platform since it speaks the same protocol.
 */
pub fn select_adapter(config: &SessionConfig) -> Box<dyn PlatformAdapter> {
    if let Some(path) = &config.helper_path {
        info!("Using configured helper {}", path.to_string_lossy());
        return Box::new(BridgeAdapter::new(path.clone()));
    }

    if cfg!(target_os = "macos") {
        if let Some(path) = bundled_helper_path() {
            info!("Using bundled helper {}", path.to_string_lossy());
            return Box::new(BridgeAdapter::new(path));
        }
    }

    warn!("No SpaceMouse access method available on {}", std::env::consts::OS);
    Box::new(UnsupportedAdapter::new(std::env::consts::OS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_helper_wins_on_every_platform() {
        let config = SessionConfig {
            helper_path: Some(PathBuf::from("/opt/spacemouse/helper")),
            ..SessionConfig::default()
        };

        let adapter = select_adapter(&config);
        assert_eq!(adapter.describe().method, "helper_bridge");
        assert!(!adapter.is_monitoring());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn falls_back_to_unsupported_without_helper() {
        let adapter = select_adapter(&SessionConfig::default());
        assert_eq!(adapter.describe().method, "unsupported");
        assert_eq!(adapter.describe().platform, std::env::consts::OS);
    }
}
