use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::session::constants::{RECONNECT_DELAY, RETRY_DELAY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub helper_path: Option<PathBuf>,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
    pub retry_delay_ms: u64,
    // hardware reports beyond ±350 are passed through unless this is set
    pub clamp_motion: bool,
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            helper_path: None,
            auto_reconnect: true,
            reconnect_delay_ms: RECONNECT_DELAY,
            retry_delay_ms: RETRY_DELAY,
            clamp_motion: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"autoReconnect": false}"#).unwrap();

        assert!(!config.auto_reconnect);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(2000));
        assert_eq!(config.retry_delay(), Duration::from_millis(5000));
        assert_eq!(config.helper_path, None);
        assert!(!config.clamp_motion);
    }
}
