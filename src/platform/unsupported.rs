use async_trait::async_trait;

use crate::error::SessionError;
use crate::platform::adapter::{AdapterEvent, AdapterEventSender, PlatformAdapter, PlatformInfo};
use crate::protocol::types::LedSwitch;
use crate::session::types::LedState;

/**
 * Selected on platforms that have neither a helper nor a direct USB implementation yet.
 * Every attempt to monitor fails with `PlatformUnsupported`.
 */
pub struct UnsupportedAdapter {
    platform: String,
}

impl UnsupportedAdapter {
    pub fn new(platform: &str) -> Self {
        UnsupportedAdapter { platform: platform.to_string() }
    }
}

#[async_trait]
impl PlatformAdapter for UnsupportedAdapter {
    async fn start_monitoring(&mut self, _events: AdapterEventSender) -> Result<(), SessionError> {
        Err(SessionError::PlatformUnsupported { platform: self.platform.clone() })
    }

    async fn stop_monitoring(&mut self) {}

    async fn send_led_command(&mut self, _state: LedSwitch) -> Result<(), SessionError> {
        Err(SessionError::DeviceNotConnected)
    }

    fn observe(&mut self, _event: &AdapterEvent) {}

    fn led_state(&self) -> LedState {
        LedState::Unknown
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn is_monitoring(&self) -> bool {
        false
    }

    fn describe(&self) -> PlatformInfo {
        PlatformInfo {
            platform: self.platform.clone(),
            method: "unsupported".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
