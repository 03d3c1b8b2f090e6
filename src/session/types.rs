use std::time::SystemTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::platform::PlatformInfo;
use crate::protocol::types::{Axis, ButtonAction, LedSwitch};
use crate::session::constants::{DEVICE_NAME, RAW_AXIS_RANGE, SPACEMOUSE_VENDOR_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedState {
    On,
    Off,
    Unknown,
}

impl From<LedSwitch> for LedState {
    fn from(switch: LedSwitch) -> Self {
        match switch {
            LedSwitch::On => LedState::On,
            LedSwitch::Off => LedState::Off,
        }
    }
}

/**
 * Latest known pose of the puck, every axis in [-1, 1] for in-range hardware reports.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl MotionSample {
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::Rx => self.rx,
            Axis::Ry => self.ry,
            Axis::Rz => self.rz,
        }
    }

    pub fn set(&mut self, axis: Axis, value: f64) {
        let field = match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
            Axis::Rx => &mut self.rx,
            Axis::Ry => &mut self.ry,
            Axis::Rz => &mut self.rz,
        };

        *field = value;
    }
}

// keyed by the HID usage number the helper reports, in order of first observation
pub type ButtonState = IndexMap<u32, ButtonAction>;

pub fn normalize(raw: i32) -> f64 {
    f64::from(raw) / RAW_AXIS_RANGE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor_id: u16,
    pub platform: PlatformInfo,
}

impl DeviceInfo {
    pub fn spacemouse(platform: PlatformInfo) -> Self {
        DeviceInfo {
            name: DEVICE_NAME.to_string(),
            vendor_id: SPACEMOUSE_VENDOR_ID,
            platform,
        }
    }
}

/**
 * Events delivered to every subscriber, in the order the session processed them.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected { device_info: DeviceInfo },
    Disconnected { device_info: DeviceInfo },
    // always carries all six axes, not only the one that changed
    Motion(MotionSample),
    Button { id: u32, action: ButtonAction },
    LedChanged { from: LedState, to: LedState, timestamp: SystemTime },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_stays_in_range_and_keeps_sign() {
        assert_eq!(normalize(0), 0.0);
        assert_eq!(normalize(350), 1.0);
        assert_eq!(normalize(-350), -1.0);
        assert_eq!(normalize(175), 0.5);

        for raw in -350..=350 {
            let value = normalize(raw);
            assert!((-1.0..=1.0).contains(&value), "{} -> {}", raw, value);
            if raw != 0 {
                assert_eq!(value.signum(), f64::from(raw).signum());
            }
        }
    }

    #[test]
    fn motion_sample_updates_one_axis() {
        let mut sample = MotionSample::default();
        sample.set(Axis::Ry, -0.25);

        assert_eq!(sample.get(Axis::Ry), -0.25);
        assert_eq!(sample, MotionSample { ry: -0.25, ..MotionSample::default() });
    }
}
