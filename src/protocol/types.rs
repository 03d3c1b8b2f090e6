use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
}

impl Axis {
    pub const ALL: [Axis; 6] = [Axis::X, Axis::Y, Axis::Z, Axis::Rx, Axis::Ry, Axis::Rz];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::Rx => "rx",
            Axis::Ry => "ry",
            Axis::Rz => "rz",
        }
    }

    pub fn from_name(name: &str) -> Option<Axis> {
        Axis::ALL.into_iter().find(|axis| axis.as_str() == name)
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    Pressed,
    Released,
}

impl std::fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            ButtonAction::Pressed => "pressed",
            ButtonAction::Released => "released",
        };

        write!(f, "{}", result)
    }
}

/**
 * Requested or acknowledged LED level. The "unknown" case only exists on the session side.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedSwitch {
    On,
    Off,
}

impl std::fmt::Display for LedSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            LedSwitch::On => "on",
            LedSwitch::Off => "off",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperStatus {
    Ready,
    DeviceConnected,
    DeviceDisconnected,
}

/**
 * One decoded line written by the hardware-access helper.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperMessage {
    Status(HelperStatus),
    Motion { axis: Axis, raw: i32 },
    Button { id: u32, action: ButtonAction },
    LedAck { state: LedSwitch, method: i32 },
}

/**
 * Commands the host writes to the helper's stdin.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Led(LedSwitch),
}
