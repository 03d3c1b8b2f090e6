//! Text protocol spoken with the hardware-access helper.
//!
//! Every line is `TAG:body`. Decoding is strict: unknown tags, unknown keys, keys out of
//! order and values that do not parse all yield a [`ProtocolError`] carrying the raw line.

use crate::error::ProtocolError;
use crate::protocol::types::{Axis, ButtonAction, HelperMessage, HelperStatus, HostCommand, LedSwitch};

pub const LED_ON_COMMAND: &str = "LED:on";
pub const LED_OFF_COMMAND: &str = "LED:off";

pub fn decode_line(line: &str) -> Result<HelperMessage, ProtocolError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);

    decode_trimmed(trimmed).ok_or_else(|| ProtocolError { raw_line: line.to_string() })
}

fn decode_trimmed(line: &str) -> Option<HelperMessage> {
    let (tag, body) = line.split_once(':')?;

    match tag {
        "STATUS" => decode_status(body),
        "MOTION" => decode_motion(body),
        "BUTTON" => decode_button(body),
        "LED" => decode_led_ack(body),
        _ => None,
    }
}

fn decode_status(body: &str) -> Option<HelperMessage> {
    let status = match body {
        "ready" => HelperStatus::Ready,
        "device_connected" => HelperStatus::DeviceConnected,
        "device_disconnected" => HelperStatus::DeviceDisconnected,
        _ => return None,
    };

    Some(HelperMessage::Status(status))
}

fn decode_motion(body: &str) -> Option<HelperMessage> {
    let (name, value) = body.split_once('=')?;
    let axis = Axis::from_name(name)?;
    let raw = value.parse::<i32>().ok()?;

    Some(HelperMessage::Motion { axis, raw })
}

fn decode_button(body: &str) -> Option<HelperMessage> {
    let [id, state] = fields(body, ["id", "state"])?;

    let id = id.parse::<u32>().ok()?;
    let action = match state {
        "pressed" => ButtonAction::Pressed,
        "released" => ButtonAction::Released,
        _ => return None,
    };

    Some(HelperMessage::Button { id, action })
}

fn decode_led_ack(body: &str) -> Option<HelperMessage> {
    let [state, method] = fields(body, ["state", "method"])?;

    let state = match state {
        "on" => LedSwitch::On,
        "off" => LedSwitch::Off,
        _ => return None,
    };
    let method = method.parse::<i32>().ok()?;

    Some(HelperMessage::LedAck { state, method })
}

// splits "k1=v1,k2=v2" and checks that the keys are exactly `keys`, in order
fn fields<'a, const N: usize>(body: &'a str, keys: [&str; N]) -> Option<[&'a str; N]> {
    let mut values = [""; N];
    let mut pairs = body.split(',');

    for (slot, key) in values.iter_mut().zip(keys) {
        let (name, value) = pairs.next()?.split_once('=')?;
        if name != key {
            return None;
        }
        *slot = value;
    }

    if pairs.next().is_some() {
        return None;
    }

    Some(values)
}

pub fn encode_command(command: HostCommand) -> &'static str {
    match command {
        HostCommand::Led(LedSwitch::On) => LED_ON_COMMAND,
        HostCommand::Led(LedSwitch::Off) => LED_OFF_COMMAND,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_status_lines() {
        assert_eq!(decode_line("STATUS:ready").unwrap(), HelperMessage::Status(HelperStatus::Ready));
        assert_eq!(
            decode_line("STATUS:device_connected").unwrap(),
            HelperMessage::Status(HelperStatus::DeviceConnected),
        );
        assert_eq!(
            decode_line("STATUS:device_disconnected\r").unwrap(),
            HelperMessage::Status(HelperStatus::DeviceDisconnected),
        );
    }

    #[test]
    fn decodes_every_motion_axis() {
        for axis in Axis::ALL {
            let line = format!("MOTION:{}=-350", axis);
            assert_eq!(decode_line(&line).unwrap(), HelperMessage::Motion { axis, raw: -350 });
        }
        assert_eq!(
            decode_line("MOTION:rz=+12").unwrap(),
            HelperMessage::Motion { axis: Axis::Rz, raw: 12 },
        );
    }

    #[test]
    fn decodes_buttons_and_led_acks() {
        assert_eq!(
            decode_line("BUTTON:id=1,state=pressed").unwrap(),
            HelperMessage::Button { id: 1, action: ButtonAction::Pressed },
        );
        assert_eq!(
            decode_line("BUTTON:id=14,state=released").unwrap(),
            HelperMessage::Button { id: 14, action: ButtonAction::Released },
        );
        assert_eq!(
            decode_line("LED:state=on,method=2").unwrap(),
            HelperMessage::LedAck { state: LedSwitch::On, method: 2 },
        );
    }

    #[test]
    fn malformed_lines_keep_the_raw_text() {
        let bad = [
            "garbage",
            "",
            "STATUS:",
            "STATUS:sleeping",
            "MOTION:w=1",
            "MOTION:x=",
            "MOTION:x=1.5",
            "MOTION:x=1,y=2",
            "BUTTON:id=-1,state=pressed",
            "BUTTON:state=pressed,id=1",
            "BUTTON:id=1,state=held",
            "BUTTON:id=1,state=pressed,extra=1",
            "LED:on",
            "LED:state=dim,method=1",
            "motion:x=1",
        ];

        for line in bad {
            let err = decode_line(line).unwrap_err();
            assert_eq!(err.raw_line, line);
        }
    }

    #[test]
    fn encodes_led_commands() {
        assert_eq!(encode_command(HostCommand::Led(LedSwitch::On)), "LED:on");
        assert_eq!(encode_command(HostCommand::Led(LedSwitch::Off)), "LED:off");
    }
}
