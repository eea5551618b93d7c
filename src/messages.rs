// Wire messages exchanged with the car's WebSocket server

use serde::{Deserialize, Serialize};

/// Named move directions understood by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    PivotLeft,
    PivotRight,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
    Calibrate,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Stop => "stop",
            Direction::PivotLeft => "pivot_left",
            Direction::PivotRight => "pivot_right",
            Direction::ForwardLeft => "forward_left",
            Direction::ForwardRight => "forward_right",
            Direction::BackwardLeft => "backward_left",
            Direction::BackwardRight => "backward_right",
            Direction::Calibrate => "calibrate",
        }
    }
}

// Command from teleop -> car
// Tagged on "cmd", e.g. {"cmd":"custom","left":500,"right":-500}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Move { direction: Direction },
    Speed { value: u8 },
    /// Differential motor speeds on the PWM scale (-1000..=1000)
    Custom { left: i32, right: i32 },
}

impl Command {
    pub fn stop() -> Self {
        Command::Move {
            direction: Direction::Stop,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            Command::Move {
                direction: Direction::Stop
            }
        )
    }
}

// Raw shape of anything the server may push; every field is optional
#[derive(Debug, Deserialize)]
struct RawServerMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    status: Option<String>,
    speed: Option<i64>,
}

/// Message from car -> teleop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting sent right after the socket opens
    Welcome { message: String },
    /// Acknowledgement of a command, echoing the firmware's base speed
    Ack { speed: Option<u8> },
    /// Valid JSON that matches neither shape
    Other,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawServerMessage = serde_json::from_str(text)?;

        if raw.kind.as_deref() == Some("welcome") {
            return Ok(ServerMessage::Welcome {
                message: raw.message.unwrap_or_default(),
            });
        }
        if raw.status.as_deref() == Some("ok") {
            let speed = raw.speed.map(|s| s.clamp(0, u8::MAX as i64) as u8);
            return Ok(ServerMessage::Ack { speed });
        }
        Ok(ServerMessage::Other)
    }
}

/// Response of GET /api/ip
#[derive(Debug, Clone, Deserialize)]
pub struct IpInfo {
    pub ip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_move_wire_format() {
        let cmd = Command::Move {
            direction: Direction::PivotLeft,
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value, json!({"cmd": "move", "direction": "pivot_left"}));
    }

    #[test]
    fn test_custom_and_speed_wire_format() {
        let custom = serde_json::to_value(Command::Custom {
            left: 1000,
            right: -300,
        })
        .unwrap();
        assert_eq!(custom, json!({"cmd": "custom", "left": 1000, "right": -300}));

        let speed = serde_json::to_value(Command::Speed { value: 150 }).unwrap();
        assert_eq!(speed, json!({"cmd": "speed", "value": 150}));
    }

    #[test]
    fn test_direction_names_match_serde() {
        let all = [
            Direction::Forward,
            Direction::Backward,
            Direction::Left,
            Direction::Right,
            Direction::Stop,
            Direction::PivotLeft,
            Direction::PivotRight,
            Direction::ForwardLeft,
            Direction::ForwardRight,
            Direction::BackwardLeft,
            Direction::BackwardRight,
            Direction::Calibrate,
        ];
        for dir in all {
            let value = serde_json::to_value(dir).unwrap();
            assert_eq!(value, json!(dir.as_str()));
        }
    }

    #[test]
    fn test_parse_welcome() {
        let msg = ServerMessage::parse(r#"{"type":"welcome","message":"hello"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Welcome {
                message: "hello".into()
            }
        );
    }

    #[test]
    fn test_parse_speed_echo() {
        let msg = ServerMessage::parse(r#"{"status":"ok","speed":200}"#).unwrap();
        assert_eq!(msg, ServerMessage::Ack { speed: Some(200) });

        // Out of range values are clamped rather than rejected
        let msg = ServerMessage::parse(r#"{"status":"ok","speed":999}"#).unwrap();
        assert_eq!(msg, ServerMessage::Ack { speed: Some(255) });
    }

    #[test]
    fn test_parse_unknown_and_malformed() {
        assert_eq!(
            ServerMessage::parse(r#"{"status":"busy"}"#).unwrap(),
            ServerMessage::Other
        );
        assert!(ServerMessage::parse("not json").is_err());
    }
}
