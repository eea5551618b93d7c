// Timing, endpoint and speed defaults
use std::time::Duration;

// Fixed-rate send/ramp tick (20 Hz)
pub const TICK_MS: u64 = 50;

// Time for the ramp to go from 0 to full speed
pub const RAMP_MS: u64 = 2000;

// Repeat interval for held discrete commands
pub const REPEAT_MS: u64 = 200;

// Fixed delay between a dropped link and the next connect attempt
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

// Controller endpoint
pub const DEFAULT_HOST: &str = "192.168.4.1"; // access point address of the car
pub const WS_PORT: u16 = 81;
pub const IP_PATH: &str = "/api/ip";

// Base speed sent with {cmd:"speed"} (firmware clamps to 0..=255)
pub const DEFAULT_SPEED: u8 = 150;
pub const SPEED_STEP: u8 = 25;

// Emergency stop is sent this many times, spaced apart
pub const STOP_BURST_COUNT: u8 = 3;
pub const STOP_BURST_SPACING_MS: u64 = 50;

// Terminals without key release events: treat a key as released after this
pub const KEY_HOLD_TIMEOUT_MS: u64 = 600;

/// Runtime configuration, filled from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct TeleopConfig {
    pub host: String,
    pub port: u16,
    /// Use wss:// and https:// instead of ws:// and http://
    pub secure: bool,
    pub tick_ms: u64,
    pub ramp_ms: u64,
    pub repeat_ms: u64,
    pub reconnect_delay: Duration,
    pub speed: u8,
    pub keyboard: bool,
    pub gamepad: bool,
    /// Drive from the gamepad's left stick alone (eight-way mapping)
    pub single_stick: bool,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: WS_PORT,
            secure: false,
            tick_ms: TICK_MS,
            ramp_ms: RAMP_MS,
            repeat_ms: REPEAT_MS,
            reconnect_delay: RECONNECT_DELAY,
            speed: DEFAULT_SPEED,
            keyboard: true,
            gamepad: true,
            single_stick: false,
        }
    }
}

impl TeleopConfig {
    /// WebSocket endpoint of the car's control server
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }

    /// Address lookup endpoint served by the car's HTTP server (default port)
    pub fn ip_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.host, IP_PATH)
    }
}
