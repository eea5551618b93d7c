use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use rc_car_teleop::config::{self, TeleopConfig};

/// Keyboard/gamepad teleop for the RC car's WebSocket controller
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Car address (same host serves HTTP and the control socket)
    #[arg(long, default_value = config::DEFAULT_HOST)]
    host: String,

    #[arg(long, default_value_t = config::WS_PORT)]
    port: u16,

    /// Use wss:// and https://
    #[arg(long)]
    secure: bool,

    /// Send/ramp tick in milliseconds
    #[arg(long, default_value_t = config::TICK_MS, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Time to ramp from stop to full speed; 0 disables smoothing
    #[arg(long, default_value_t = config::RAMP_MS)]
    ramp_ms: u64,

    /// Repeat interval for held direction keys
    #[arg(long, default_value_t = config::REPEAT_MS, value_parser = clap::value_parser!(u64).range(1..))]
    repeat_ms: u64,

    /// Delay before reconnecting after the link drops
    #[arg(long, default_value_t = config::RECONNECT_DELAY.as_millis() as u64)]
    reconnect_ms: u64,

    /// Initial base speed (0-255)
    #[arg(long, default_value_t = config::DEFAULT_SPEED)]
    speed: u8,

    /// Gamepad only; leaves the terminal in normal mode
    #[arg(long)]
    no_keyboard: bool,

    /// Keyboard only
    #[arg(long)]
    no_gamepad: bool,

    /// Drive with the left stick alone, quantized to eight directions
    #[arg(long)]
    single_stick: bool,
}

impl From<Cli> for TeleopConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            secure: cli.secure,
            tick_ms: cli.tick_ms,
            ramp_ms: cli.ramp_ms,
            repeat_ms: cli.repeat_ms,
            reconnect_delay: Duration::from_millis(cli.reconnect_ms),
            speed: cli.speed,
            keyboard: !cli.no_keyboard,
            gamepad: !cli.no_gamepad,
            single_stick: cli.single_stick,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging (set RUST_LOG=info or debug); stderr keeps stdout free for the terminal
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    // Both the socket and HTTP client link rustls; pick one crypto provider for wss://
    let _ = rustls::crypto::ring::default_provider().install_default();

    if let Err(e) = rc_car_teleop::runtime::run(cli.into()).await {
        eprintln!("Teleop error: {}", e);
        std::process::exit(1);
    }
}
