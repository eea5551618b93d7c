// Fixed-rate teleop loop
// One task owns the controller and multiplexes: the send tick, keyboard and
// gamepad input, inbound frames, and connect completion. Handlers never await.

use std::future::{pending, Future};
use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::TeleopConfig;
use crate::controller::TeleopController;
use crate::input::{gamepad, KeyAction, KeyboardInput, TerminalGuard};
use crate::ip::fetch_device_ip;
use crate::transport::{self, TransportError, WsLink, WsReader, WsStream};

type ConnectTask = JoinHandle<Result<WsStream, TransportError>>;

// Time given to the writer task to flush the final stop
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

type RunResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Run until Esc or Ctrl-C
pub async fn run(config: TeleopConfig) -> RunResult {
    run_until(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            pending::<()>().await;
        }
    })
    .await
}

/// Run until Esc or until `shutdown` completes
pub async fn run_until(config: TeleopConfig, shutdown: impl Future<Output = ()>) -> RunResult {
    tokio::pin!(shutdown);
    let http = reqwest::Client::new();
    let device_ip = fetch_device_ip(&http, &config.ip_url()).await;
    info!("Car address: {}", device_ip);

    let clock = MonotonicClock::new();
    let mut controller = TeleopController::new(&config);
    let mut link = WsLink::new();
    let mut reader: Option<WsReader> = None;
    let mut connecting: Option<ConnectTask> = None;
    let url = config.ws_url();

    let (input_tx, mut input_rx) = mpsc::channel(64);
    if config.gamepad {
        gamepad::spawn(input_tx.clone(), config.single_stick);
    }

    // Keyboard is optional: without a terminal we still run on the gamepad
    let terminal = if config.keyboard {
        match TerminalGuard::enter() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Keyboard input unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };
    let mut keyboard = KeyboardInput::new(terminal.as_ref().is_some_and(|t| t.reports_release()));
    let mut keys = terminal.as_ref().map(|_| EventStream::new());

    let mut tick = interval(Duration::from_millis(config.tick_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Teleop started: {}ms tick, {}ms ramp, endpoint {}",
        config.tick_ms, config.ramp_ms, url
    );
    info!("Controls: WASD/arrows=move, Q/E=pivot, Z/C/X/V=diagonals, Space=stop");
    info!("          +/-=speed, K=calibrate, T=motor test, Backspace=emergency stop, Esc=quit");

    let mut quit = false;
    while !quit {
        if connecting.is_none() && controller.poll_reconnect(clock.now_ms()) {
            let url = url.clone();
            connecting = Some(tokio::spawn(async move { transport::connect(&url).await }));
        }

        tokio::select! {
            _ = tick.tick() => {
                let now = clock.now_ms();
                if let Some(event) = keyboard.poll(now) {
                    controller.handle_input(event, now, &mut link);
                }
                controller.on_tick(now, &mut link);
            }

            Some(event) = input_rx.recv() => {
                controller.handle_input(event, clock.now_ms(), &mut link);
            }

            key = next_key(&mut keys) => match key {
                Some(Ok(Event::Key(key))) => match keyboard.on_key(key, clock.now_ms()) {
                    Some(KeyAction::Quit) => quit = true,
                    Some(KeyAction::Input(event)) => {
                        controller.handle_input(event, clock.now_ms(), &mut link);
                    }
                    None => {}
                },
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Keyboard read failed, disabling keyboard: {}", e);
                    keys = None;
                }
                None => keys = None,
            },

            result = join_connect(&mut connecting) => {
                connecting = None;
                match result {
                    Ok(stream) => {
                        reader = Some(link.attach(stream));
                        controller.on_connected(&mut link);
                    }
                    Err(reason) => controller.on_disconnected(clock.now_ms(), &reason),
                }
            }

            frame = next_frame(&mut reader) => {
                if let Some(reason) = on_frame(&mut controller, frame) {
                    link.detach();
                    reader = None;
                    controller.on_disconnected(clock.now_ms(), &reason);
                }
            }

            _ = &mut shutdown => quit = true,
        }
    }

    info!("Shutting down");
    controller.shutdown(&mut link);
    link.close();
    drop(terminal);
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    Ok(())
}

// Returns the disconnect reason when the frame ends the link
fn on_frame(
    controller: &mut TeleopController,
    frame: Option<Result<Message, tungstenite::Error>>,
) -> Option<String> {
    match frame {
        Some(Ok(Message::Text(text))) => {
            controller.on_message(text.as_str());
            None
        }
        Some(Ok(Message::Close(frame))) => {
            debug!("Close frame: {:?}", frame);
            Some("closed by car".to_string())
        }
        Some(Ok(_)) => None,
        Some(Err(e)) => Some(e.to_string()),
        None => Some("stream ended".to_string()),
    }
}

async fn next_key(
    keys: &mut Option<EventStream>,
) -> Option<std::io::Result<Event>> {
    match keys {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}

async fn next_frame(
    reader: &mut Option<WsReader>,
) -> Option<Result<Message, tungstenite::Error>> {
    match reader {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}

async fn join_connect(task: &mut Option<ConnectTask>) -> Result<WsStream, String> {
    match task {
        Some(handle) => match handle.await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("connect task failed: {}", e)),
        },
        None => pending().await,
    }
}
