// End-to-end: controller + WebSocket link against a local stand-in for the car

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use rc_car_teleop::clock::{Clock, ManualClock};
use rc_car_teleop::config::TeleopConfig;
use rc_car_teleop::connection::ConnectionState;
use rc_car_teleop::controller::{InputEvent, TeleopController};
use rc_car_teleop::drive::StickVector;
use rc_car_teleop::messages::{Command, Direction};
use rc_car_teleop::runtime;
use rc_car_teleop::transport::{self, WsLink};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

// Accepts one client, greets it, forwards every text frame to `frames`,
// and closes the socket when `close` fires
async fn fake_car() -> (String, mpsc::UnboundedReceiver<Value>, mpsc::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let (frames_tx, frames) = mpsc::unbounded_channel();
    let (close, mut close_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"welcome","message":"welcome aboard"}"#.into(),
        ))
        .await
        .unwrap();

        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let value: Value = serde_json::from_str(text.as_str()).unwrap();
                        let _ = frames_tx.send(value);
                        ws.send(Message::Text(r#"{"status":"ok","speed":150}"#.into()))
                            .await
                            .unwrap();
                    }
                    Some(Ok(_)) => {}
                    _ => return,
                },
                _ = close_rx.recv() => {
                    let _ = ws.close(None).await;
                    return;
                }
            }
        }
    });

    (url, frames, close)
}

async fn recv(frames: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("server gone")
}

fn to_value(cmd: &Command) -> Value {
    serde_json::to_value(cmd).unwrap()
}

#[tokio::test]
async fn test_drive_session_over_websocket() {
    let (url, mut frames, close) = fake_car().await;
    let clock = ManualClock::new(0);
    let config = TeleopConfig {
        ramp_ms: 0,
        speed: 200,
        ..TeleopConfig::default()
    };
    let mut controller = TeleopController::new(&config);
    let state = controller.connection().subscribe();
    let mut link = WsLink::new();

    assert!(controller.poll_reconnect(clock.now_ms()));
    assert_eq!(*state.borrow(), ConnectionState::Connecting);

    let stream = transport::connect(&url).await.unwrap();
    let mut reader = link.attach(stream);
    controller.on_connected(&mut link);
    assert_eq!(*state.borrow(), ConnectionState::Connected);

    // Safety stop and the configured speed on connect
    assert_eq!(recv(&mut frames).await, to_value(&Command::stop()));
    assert_eq!(
        recv(&mut frames).await,
        to_value(&Command::Speed { value: 200 })
    );

    // Welcome is informational only
    let welcome = reader.next().await.unwrap().unwrap();
    controller.on_message(welcome.to_text().unwrap());

    // Stick forward-right in eight-way mode, two ticks: one payload
    controller.handle_input(
        InputEvent::StickMoved(StickVector::new(0.71, -0.71)),
        clock.now_ms(),
        &mut link,
    );
    controller.on_tick(clock.advance(50), &mut link);
    controller.on_tick(clock.advance(50), &mut link);
    assert_eq!(
        recv(&mut frames).await,
        to_value(&Command::Custom {
            left: 1000,
            right: 300
        })
    );

    // Held key: press, two repeats, release
    let t0 = clock.advance(50);
    controller.handle_input(
        InputEvent::DirectionPressed(Direction::PivotRight),
        t0,
        &mut link,
    );
    controller.handle_input(InputEvent::StickReleased, t0, &mut link);
    for _ in 0..9 {
        controller.on_tick(clock.advance(50), &mut link);
    }
    controller.handle_input(
        InputEvent::DirectionReleased(Direction::PivotRight),
        clock.now_ms(),
        &mut link,
    );

    let pivot = to_value(&Command::Move {
        direction: Direction::PivotRight,
    });
    let mut received = Vec::new();
    for _ in 0..5 {
        received.push(recv(&mut frames).await);
    }
    assert_eq!(
        received,
        vec![
            pivot.clone(),
            to_value(&Command::Custom { left: 0, right: 0 }),
            pivot.clone(),
            pivot,
            to_value(&Command::stop()),
        ]
    );

    // Car drops the link: state goes Disconnected and one retry is scheduled
    close.send(()).await.unwrap();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), reader.next())
            .await
            .expect("no close")
        {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            Some(Ok(Message::Text(text))) => controller.on_message(text.as_str()),
            Some(Ok(_)) => {}
        }
    }
    link.detach();
    let closed_at = clock.now_ms();
    controller.on_disconnected(closed_at, "closed by car");
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);

    clock.advance(2_999);
    assert!(!controller.poll_reconnect(clock.now_ms()));
    clock.advance(1);
    assert!(controller.poll_reconnect(clock.now_ms()));
    assert!(!controller.poll_reconnect(clock.advance(10_000)));
    assert_eq!(controller.connection().attempts(), 2);
}

// Drops the first connection before the handshake, then serves the second
// and forwards its text frames. Returns the time between the two accepts.
async fn flaky_car() -> (u16, mpsc::UnboundedReceiver<Value>, tokio::task::JoinHandle<Duration>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (frames_tx, frames) = mpsc::unbounded_channel();

    let server = tokio::spawn(async move {
        let (first, _) = listener.accept().await.unwrap();
        let refused_at = Instant::now();
        drop(first);

        let (tcp, _) = listener.accept().await.unwrap();
        let gap = refused_at.elapsed();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) => {
                    let _ = frames_tx.send(serde_json::from_str(text.as_str()).unwrap());
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        gap
    });

    (port, frames, server)
}

#[tokio::test]
async fn test_runtime_retries_then_stops_on_shutdown() {
    let (port, mut frames, server) = flaky_car().await;
    let config = TeleopConfig {
        host: "127.0.0.1".into(),
        port,
        reconnect_delay: Duration::from_millis(300),
        speed: 180,
        keyboard: false,
        gamepad: false,
        ..TeleopConfig::default()
    };
    let (quit_tx, quit_rx) = oneshot::channel::<()>();

    let session = async move {
        assert_eq!(recv(&mut frames).await, to_value(&Command::stop()));
        assert_eq!(
            recv(&mut frames).await,
            to_value(&Command::Speed { value: 180 })
        );
        quit_tx.send(()).unwrap();
        recv(&mut frames).await
    };
    let shutdown = async move {
        let _ = quit_rx.await;
    };

    let (result, last) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(runtime::run_until(config, shutdown), session) },
    )
    .await
    .expect("runtime did not stop");
    result.unwrap();

    // Idle ticks sent nothing; shutdown sent the final stop
    assert_eq!(last, to_value(&Command::stop()));

    let gap = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("car never saw the close")
        .unwrap();
    println!("retry after {:?}", gap);
    assert!(gap >= Duration::from_millis(300), "retried too early: {:?}", gap);
}
