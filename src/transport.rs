// WebSocket link to the car
//
// The socket is split: a writer task owns the sink and drains an unbounded
// channel, so sending from the controller never waits on the network.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::messages::Command;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsReader = SplitStream<WsStream>;

/// Error types for the car link
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Link is not open")]
    NotOpen,

    #[error("Link writer has shut down")]
    Closed,
}

/// Outbound side of the link, as seen by the controller
pub trait Transport {
    fn send(&mut self, command: &Command) -> Result<(), TransportError>;
}

/// Open a WebSocket to `url` (ws:// or wss://)
pub async fn connect(url: &str) -> Result<WsStream, TransportError> {
    let (stream, response) = connect_async(url).await?;
    debug!("Handshake complete: HTTP {}", response.status());
    Ok(stream)
}

/// Handle to the writer task of an open socket
#[derive(Debug, Default)]
pub struct WsLink {
    outbound: Option<UnboundedSender<Message>>,
    writer: Option<JoinHandle<()>>,
}

impl WsLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split an open socket, spawn its writer, and return the read half
    pub fn attach(&mut self, stream: WsStream) -> WsReader {
        self.detach();
        let (sink, reader) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        self.writer = Some(tokio::spawn(write_loop(sink, rx)));
        self.outbound = Some(tx);
        reader
    }

    /// Drop the writer; pending frames are flushed before the sink closes
    pub fn detach(&mut self) {
        self.outbound = None;
        self.writer = None;
    }

    pub fn is_attached(&self) -> bool {
        self.outbound.is_some()
    }

    /// Ask the server to close the socket
    pub fn close(&mut self) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(Message::Close(None));
        }
    }
}

impl Transport for WsLink {
    fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        let tx = self.outbound.as_ref().ok_or(TransportError::NotOpen)?;
        let json = serde_json::to_string(command)?;
        tx.send(Message::Text(json.into()))
            .map_err(|_| TransportError::Closed)
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            // The read half reports the disconnect; nothing to do here
            debug!("Writer stopped: {}", e);
            return;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Direction;

    #[test]
    fn test_detached_link_refuses_sends() {
        let mut link = WsLink::new();
        assert!(!link.is_attached());
        let err = link.send(&Command::stop()).unwrap_err();
        assert!(matches!(err, TransportError::NotOpen));
    }

    #[tokio::test]
    async fn test_roundtrip_against_local_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text(r#"{"type":"welcome","message":"hi"}"#.into()))
                .await
                .unwrap();
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected frame: {:?}", other),
                }
            }
        });

        let stream = connect(&format!("ws://{}/", addr)).await.unwrap();
        let mut link = WsLink::new();
        let mut reader = link.attach(stream);

        match reader.next().await {
            Some(Ok(Message::Text(text))) => assert!(text.as_str().contains("welcome")),
            other => panic!("expected welcome, got {:?}", other),
        }

        link.send(&Command::Move {
            direction: Direction::Forward,
        })
        .unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, r#"{"cmd":"move","direction":"forward"}"#);
    }
}
