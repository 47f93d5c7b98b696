//! Connection management for the gateway event stream
//!
//! A [`Connection`] is owned by the listener thread for its whole life. Other
//! threads never touch it directly; they observe its [`ConnectionState`]
//! through the bridge and request closure through the shutdown signal.

use std::sync::atomic::{AtomicU8, Ordering};

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::{BridgeConfig, Transport};
use crate::error::{BridgeError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of the gateway connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Not yet connected
    Disconnected = 0,
    /// Connected and streaming frames
    Connected = 1,
    /// Close requested, teardown in progress
    Closing = 2,
    /// Torn down; no further frames
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connected,
            2 => Self::Closing,
            3 => Self::Closed,
            _ => Self::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Connection state readable from any thread
#[derive(Debug)]
pub(crate) struct SharedConnectionState(AtomicU8);

impl SharedConnectionState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        let previous = ConnectionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            tracing::debug!("Connection state {} -> {}", previous, state);
        }
    }
}

/// Duplex channel to the gateway
pub enum Connection {
    /// WebSocket, one frame per text message
    WebSocket(WsStream),
    /// Plain TCP, one frame per line
    Lines {
        reader: BufReader<TcpStream>,
        /// Bytes of the line being read; kept across cancelled reads
        pending: Vec<u8>,
    },
}

impl Connection {
    /// Establish the connection described by the config, bounded by its connect timeout
    pub async fn connect(config: &BridgeConfig) -> Result<Self> {
        let target = config.target();
        let timeout = config.connect_timeout;

        tracing::debug!("Connecting to {}", target);

        let attempt = async {
            match config.transport {
                Transport::WebSocket => {
                    let url = config.websocket_url()?;
                    let (ws, _response) =
                        connect_async(url.as_str())
                            .await
                            .map_err(|e| BridgeError::Connection {
                                target: target.clone(),
                                reason: e.to_string(),
                            })?;
                    Ok::<_, BridgeError>(Connection::WebSocket(ws))
                }
                Transport::Lines => {
                    let stream = TcpStream::connect(config.address()).await.map_err(|e| {
                        BridgeError::Connection {
                            target: target.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    Ok(Connection::Lines {
                        reader: BufReader::new(stream),
                        pending: Vec::new(),
                    })
                }
            }
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::ConnectTimeout {
                target: config.target(),
                timeout,
            }),
        }
    }

    /// Read the next frame payload.
    ///
    /// Returns `None` on end of stream or read failure. Payloads that are not
    /// valid UTF-8 are decoded lossily and left for frame decoding to reject.
    /// Cancel-safe, so it can be raced against the shutdown signal.
    pub async fn next_frame(&mut self) -> Option<String> {
        match self {
            Connection::WebSocket(ws) => loop {
                match ws.next().await? {
                    Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                    Ok(Message::Binary(bytes)) => {
                        return Some(String::from_utf8_lossy(&bytes).into_owned())
                    }
                    Ok(Message::Close(frame)) => {
                        tracing::debug!("Gateway sent close frame: {:?}", frame);
                        return None;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                        continue
                    }
                    Err(e) => {
                        tracing::debug!("WebSocket read failed: {}", e);
                        return None;
                    }
                }
            },
            Connection::Lines { reader, pending } => {
                match reader.read_until(b'\n', pending).await {
                    Ok(0) if pending.is_empty() => None,
                    Ok(_) => Some(take_line(pending)),
                    Err(e) => {
                        tracing::debug!("Line read failed: {}", e);
                        None
                    }
                }
            }
        }
    }

    /// Release the connection, telling the gateway we are going away
    pub async fn close(&mut self) {
        match self {
            Connection::WebSocket(ws) => {
                if let Err(e) = ws.close(None).await {
                    tracing::debug!("WebSocket close failed: {}", e);
                }
            }
            Connection::Lines { reader, .. } => {
                if let Err(e) = reader.get_mut().shutdown().await {
                    tracing::debug!("TCP shutdown failed: {}", e);
                }
            }
        }
    }
}

/// Take one line out of `pending`, without its `\n` or `\r\n` terminator
fn take_line(pending: &mut Vec<u8>) -> String {
    let mut bytes = std::mem::take(pending);
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::WebSocket(_) => f.write_str("Connection::WebSocket"),
            Connection::Lines { .. } => f.write_str("Connection::Lines"),
        }
    }
}
