//! Local stand-ins for a deCONZ gateway used by the integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::{Shutdown, TcpListener};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use deconz_stream::{BridgeConfig, Transport};
use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;

pub const TIMEOUT: Duration = Duration::from_secs(2);

enum GatewayCommand {
    Send(Vec<String>),
    Raw(Vec<u8>),
    Ping,
    Close,
}

/// Gateway speaking newline-delimited JSON over plain TCP.
///
/// Accepts exactly one client and writes whatever the test hands it.
pub struct LineGateway {
    port: u16,
    commands: mpsc::Sender<GatewayCommand>,
}

impl LineGateway {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind line gateway");
        let port = listener.local_addr().expect("gateway address").port();
        let (commands, command_rx) = mpsc::channel();

        thread::spawn(move || {
            let Ok((mut socket, _)) = listener.accept() else {
                return;
            };

            while let Ok(command) = command_rx.recv() {
                match command {
                    GatewayCommand::Send(frames) => {
                        for frame in frames {
                            // The bridge may already have hung up
                            let _ = socket.write_all(frame.as_bytes());
                            let _ = socket.write_all(b"\n");
                        }
                        let _ = socket.flush();
                    }
                    GatewayCommand::Raw(bytes) => {
                        let _ = socket.write_all(&bytes);
                        let _ = socket.flush();
                    }
                    GatewayCommand::Ping => {}
                    GatewayCommand::Close => {
                        let _ = socket.shutdown(Shutdown::Both);
                        return;
                    }
                }
            }
        });

        Self { port, commands }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config(&self) -> BridgeConfig {
        BridgeConfig::new()
            .with_port(self.port.to_string())
            .with_transport(Transport::Lines)
            .with_shutdown_timeout(TIMEOUT)
    }

    pub fn send(&self, frames: &[&str]) {
        let frames = frames.iter().map(|f| f.to_string()).collect();
        let _ = self.commands.send(GatewayCommand::Send(frames));
    }

    /// Write bytes as they are, terminator included
    pub fn send_raw(&self, bytes: &[u8]) {
        let _ = self.commands.send(GatewayCommand::Raw(bytes.to_vec()));
    }

    pub fn close(&self) {
        let _ = self.commands.send(GatewayCommand::Close);
    }
}

/// Gateway speaking the websocket protocol, one frame per text message.
pub struct WsGateway {
    port: u16,
    commands: tokio::sync::mpsc::UnboundedSender<GatewayCommand>,
}

impl WsGateway {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ws gateway");
        let port = listener.local_addr().expect("gateway address").port();
        listener
            .set_nonblocking(true)
            .expect("nonblocking gateway listener");
        let (commands, mut command_rx) = tokio::sync::mpsc::unbounded_channel();

        thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("gateway runtime");

            rt.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("tokio gateway listener");
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };

                while let Some(command) = command_rx.recv().await {
                    match command {
                        GatewayCommand::Send(frames) => {
                            for frame in frames {
                                let _ = ws.send(Message::text(frame)).await;
                            }
                        }
                        GatewayCommand::Raw(bytes) => {
                            let _ = ws.send(Message::binary(bytes)).await;
                        }
                        GatewayCommand::Ping => {
                            let _ = ws.send(Message::Ping(Vec::new().into())).await;
                        }
                        GatewayCommand::Close => {
                            let _ = ws.close(None).await;
                            return;
                        }
                    }
                }
            });
        });

        Self { port, commands }
    }

    pub fn config(&self) -> BridgeConfig {
        BridgeConfig::new()
            .with_port(self.port.to_string())
            .with_transport(Transport::WebSocket)
            .with_shutdown_timeout(TIMEOUT)
    }

    pub fn send(&self, frames: &[&str]) {
        let frames = frames.iter().map(|f| f.to_string()).collect();
        let _ = self.commands.send(GatewayCommand::Send(frames));
    }

    /// Send one binary message
    pub fn send_binary(&self, bytes: &[u8]) {
        let _ = self.commands.send(GatewayCommand::Raw(bytes.to_vec()));
    }

    pub fn ping(&self) {
        let _ = self.commands.send(GatewayCommand::Ping);
    }

    pub fn close(&self) {
        let _ = self.commands.send(GatewayCommand::Close);
    }
}

/// Callback that forwards every state it receives into a channel
pub fn recorder() -> (impl Fn(bool) + Send + Sync + 'static, mpsc::Receiver<bool>) {
    let (tx, rx) = mpsc::channel();
    (
        move |state| {
            let _ = tx.send(state);
        },
        rx,
    )
}

/// Callback that tags each state with a label, for telling subscribers apart
pub fn tagged_recorder(
    tag: &'static str,
    tx: mpsc::Sender<(&'static str, bool)>,
) -> impl Fn(bool) + Send + Sync + 'static {
    move |state| {
        let _ = tx.send((tag, state));
    }
}

/// Sensor frame for an identifier
pub fn sensor_frame(id: &str, presence: Option<bool>) -> String {
    match presence {
        Some(p) => format!(r#"{{"e":"changed","id":"{id}","r":"sensors","state":{{"presence":{p}}}}}"#),
        None => format!(r#"{{"e":"changed","id":"{id}","r":"sensors","state":{{}}}}"#),
    }
}
