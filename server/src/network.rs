//! WebSocket listener turning accepted sockets into session endpoints.
//!
//! The request path selects the session: its last non-empty segment is the
//! session id (`/game/<id>` and `/<id>` both work). A bare `/` creates a new
//! session under a random id.

use crate::client_manager::{ConnectionManager, Endpoint, Outbound};
use crate::error::SessionError;
use crate::session::SessionRegistry;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Accepts WebSocket connections and hands them to the connection manager.
pub struct NetworkServer {
    listener: TcpListener,
    manager: ConnectionManager,
    outbound_buffer: usize,
}

impl NetworkServer {
    pub async fn bind(addr: &str, registry: Arc<SessionRegistry>) -> Result<Self, SessionError> {
        let listener = TcpListener::bind(addr).await?;
        let outbound_buffer = registry.config().outbound_buffer;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            manager: ConnectionManager::new(registry),
            outbound_buffer,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the task is dropped.
    pub async fn run(&self) -> Result<(), SessionError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let manager = self.manager.clone();
                    let buffer = self.outbound_buffer;
                    tokio::spawn(async move {
                        handle_connection(manager, stream, addr, buffer).await;
                    });
                }
                Err(e) => error!("Accept error: {}", e),
            }
        }
    }
}

/// Session id carried by a request path, if any.
pub fn session_id_from_path(path: &str) -> Option<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

async fn handle_connection(
    manager: ConnectionManager,
    stream: TcpStream,
    addr: SocketAddr,
    outbound_buffer: usize,
) {
    let (path_tx, path_rx) = oneshot::channel();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let _ = path_tx.send(request.uri().path().to_string());
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };
    let path = path_rx.await.unwrap_or_default();
    let session_id = session_id_from_path(&path);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (endpoint, mut outbound) = Endpoint::channel(outbound_buffer);

    // Drains the endpoint's queue into the socket
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close { code, reason } => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = ws_sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    let connection = match manager.connect(session_id.as_deref(), endpoint).await {
        Ok(connection) => connection,
        Err(e) => {
            warn!("Connection from {} refused: {}", addr, e);
            let _ = writer.await;
            return;
        }
    };

    loop {
        tokio::select! {
            message = ws_receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = connection.handle_text(&text).await {
                        debug!("{}: {}", addr, e);
                    }
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => {
                        if let Err(e) = connection.handle_text(&text).await {
                            debug!("{}: {}", addr, e);
                        }
                    }
                    Err(_) => warn!("Ignoring non UTF-8 frame from {}", addr),
                },
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Client {} disconnected", addr);
                    break;
                }
                Some(Err(e)) => {
                    debug!("WebSocket error for {}: {}", addr, e);
                    break;
                }
                Some(Ok(_)) => {}
            },
            // The writer stops once the session closes the endpoint
            _ = &mut writer => break,
        }
    }

    connection.close().await;
    writer.abort();
}
