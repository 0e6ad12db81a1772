//! WebSocket binding for the config protocol, for browser and other
//! clients that can't open a raw TCP socket directly.
//!
//! Frames are carried as binary WebSocket messages, encoded exactly as
//! [`Frame::encode`] produces them. Outbound notifications are polled
//! off the client's send queue on a short interval rather than woken
//! directly, since [`crate::config_protocol::server::ClientSendQueue`]
//! is a plain `crossbeam` channel shared with synchronous callers.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::instrument;
use uuid::Uuid;

use crate::config_protocol::admission::{ClientType, DropOthersPolicy};
use crate::config_protocol::client::ConfigProtocolClient;
use crate::config_protocol::message::{Frame, FrameKind, RequestPayload};
use crate::config_protocol::server::ConfigProtocolServer;
use crate::error::{Error, Result};

const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Admit `stream` and drive it until the client disconnects, dispatching
/// every inbound request frame against `server`.
#[instrument(skip(server, stream), fields(session = %Uuid::new_v4()))]
pub async fn serve_connection<S>(
    server: Arc<ConfigProtocolServer>,
    stream: WebSocketStream<S>,
    client_type: ClientType,
    policy: DropOthersPolicy,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let connection = server.admit(client_type, policy)?;
    let (mut sink, mut source) = stream.split();
    let protocol_version = crate::config::PROTOCOL_VERSION_MAX;

    loop {
        tokio::select! {
            message = source.next() => {
                let Some(message) = message else { break };
                let message = message.map_err(|e| Error::ConnectionLost(e.to_string()))?;
                let Message::Binary(bytes) = message else { continue };
                let (_, _, request_id, body) = Frame::decode_header(&bytes)?;
                let payload: RequestPayload = serde_json::from_slice(body)?;
                let reply = server.handle_request(&connection, request_id, payload);
                sink.send(Message::Binary(reply.encode(protocol_version)?))
                    .await
                    .map_err(|e| Error::ConnectionLost(e.to_string()))?;
            }
            () = tokio::time::sleep(NOTIFICATION_POLL_INTERVAL) => {
                while let Some(frame) = connection.queue.try_pop() {
                    sink.send(Message::Binary(frame.encode(protocol_version)?))
                        .await
                        .map_err(|e| Error::ConnectionLost(e.to_string()))?;
                }
            }
        }
    }
    Ok(())
}

/// Connect to a remote config-protocol server over WebSocket, returning
/// a client handle and the background task driving its socket.
pub async fn connect(url: &str) -> Result<(Arc<ConfigProtocolClient>, tokio::task::JoinHandle<Result<()>>)> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| Error::ConnectionLost(e.to_string()))?;
    let (mut sink, mut source) = stream.split();

    let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::unbounded_channel();
    let client = ConfigProtocolClient::new(outbound_tx);
    let driver = client.clone();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let bytes = frame.encode(driver.negotiated_version())?;
                    sink.send(Message::Binary(bytes)).await.map_err(|e| Error::ConnectionLost(e.to_string()))?;
                }
                message = source.next() => {
                    let Some(message) = message else { break };
                    let message = message.map_err(|e| Error::ConnectionLost(e.to_string()))?;
                    let Message::Binary(bytes) = message else { continue };
                    let (_, _, request_id, body) = Frame::decode_header(&bytes)?;
                    let json = serde_json::from_slice(body)?;
                    driver.complete_reply(Frame { kind: FrameKind::Reply, request_id, json, blob: None });
                }
            }
        }
        Ok(())
    });

    Ok((client, handle))
}
