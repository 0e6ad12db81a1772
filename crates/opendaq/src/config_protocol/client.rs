//! Client-side request dispatch: version-gates requests locally before
//! ever sending a byte, and correlates replies by request id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config_protocol::message::{Frame, FrameKind, ReplyPayload, RequestPayload};
use crate::error::{Error, Result};

type PendingReplies = Mutex<HashMap<u64, oneshot::Sender<Frame>>>;

/// Tracks the negotiated protocol version and in-flight requests for one
/// config-protocol connection.
pub struct ConfigProtocolClient {
    negotiated_version: Mutex<u32>,
    next_request_id: AtomicU64,
    pending: PendingReplies,
    outbound: tokio::sync::mpsc::UnboundedSender<Frame>,
}

impl ConfigProtocolClient {
    #[must_use]
    pub fn new(outbound: tokio::sync::mpsc::UnboundedSender<Frame>) -> Arc<Self> {
        Arc::new(Self {
            negotiated_version: Mutex::new(1),
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            outbound,
        })
    }

    pub fn set_negotiated_version(&self, version: u32) {
        *self.negotiated_version.lock() = version;
    }

    #[must_use]
    pub fn negotiated_version(&self) -> u32 {
        *self.negotiated_version.lock()
    }

    /// Send `payload`, failing fast with
    /// [`Error::ServerVersionTooLow`] before touching the network if the
    /// negotiated version doesn't support it.
    pub async fn request(&self, payload: RequestPayload) -> Result<serde_json::Value> {
        let negotiated = self.negotiated_version();
        if payload.min_version() > negotiated {
            return Err(Error::ServerVersionTooLow {
                required: payload.min_version(),
                negotiated,
            });
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);

        let frame = Frame {
            kind: FrameKind::Request,
            request_id,
            json: serde_json::to_value(&payload)?,
            blob: None,
        };
        self.outbound
            .send(frame)
            .map_err(|_| Error::ConnectionLost("outbound channel closed".to_string()))?;

        let reply = rx.await.map_err(|_| Error::ConnectionLost("connection closed before reply".to_string()))?;
        let parsed: ReplyPayload = serde_json::from_value(reply.json)?;
        match parsed {
            ReplyPayload::Ok(value) => Ok(value),
            ReplyPayload::Error { message } => Err(Error::ConnectionLost(message)),
        }
    }

    /// Deliver an inbound reply frame to whichever `request` call is
    /// waiting on it.
    pub fn complete_reply(&self, frame: Frame) {
        if let Some(tx) = self.pending.lock().remove(&frame.request_id) {
            let _ = tx.send(frame);
        }
    }
}
