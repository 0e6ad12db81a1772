//! Async config-protocol server: one task per connection, dispatching
//! requests against the local component tree and fanning out
//! subscribed packets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::component::{Component, CoreEvent};
use crate::config::RuntimeConfig;
use crate::config_protocol::admission::{AdmissionTable, ClientType, DropOthersPolicy};
use crate::config_protocol::message::{Frame, FrameKind, ReplyPayload, RequestPayload};
use crate::error::{Error, Result};
use crate::property::{from_json, to_json};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Outbound frames queued for one connection; bounded so a slow client
/// can't grow memory unbounded. Overflow drops the connection with
/// `ReconnectRequested` rather than blocking the publisher.
pub struct ClientSendQueue {
    sender: Sender<Frame>,
    receiver: Receiver<Frame>,
}

impl ClientSendQueue {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    fn try_push(&self, frame: Frame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Drain one queued outbound frame, if any, without blocking.
    pub(crate) fn try_pop(&self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

/// One admitted connection's server-side state.
pub struct ClientConnection {
    pub id: u64,
    pub client_type: ClientType,
    pub queue: ClientSendQueue,
    pub subscriptions: Mutex<Vec<String>>,
}

/// Serves the config protocol for one device's component tree root.
pub struct ConfigProtocolServer {
    root: Arc<Component>,
    config: RuntimeConfig,
    admission: Mutex<AdmissionTable>,
    clients: Mutex<HashMap<u64, Arc<ClientConnection>>>,
}

impl ConfigProtocolServer {
    #[must_use]
    pub fn new(root: Arc<Component>, config: RuntimeConfig) -> Arc<Self> {
        Arc::new(Self {
            root,
            config,
            admission: Mutex::new(AdmissionTable::new()),
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Admit a new connection, enforcing `MaxAllowedConfigConnections`
    /// and the client-type admission rules, evicting others as required.
    #[instrument(skip(self))]
    pub fn admit(&self, client_type: ClientType, policy: DropOthersPolicy) -> Result<Arc<ClientConnection>> {
        let clients = self.clients.lock();
        if self.config.max_config_connections > 0 && clients.len() >= self.config.max_config_connections {
            return Err(Error::ConnectionLimitReached(clients.len()));
        }
        drop(clients);

        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let result = self.admission.lock().admit(id, client_type, policy)?;
        for evicted in &result.evict {
            self.disconnect(*evicted, "ReconnectRequested");
        }
        let connection = Arc::new(ClientConnection {
            id,
            client_type,
            queue: ClientSendQueue::new(self.config.client_send_buffer),
            subscriptions: Mutex::new(Vec::new()),
        });
        self.clients.lock().insert(id, connection.clone());
        info!(connection_id = id, ?client_type, "client admitted");
        Ok(connection)
    }

    fn disconnect(&self, connection_id: u64, reason: &str) {
        if let Some(client) = self.clients.lock().remove(&connection_id) {
            let _ = client.queue.try_push(Frame {
                kind: FrameKind::Notification,
                request_id: 0,
                json: serde_json::json!({ "event": reason }),
                blob: None,
            });
        }
        self.admission.lock().release(connection_id);
    }

    /// Handle one request from an admitted connection.
    #[instrument(skip(self, connection, payload))]
    pub fn handle_request(&self, connection: &ClientConnection, request_id: u64, payload: RequestPayload) -> Frame {
        let negotiated = crate::config::PROTOCOL_VERSION_MAX;
        if payload.min_version() > negotiated {
            return self.error_reply(request_id, Error::ServerVersionTooLow {
                required: payload.min_version(),
                negotiated,
            });
        }
        let result = self.dispatch(connection, &payload);
        match result {
            Ok(value) => Frame {
                kind: FrameKind::Reply,
                request_id,
                json: serde_json::to_value(ReplyPayload::Ok(value)).unwrap_or(serde_json::Value::Null),
                blob: None,
            },
            Err(err) => self.error_reply(request_id, err),
        }
    }

    fn error_reply(&self, request_id: u64, err: Error) -> Frame {
        Frame {
            kind: FrameKind::Reply,
            request_id,
            json: serde_json::to_value(ReplyPayload::Error { message: err.to_string() }).unwrap_or(serde_json::Value::Null),
            blob: None,
        }
    }

    fn find(&self, global_id: &str) -> Result<Arc<Component>> {
        let mut segments = global_id.trim_start_matches('/').split('/');
        let root_name = segments.next().unwrap_or_default();
        if root_name != self.root.local_id() {
            return Err(Error::NotFound(global_id.to_string()));
        }
        let mut current = self.root.clone();
        for segment in segments {
            current = current.child(segment).ok_or_else(|| Error::NotFound(global_id.to_string()))?;
        }
        Ok(current)
    }

    fn dispatch(&self, connection: &ClientConnection, payload: &RequestPayload) -> Result<serde_json::Value> {
        let write_allowed = matches!(connection.client_type, ClientType::Control | ClientType::ExclusiveControl);
        match payload {
            RequestPayload::Handshake { .. } => Ok(serde_json::json!({ "version": crate::config::PROTOCOL_VERSION_MAX })),
            RequestPayload::GetComponentTreeSnapshot => Ok(serde_json::Value::Null),
            RequestPayload::GetPropertyValue { global_id, property } => {
                let component = self.find(global_id)?;
                let value = component.get_property_value(property)?;
                Ok(to_json(&value))
            }
            RequestPayload::SetPropertyValue { global_id, property, value } => {
                if !write_allowed {
                    return Err(Error::AccessDenied(global_id.clone()));
                }
                let component = self.find(global_id)?;
                component.set_property_value(property, from_json(value))?;
                Ok(serde_json::Value::Null)
            }
            RequestPayload::AddComponent { parent_global_id, local_id, kind } => {
                if !write_allowed {
                    return Err(Error::AccessDenied(parent_global_id.clone()));
                }
                let _ = (parent_global_id, local_id, kind);
                warn!("AddComponent over the wire requires module-specific construction; not resolvable generically");
                Err(Error::InvalidParameter("server cannot construct arbitrary component kinds".to_string()))
            }
            RequestPayload::RemoveComponent { parent_global_id, local_id } => {
                if !write_allowed {
                    return Err(Error::AccessDenied(parent_global_id.clone()));
                }
                let parent = self.find(parent_global_id)?;
                parent.remove_component(local_id)?;
                Ok(serde_json::Value::Null)
            }
            RequestPayload::Subscribe { global_id } => {
                connection.subscriptions.lock().push(global_id.clone());
                Ok(serde_json::Value::Null)
            }
            RequestPayload::Unsubscribe { global_id } => {
                connection.subscriptions.lock().retain(|g| g != global_id);
                Ok(serde_json::Value::Null)
            }
            RequestPayload::LockDevice { global_id } => {
                self.with_device(global_id, |dev| dev.lock(None))?;
                Ok(serde_json::Value::Null)
            }
            RequestPayload::UnlockDevice { global_id } => {
                self.with_device(global_id, |dev| dev.unlock(&None))?;
                Ok(serde_json::Value::Null)
            }
            RequestPayload::CallProcedure { global_id, .. } | RequestPayload::CallFunction { global_id, .. } => {
                Err(Error::NotFound(format!("callable dispatch for `{global_id}` requires typed bindings")))
            }
        }
    }

    fn with_device<F>(&self, global_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&crate::component::specialized::DeviceExt) -> Result<()>,
    {
        let component = self.find(global_id)?;
        let kind = component.kind.read();
        match &*kind {
            crate::component::ComponentKind::Device(dev) => f(dev),
            _ => Err(Error::InvalidParameter(format!("`{global_id}` is not a device"))),
        }
    }

    /// Push an event to every connection subscribed to its originating
    /// component or an ancestor.
    pub fn broadcast_event(&self, event: &CoreEvent) {
        for client in self.clients.lock().values() {
            let subscribed = client
                .subscriptions
                .lock()
                .iter()
                .any(|scope| event.global_id == *scope || event.global_id.starts_with(&format!("{scope}/")));
            if subscribed {
                let _ = client.queue.try_push(Frame {
                    kind: FrameKind::Notification,
                    request_id: 0,
                    json: serde_json::json!({ "event": format!("{:?}", event.kind), "globalId": event.global_id }),
                    blob: None,
                });
            }
        }
    }
}
