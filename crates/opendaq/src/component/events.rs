//! Core event kinds and the event bus components publish to and bubble
//! through.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// The exhaustive set of core event kinds the mirror engine depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreEventKind {
    ComponentAdded,
    ComponentRemoved,
    PropertyValueChanged,
    PropertyAdded,
    PropertyRemoved,
    PropertyObjectUpdateEnd,
    AttributeChanged,
    DataDescriptorChanged,
    SignalConnected,
    SignalDisconnected,
    ComponentUpdateEnd,
    TypeAdded,
    TypeRemoved,
    DeviceDomainChanged,
    ConnectionStatusChanged,
    StatusChanged,
    DeviceLockStateChanged,
    PacketOverflow,
}

impl fmt::Display for CoreEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A parameter value attached to a [`CoreEvent`].
///
/// `Null` and "absent" are distinguished deliberately: a
/// `DataDescriptorChanged` event may carry an explicit `Null` domain
/// descriptor parameter (meaning "no domain") or simply omit the key
/// (meaning "domain unchanged").
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    GlobalId(String),
}

impl From<&str> for EventValue {
    fn from(v: &str) -> Self {
        EventValue::String(v.to_string())
    }
}
impl From<String> for EventValue {
    fn from(v: String) -> Self {
        EventValue::String(v)
    }
}
impl From<bool> for EventValue {
    fn from(v: bool) -> Self {
        EventValue::Bool(v)
    }
}
impl From<i64> for EventValue {
    fn from(v: i64) -> Self {
        EventValue::Int(v)
    }
}

/// A core event, carrying the originating component's global id and a
/// parameter map.
#[derive(Debug, Clone)]
pub struct CoreEvent {
    /// Global id of the component that originated the event.
    pub global_id: String,
    /// Event kind.
    pub kind: CoreEventKind,
    /// Parameter map; `None` values are explicit nulls, see [`EventValue`].
    pub params: HashMap<String, EventValue>,
}

impl CoreEvent {
    /// Build an event with no parameters.
    #[must_use]
    pub fn new(global_id: impl Into<String>, kind: CoreEventKind) -> Self {
        Self {
            global_id: global_id.into(),
            kind,
            params: HashMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<EventValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

type Callback = Box<dyn Fn(&CoreEvent) + Send + Sync>;

/// Shared, tree-wide event bus. Every [`crate::component::Component`] in
/// an `Instance` holds an `Arc` to the same bus; `on_core_event`
/// subscribes with a global-id-prefix filter so that subscribing at an
/// ancestor observes every event from its descendants too.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Callback>>,
}

impl EventBus {
    /// Construct a fresh, empty bus.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish `event` synchronously, on the calling thread, to every
    /// subscriber in registration order: events from one thread are
    /// observed in that order by every subscriber on that subscription.
    pub fn publish(&self, event: &CoreEvent) {
        for sub in self.subscribers.lock().iter() {
            sub(event);
        }
    }

    fn subscribe_raw(&self, cb: Callback) {
        self.subscribers.lock().push(cb);
    }
}

/// A subscription endpoint scoped to one component's subtree, returned by
/// [`crate::component::Component::on_core_event`].
pub struct CoreEventSubscription {
    bus: Arc<EventBus>,
    scope_global_id: String,
}

impl CoreEventSubscription {
    pub(crate) fn new(bus: Arc<EventBus>, scope_global_id: String) -> Self {
        Self {
            bus,
            scope_global_id,
        }
    }

    /// Register `callback` for every event whose `global_id` is this
    /// component's global id or a descendant of it.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&CoreEvent) + Send + Sync + 'static,
    {
        let scope = self.scope_global_id.clone();
        self.bus.subscribe_raw(Box::new(move |event| {
            if event.global_id == scope || event.global_id.starts_with(&format!("{scope}/")) {
                callback(event);
            }
        }));
    }
}
