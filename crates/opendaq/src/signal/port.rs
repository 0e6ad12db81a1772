//! Input ports: the consuming end of a signal connection.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::signal::connection::{Connection, OverflowPolicy};
use crate::signal::descriptor::DataDescriptor;
use crate::signal::packet::Packet;

/// How a connected packet is delivered to the owning function block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationMode {
    /// Invoked synchronously on the signal's sending thread.
    SameThread,
    /// Queued on the scheduler's worker pool.
    Scheduler,
    /// No push notification; the consumer polls `InputPortExt::connection`.
    None,
}

/// Pushed through a port's registered notify callback instead of letting
/// a connection event pass silently.
#[derive(Debug, Clone)]
pub enum PortNotification {
    /// The connection's bounded queue was full; `packets_dropped` is the
    /// running total lost on this connection so far.
    PacketOverflow { packets_dropped: u64 },
}

/// Callback an input port's owner registers to learn about connection
/// events it can't otherwise observe by polling `dequeue`.
pub type NotifyCallback = Arc<dyn Fn(PortNotification) + Send + Sync>;

type AcceptPredicate = Box<dyn Fn(&DataDescriptor) -> bool + Send + Sync>;

/// Function-block-side endpoint a [`crate::signal::signal::Signal`]
/// connects to.
pub struct InputPortExt {
    pub required: bool,
    pub notification_mode: NotificationMode,
    accept: RwLock<Option<AcceptPredicate>>,
    connection: ArcSwapOption<Connection>,
    source_signal_global_id: RwLock<Option<String>>,
    notify: RwLock<Option<NotifyCallback>>,
}

impl Default for InputPortExt {
    fn default() -> Self {
        Self {
            required: false,
            notification_mode: NotificationMode::SameThread,
            accept: RwLock::new(None),
            connection: ArcSwapOption::from(None),
            source_signal_global_id: RwLock::new(None),
            notify: RwLock::new(None),
        }
    }
}

impl InputPortExt {
    #[must_use]
    pub fn new(required: bool, notification_mode: NotificationMode) -> Self {
        Self {
            required,
            notification_mode,
            ..Default::default()
        }
    }

    /// Install the predicate deciding whether an incoming signal's
    /// descriptor is acceptable for this port.
    pub fn set_accepts_signal(&self, predicate: impl Fn(&DataDescriptor) -> bool + Send + Sync + 'static) {
        *self.accept.write() = Some(Box::new(predicate));
    }

    #[must_use]
    pub fn accepts(&self, descriptor: &DataDescriptor) -> bool {
        match self.accept.read().as_ref() {
            Some(pred) => pred(descriptor),
            None => true,
        }
    }

    /// At most one connection per input port; connecting again first
    /// disconnects the previous one. The currently registered notify
    /// callback, if any, carries over to the new connection.
    pub fn connect(&self, capacity: usize, overflow: OverflowPolicy) -> Arc<Connection> {
        let conn = Arc::new(Connection::new(capacity, overflow));
        conn.set_notify(self.notify.read().clone());
        self.connection.store(Some(conn.clone()));
        conn
    }

    pub fn disconnect(&self) {
        self.connection.store(None);
        *self.source_signal_global_id.write() = None;
    }

    /// Register the callback fired for connection events this port
    /// can't observe by polling `dequeue` (currently: `PacketOverflow`).
    /// Applies immediately to the current connection, if any, and to
    /// every connection installed afterwards via `connect`.
    pub fn set_notify_callback(&self, callback: Option<NotifyCallback>) {
        *self.notify.write() = callback.clone();
        if let Some(conn) = self.connection.load_full() {
            conn.set_notify(callback);
        }
    }

    pub fn set_source_signal_global_id(&self, global_id: Option<String>) {
        *self.source_signal_global_id.write() = global_id;
    }

    /// Global id of the signal this port is wired to, if any, recorded
    /// so persisted state can restore the same connection by id.
    #[must_use]
    pub fn source_signal_global_id(&self) -> Option<String> {
        self.source_signal_global_id.read().clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.load().is_some()
    }

    pub fn dequeue(&self) -> Result<Option<Packet>> {
        match self.connection.load_full() {
            Some(conn) => Ok(conn.dequeue()),
            None => Err(Error::NotFound("input port has no connection".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dequeue_without_a_connection_is_not_found() {
        let port = InputPortExt::default();
        assert!(matches!(port.dequeue(), Err(Error::NotFound(_))));
    }

    #[test]
    fn connecting_again_replaces_the_previous_connection() {
        let port = InputPortExt::default();
        let first = port.connect(4, OverflowPolicy::DropNewest);
        assert!(port.is_connected());
        let second = port.connect(4, OverflowPolicy::DropNewest);
        assert!(!Arc::ptr_eq(&first, &second));
        port.disconnect();
        assert!(!port.is_connected());
    }

    #[test]
    fn accepts_defaults_to_true_without_a_predicate() {
        let port = InputPortExt::default();
        let descriptor = DataDescriptor::new("sig", crate::signal::descriptor::SampleType::Float64, crate::signal::descriptor::Rule::Explicit);
        assert!(port.accepts(&descriptor));
        port.set_accepts_signal(|d| d.name == "only-this-one");
        assert!(!port.accepts(&descriptor));
    }
}
