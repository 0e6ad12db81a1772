//! Bounded FIFO linking one signal's output to one input port.

use crossbeam::channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::signal::packet::Packet;
use crate::signal::port::{NotifyCallback, PortNotification};

/// Queue discipline when a connection's bounded buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the incoming packet and count it.
    DropNewest,
    /// Drop the oldest queued packet to make room.
    DropOldest,
}

/// A single producer/single consumer packet queue between a signal and
/// an input port.
pub struct Connection {
    sender: Sender<Packet>,
    receiver: Receiver<Packet>,
    overflow: OverflowPolicy,
    dropped: std::sync::atomic::AtomicU64,
    notify: RwLock<Option<NotifyCallback>>,
}

impl Connection {
    #[must_use]
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        let (sender, receiver) = crossbeam::channel::bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            overflow,
            dropped: std::sync::atomic::AtomicU64::new(0),
            notify: RwLock::new(None),
        }
    }

    /// Install the callback to fire on overflow. Installed by
    /// `InputPortExt::connect`/`set_notify_callback`; not meant to be
    /// called directly by signal-side code.
    pub(crate) fn set_notify(&self, notify: Option<NotifyCallback>) {
        *self.notify.write() = notify;
    }

    fn notify_overflow(&self) {
        let packets_dropped = self.packets_dropped();
        if let Some(callback) = self.notify.read().as_ref() {
            callback(PortNotification::PacketOverflow { packets_dropped });
        }
    }

    /// Enqueue `packet`, applying the overflow policy when full. A
    /// packet is never dropped without surfacing it: the port's notify
    /// callback fires with the running drop count.
    pub fn send(&self, packet: Packet) -> Result<()> {
        match self.overflow {
            OverflowPolicy::DropNewest => match self.sender.try_send(packet) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    self.notify_overflow();
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err(Error::ConnectionLost("input port closed".to_string())),
            },
            OverflowPolicy::DropOldest => {
                match self.sender.try_send(packet) {
                    Ok(()) => Ok(()),
                    Err(TrySendError::Full(packet)) => {
                        let _ = self.receiver.try_recv();
                        self.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        self.notify_overflow();
                        self.sender
                            .try_send(packet)
                            .map_err(|_| Error::ConnectionLost("input port closed".to_string()))
                    }
                    Err(TrySendError::Disconnected(_)) => Err(Error::ConnectionLost("input port closed".to_string())),
                }
            }
        }
    }

    /// Dequeue the next packet if one is pending.
    pub fn dequeue(&self) -> Option<Packet> {
        self.receiver.try_recv().ok()
    }

    #[must_use]
    pub fn packets_dropped(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }

    #[must_use]
    pub fn has_packets(&self) -> bool {
        !self.receiver.is_empty()
    }
}
