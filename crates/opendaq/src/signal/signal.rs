//! Signal: the producing end of zero or more connections.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::signal::connection::Connection;
use crate::signal::descriptor::{DataDescriptor, SampleType};
use crate::signal::packet::{EventPacket, Packet};

/// Signal-specific payload carried inside a
/// [`crate::component::ComponentKind::Signal`].
pub struct SignalExt {
    descriptor: ArcSwap<Option<DataDescriptor>>,
    domain_signal: RwLock<Option<Arc<crate::component::Component>>>,
    public: std::sync::atomic::AtomicBool,
    connections: RwLock<Vec<Arc<Connection>>>,
}

impl Default for SignalExt {
    fn default() -> Self {
        Self {
            descriptor: ArcSwap::from_pointee(None),
            domain_signal: RwLock::new(None),
            public: std::sync::atomic::AtomicBool::new(true),
            connections: RwLock::new(Vec::new()),
        }
    }
}

impl SignalExt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn descriptor(&self) -> Option<DataDescriptor> {
        (**self.descriptor.load()).clone()
    }

    #[must_use]
    pub fn domain_signal(&self) -> Option<Arc<crate::component::Component>> {
        self.domain_signal.read().clone()
    }

    pub fn set_domain_signal(&self, domain: Option<Arc<crate::component::Component>>) {
        *self.domain_signal.write() = domain;
    }

    #[must_use]
    pub fn public(&self) -> bool {
        self.public.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn set_public(&self, public: bool) {
        self.public.store(public, std::sync::atomic::Ordering::Release);
    }

    /// Change the descriptor, notifying every connected reader with an
    /// event packet before any further data packet is delivered.
    pub fn set_descriptor(&self, descriptor: DataDescriptor) -> Result<()> {
        let domain = self.domain_signal.read().as_ref().and_then(|d| {
            if let crate::component::ComponentKind::Signal(sig) = &*d.kind.read() {
                sig.descriptor()
            } else {
                None
            }
        });
        let packet = Packet::Event(EventPacket::data_descriptor_changed(
            Arc::new(descriptor.clone()),
            domain.map(Arc::new),
        ));
        self.descriptor.store(Arc::new(Some(descriptor)));
        self.broadcast(packet)
    }

    pub fn add_connection(&self, connection: Arc<Connection>) {
        self.connections.write().push(connection);
    }

    pub fn disconnect_all(&self) {
        self.connections.write().clear();
    }

    /// Validate and push one data packet to every connected input port.
    pub fn send(&self, sample_count: usize, buffer: Arc<[u8]>) -> Result<()> {
        let descriptor = self
            .descriptor()
            .ok_or_else(|| Error::InvalidValue {
                property: "descriptor".to_string(),
                reason: "signal has no descriptor set".to_string(),
            })?;
        if descriptor.carries_buffer() && descriptor.sample_type != SampleType::Undefined {
            if let Some(size) = descriptor.sample_type.size_bytes() {
                if buffer.len() != size * sample_count {
                    return Err(Error::InvalidValue {
                        property: "buffer".to_string(),
                        reason: format!(
                            "expected {} bytes for {sample_count} samples, got {}",
                            size * sample_count,
                            buffer.len()
                        ),
                    });
                }
            }
        }
        let packet = crate::signal::packet::DataPacket::new(Arc::new(descriptor), sample_count, buffer, 0);
        self.broadcast(Packet::Data(packet))
    }

    fn broadcast(&self, packet: Packet) -> Result<()> {
        for conn in self.connections.read().iter() {
            conn.send(packet.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::connection::OverflowPolicy;
    use crate::signal::descriptor::Rule;

    #[test]
    fn send_without_a_descriptor_is_rejected() {
        let signal = SignalExt::new();
        let err = signal.send(1, Arc::from(vec![0u8; 8])).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn send_validates_buffer_length_against_sample_type() {
        let signal = SignalExt::new();
        signal.set_descriptor(DataDescriptor::new("sig", SampleType::Int32, Rule::Explicit)).unwrap();
        let err = signal.send(2, Arc::from(vec![0u8; 3])).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        signal.send(2, Arc::from(vec![0u8; 8])).unwrap();
    }

    #[test]
    fn send_reaches_every_connected_connection() {
        let signal = SignalExt::new();
        signal.set_descriptor(DataDescriptor::new("sig", SampleType::Int32, Rule::Explicit)).unwrap();
        let conn = Arc::new(Connection::new(4, OverflowPolicy::DropNewest));
        signal.add_connection(conn.clone());
        signal.send(1, Arc::from(vec![0u8; 4])).unwrap();
        assert!(conn.has_packets());
    }

    #[test]
    fn disconnect_all_stops_further_delivery() {
        let signal = SignalExt::new();
        signal.set_descriptor(DataDescriptor::new("sig", SampleType::Int32, Rule::Explicit)).unwrap();
        let conn = Arc::new(Connection::new(4, OverflowPolicy::DropNewest));
        signal.add_connection(conn.clone());
        signal.disconnect_all();
        signal.send(1, Arc::from(vec![0u8; 4])).unwrap();
        assert!(!conn.has_packets());
    }
}
