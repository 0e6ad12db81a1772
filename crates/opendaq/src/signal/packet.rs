//! Packets: the units of data and metadata flowing across connections.

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::EventValue;
use crate::property::PropertyValue;
use crate::signal::descriptor::DataDescriptor;

/// A contiguous run of samples plus the descriptor that explains how to
/// interpret them.
#[derive(Clone)]
pub struct DataPacket {
    pub descriptor: Arc<DataDescriptor>,
    pub sample_count: usize,
    /// Raw sample bytes; empty when the descriptor's rule doesn't carry
    /// a buffer (`Linear`/`Constant`).
    pub buffer: Arc<[u8]>,
    /// Offset (in samples) of this packet's first sample relative to
    /// the rule's origin, used to resume `Linear`/`Constant` expansion
    /// correctly after a gap.
    pub offset: usize,
    /// Companion domain packet, if this signal has a separate domain
    /// signal.
    pub domain_packet: Option<Arc<DataPacket>>,
    /// Ordered `(sample_index, new_value)` changes a `Constant` rule
    /// applies partway through this packet, index relative to this
    /// packet's first sample. Empty for every other rule.
    pub value_changes: Vec<(usize, PropertyValue)>,
}

impl DataPacket {
    #[must_use]
    pub fn new(descriptor: Arc<DataDescriptor>, sample_count: usize, buffer: Arc<[u8]>, offset: usize) -> Self {
        Self {
            descriptor,
            sample_count,
            buffer,
            offset,
            domain_packet: None,
            value_changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_domain_packet(mut self, domain: Arc<DataPacket>) -> Self {
        self.domain_packet = Some(domain);
        self
    }

    /// Attach the ordered constant-value changes this packet carries.
    #[must_use]
    pub fn with_value_changes(mut self, changes: Vec<(usize, PropertyValue)>) -> Self {
        self.value_changes = changes;
        self
    }
}

/// Out-of-band notification carried on the same connection as data
/// packets, e.g. a descriptor change or an explicit end-of-stream.
#[derive(Clone)]
pub struct EventPacket {
    pub event_id: String,
    pub parameters: HashMap<String, EventValue>,
}

impl EventPacket {
    #[must_use]
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            parameters: HashMap::new(),
        }
    }

    #[must_use]
    pub fn data_descriptor_changed(descriptor: Arc<DataDescriptor>, domain_descriptor: Option<Arc<DataDescriptor>>) -> Self {
        let mut packet = Self::new("DATA_DESCRIPTOR_CHANGED");
        packet.parameters.insert("DataDescriptor".to_string(), EventValue::String(descriptor.name.clone()));
        match domain_descriptor {
            Some(d) => {
                packet.parameters.insert("DomainDataDescriptor".to_string(), EventValue::String(d.name.clone()));
            }
            None => {
                packet.parameters.insert("DomainDataDescriptor".to_string(), EventValue::Null);
            }
        }
        packet
    }
}

/// Either kind of packet flowing through a [`crate::signal::connection::Connection`].
#[derive(Clone)]
pub enum Packet {
    Data(DataPacket),
    Event(EventPacket),
}
