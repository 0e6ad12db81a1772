//! Server capability records: what a device advertises about itself on
//! the wire and over discovery.

use std::collections::HashMap;

/// One address/port a server can be reached at.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressInfo {
    pub address: String,
    pub port: Option<u16>,
    pub connection_string: String,
}

/// Advertises a protocol a device's server supports, with enough detail
/// for a client to pick a primary address and protocol priority.
#[derive(Debug, Clone)]
pub struct ServerCapability {
    pub protocol_id: String,
    pub protocol_name: String,
    pub protocol_type: ProtocolType,
    pub connection_type: ConnectionType,
    pub prefix: String,
    pub addresses: Vec<AddressInfo>,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolType {
    Configuration,
    Streaming,
    ConfigurationAndStreaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Ip,
    Usb,
    VirtualBus,
}

impl ServerCapability {
    #[must_use]
    pub fn new(protocol_id: impl Into<String>, protocol_type: ProtocolType, prefix: impl Into<String>) -> Self {
        Self {
            protocol_id: protocol_id.into(),
            protocol_name: String::new(),
            protocol_type,
            connection_type: ConnectionType::Ip,
            prefix: prefix.into(),
            addresses: Vec::new(),
            properties: HashMap::new(),
        }
    }

    #[must_use]
    pub fn primary_address(&self) -> Option<&AddressInfo> {
        self.addresses.first()
    }
}
