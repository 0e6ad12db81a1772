//! Connection-string parsing, including the `daq://` smart-connect
//! scheme that defers to module-reported capabilities instead of naming
//! a protocol directly.

use crate::error::{Error, Result};
use crate::module::capability::ProtocolType;

/// Parsed `scheme://host[:port][/path]` connection string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConnectionString {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

/// Recognized schemes beyond generic module-owned ones; `daq` triggers
/// smart-connect resolution instead of a direct module match.
pub const SMART_CONNECT_SCHEME: &str = "daq";

pub fn parse(connection_string: &str) -> Result<ParsedConnectionString> {
    let (scheme, rest) = connection_string
        .split_once("://")
        .ok_or_else(|| Error::InvalidParameter(format!("missing scheme in `{connection_string}`")))?;
    if scheme.is_empty() {
        return Err(Error::InvalidParameter("empty scheme".to_string()));
    }
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return Err(Error::InvalidParameter(format!("missing host in `{connection_string}`")));
    }
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str
                .parse::<u16>()
                .map_err(|_| Error::InvalidParameter(format!("invalid port `{port_str}`")))?;
            (host, Some(port))
        }
        None => (authority, None),
    };
    Ok(ParsedConnectionString {
        scheme: scheme.to_string(),
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

/// How the resolver attaches streaming sources to a mirrored device
/// tree. Numeric values match the `Streaming.StreamingConnectionHeuristic`
/// config property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingConnectionHeuristic {
    /// One streaming source per device in the tree that advertises a
    /// streaming capability.
    MinConnections = 0,
    /// One streaming source per leaf subtree that advertises a
    /// streaming capability.
    MinHops = 1,
    /// Don't attach any streaming sources.
    NotConnected = 2,
    /// Don't attach any streaming sources, but leave them listed for
    /// the caller to attach manually.
    NotConnectedButListed = 3,
}

/// A node in the device tree the streaming heuristic walks. Decoupled
/// from `Component` so the heuristic is testable without building a
/// real component tree; `component/mod.rs` adapts the real tree into
/// this shape when resolving streaming for a mirrored device.
pub struct DeviceNode<'a> {
    pub capabilities: &'a [crate::module::capability::ServerCapability],
    pub children: Vec<DeviceNode<'a>>,
}

impl<'a> DeviceNode<'a> {
    #[must_use]
    pub fn leaf(capabilities: &'a [crate::module::capability::ServerCapability]) -> Self {
        Self { capabilities, children: Vec::new() }
    }

    #[must_use]
    pub fn with_children(capabilities: &'a [crate::module::capability::ServerCapability], children: Vec<DeviceNode<'a>>) -> Self {
        Self { capabilities, children }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Picks the streaming capabilities to activate for a device tree, per
/// `StreamingConnectionHeuristic`: `MinConnections` attaches one source
/// per device in the tree with a streaming capability, `MinHops`
/// attaches one source per leaf subtree with a streaming capability.
pub fn select_streaming_sources<'a>(
    heuristic: StreamingConnectionHeuristic,
    prioritized_protocols: &[String],
    allowed_protocols: &[String],
    tree: &DeviceNode<'a>,
) -> Vec<&'a crate::module::capability::ServerCapability> {
    let mut sources = Vec::new();
    match heuristic {
        StreamingConnectionHeuristic::NotConnected | StreamingConnectionHeuristic::NotConnectedButListed => {}
        StreamingConnectionHeuristic::MinConnections => {
            collect_min_connections(tree, prioritized_protocols, allowed_protocols, &mut sources);
        }
        StreamingConnectionHeuristic::MinHops => {
            collect_min_hops(tree, prioritized_protocols, allowed_protocols, &mut sources);
        }
    }
    sources
}

fn best_streaming_capability<'a>(
    capabilities: &'a [crate::module::capability::ServerCapability],
    prioritized_protocols: &[String],
    allowed_protocols: &[String],
) -> Option<&'a crate::module::capability::ServerCapability> {
    capabilities
        .iter()
        .filter(|c| matches!(c.protocol_type, ProtocolType::Streaming | ProtocolType::ConfigurationAndStreaming))
        .filter(|c| allowed_protocols.is_empty() || allowed_protocols.contains(&c.protocol_id))
        .min_by_key(|c| {
            prioritized_protocols
                .iter()
                .position(|p| p == &c.protocol_id)
                .unwrap_or(usize::MAX)
        })
}

fn collect_min_connections<'a>(
    node: &DeviceNode<'a>,
    prioritized_protocols: &[String],
    allowed_protocols: &[String],
    out: &mut Vec<&'a crate::module::capability::ServerCapability>,
) {
    if let Some(capability) = best_streaming_capability(node.capabilities, prioritized_protocols, allowed_protocols) {
        out.push(capability);
    }
    for child in &node.children {
        collect_min_connections(child, prioritized_protocols, allowed_protocols, out);
    }
}

fn collect_min_hops<'a>(
    node: &DeviceNode<'a>,
    prioritized_protocols: &[String],
    allowed_protocols: &[String],
    out: &mut Vec<&'a crate::module::capability::ServerCapability>,
) {
    if node.is_leaf() {
        if let Some(capability) = best_streaming_capability(node.capabilities, prioritized_protocols, allowed_protocols) {
            out.push(capability);
        }
        return;
    }
    for child in &node.children {
        collect_min_hops(child, prioritized_protocols, allowed_protocols, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_port_and_path() {
        let parsed = parse("daqref://192.168.0.1:7420/device/0").unwrap();
        assert_eq!(parsed.scheme, "daqref");
        assert_eq!(parsed.host, "192.168.0.1");
        assert_eq!(parsed.port, Some(7420));
        assert_eq!(parsed.path, "/device/0");
    }

    #[test]
    fn parses_without_port_or_path() {
        let parsed = parse("daqmock://localhost").unwrap();
        assert_eq!(parsed.port, None);
        assert_eq!(parsed.path, "");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(parse("192.168.0.1").is_err());
    }

    #[test]
    fn rejects_invalid_port() {
        assert!(parse("daqref://host:notaport").is_err());
    }

    #[test]
    fn smart_connect_scheme_is_recognized() {
        assert_eq!(SMART_CONNECT_SCHEME, "daq");
    }

    use crate::module::capability::ServerCapability;

    fn streaming_capability(protocol_id: &str) -> ServerCapability {
        ServerCapability::new(protocol_id, ProtocolType::Streaming, protocol_id)
    }

    fn configuration_capability() -> ServerCapability {
        ServerCapability::new("daq.config", ProtocolType::Configuration, "daq.config")
    }

    #[test]
    fn min_connections_attaches_one_source_per_device_with_capability() {
        let root_caps = vec![streaming_capability("daq.ns")];
        let child_a_caps = vec![streaming_capability("daq.ns")];
        let child_b_caps = vec![configuration_capability()];
        let tree = DeviceNode::with_children(
            &root_caps,
            vec![DeviceNode::leaf(&child_a_caps), DeviceNode::leaf(&child_b_caps)],
        );

        let sources = select_streaming_sources(StreamingConnectionHeuristic::MinConnections, &[], &[], &tree);
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn min_hops_attaches_one_source_per_leaf_subtree_with_capability() {
        let root_caps = vec![streaming_capability("daq.ns")];
        let child_a_caps = vec![streaming_capability("daq.ns")];
        let child_b_caps = vec![configuration_capability()];
        let tree = DeviceNode::with_children(
            &root_caps,
            vec![DeviceNode::leaf(&child_a_caps), DeviceNode::leaf(&child_b_caps)],
        );

        let sources = select_streaming_sources(StreamingConnectionHeuristic::MinHops, &[], &[], &tree);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].protocol_id, "daq.ns");
    }

    #[test]
    fn not_connected_attaches_nothing() {
        let caps = vec![streaming_capability("daq.ns")];
        let tree = DeviceNode::leaf(&caps);
        assert!(select_streaming_sources(StreamingConnectionHeuristic::NotConnected, &[], &[], &tree).is_empty());
        assert!(select_streaming_sources(StreamingConnectionHeuristic::NotConnectedButListed, &[], &[], &tree).is_empty());
    }

    #[test]
    fn prioritized_protocols_pick_the_best_capability_per_device() {
        let caps = vec![streaming_capability("daq.lt"), streaming_capability("daq.ns")];
        let tree = DeviceNode::leaf(&caps);
        let prioritized = vec!["daq.ns".to_string(), "daq.lt".to_string()];
        let sources = select_streaming_sources(StreamingConnectionHeuristic::MinConnections, &prioritized, &[], &tree);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].protocol_id, "daq.ns");
    }

    #[test]
    fn allowed_protocols_filters_out_disallowed_capabilities() {
        let caps = vec![streaming_capability("daq.lt")];
        let tree = DeviceNode::leaf(&caps);
        let allowed = vec!["daq.ns".to_string()];
        let sources = select_streaming_sources(StreamingConnectionHeuristic::MinConnections, &[], &allowed, &tree);
        assert!(sources.is_empty());
    }
}
