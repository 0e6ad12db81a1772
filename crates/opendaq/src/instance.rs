//! The root object an application constructs: owns the component tree,
//! the type manager and the module manager, and persists/restores state.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentKind, EventBus};
use crate::config::{RuntimeConfig, DEFAULT_CONNECTION_QUEUE_CAPACITY};
use crate::error::Result;
use crate::module::ModuleManager;
use crate::signal::OverflowPolicy;
use crate::type_manager::TypeManager;

/// Root of an openDAQ application: one component tree, one type
/// manager, one module manager, sharing one `RuntimeConfig`.
pub struct Instance {
    root: Arc<Component>,
    type_manager: TypeManager,
    module_manager: ModuleManager,
    config: RuntimeConfig,
}

/// On-disk representation of persisted instance state: just the
/// property values under each global id, plus which devices were
/// connected, restorable against a freshly built tree.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct PersistedState {
    pub property_values: Vec<PersistedProperty>,
    pub connected_devices: Vec<String>,
    /// Signal-to-input-port connections, by global id on both ends, so
    /// restoration can reconnect them regardless of the order components
    /// are recreated in.
    #[serde(default)]
    pub connections: Vec<PersistedConnection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedProperty {
    pub global_id: String,
    pub property: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedConnection {
    pub signal_global_id: String,
    pub input_port_global_id: String,
}

impl Instance {
    #[must_use]
    pub fn new(root_local_id: impl Into<String>, config: RuntimeConfig) -> Self {
        let events = EventBus::new();
        let root = Component::new(root_local_id, ComponentKind::Folder, events);
        Self {
            root,
            type_manager: TypeManager::new(),
            module_manager: ModuleManager::new(),
            config,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Arc<Component> {
        &self.root
    }

    #[must_use]
    pub fn type_manager(&self) -> &TypeManager {
        &self.type_manager
    }

    #[must_use]
    pub fn module_manager(&self) -> &ModuleManager {
        &self.module_manager
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Add a device under the root by connection string, dispatching
    /// through the module manager.
    pub fn add_device(&self, connection_string: &str, local_id: &str) -> Result<Arc<Component>> {
        let config = self.module_manager.create_default_add_device_config();
        let device = self.module_manager.add_device(connection_string, local_id, &config)?;
        self.root.add_component(device.clone())?;
        Ok(device)
    }

    /// Snapshot every property value in the tree into a flat,
    /// self-describing persisted state.
    #[must_use]
    pub fn save(&self) -> PersistedState {
        let mut property_values = Vec::new();
        collect_properties(&self.root, &mut property_values);
        let mut connections = Vec::new();
        collect_connections(&self.root, &mut connections);
        PersistedState {
            property_values,
            connected_devices: device_global_ids(&self.root),
            connections,
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = self.save();
        let json = serde_json::to_string_pretty(&state)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore property values from a previously saved state, merging
    /// onto the current tree rather than replacing it. Devices named in
    /// `connected_devices` that aren't already present are re-added only
    /// if `re_add_devices_enabled` is set, matching the
    /// `ReAddDevicesEnabled` configuration key.
    pub fn load(&self, state: &PersistedState, re_add_devices_enabled: bool) -> Result<()> {
        if re_add_devices_enabled {
            for global_id in &state.connected_devices {
                if find_by_global_id(&self.root, global_id).is_none() {
                    tracing::warn!(global_id, "persisted device not reconnected: no connection string retained");
                }
            }
        }
        for property in &state.property_values {
            let Some(component) = find_by_global_id(&self.root, &property.global_id) else {
                tracing::warn!(global_id = %property.global_id, "skipping persisted property for missing component");
                continue;
            };
            let value = crate::property::from_json(&property.value);
            if let Err(err) = component.set_property_value_protected(&property.property, value) {
                tracing::warn!(error = %err, global_id = %property.global_id, property = %property.property, "failed to restore property");
            }
        }
        // Reconnect by global id in a second pass, after every component
        // named in this state has had the chance to exist: this makes
        // restoration order-independent, including circular chains
        // (fb1 -> fb2 -> fb3 -> fb1).
        for connection in &state.connections {
            let Some(signal) = find_by_global_id(&self.root, &connection.signal_global_id) else {
                tracing::warn!(global_id = %connection.signal_global_id, "skipping persisted connection: signal missing");
                continue;
            };
            let Some(port) = find_by_global_id(&self.root, &connection.input_port_global_id) else {
                tracing::warn!(global_id = %connection.input_port_global_id, "skipping persisted connection: input port missing");
                continue;
            };
            if let Err(err) = port.connect_signal(&signal, DEFAULT_CONNECTION_QUEUE_CAPACITY, OverflowPolicy::DropNewest) {
                tracing::warn!(
                    error = %err,
                    signal = %connection.signal_global_id,
                    input_port = %connection.input_port_global_id,
                    "failed to restore connection"
                );
            }
        }
        Ok(())
    }

    pub fn load_from_file(&self, path: impl AsRef<Path>, re_add_devices_enabled: bool) -> Result<()> {
        let json = std::fs::read_to_string(path)?;
        let state: PersistedState = serde_json::from_str(&json)?;
        self.load(&state, re_add_devices_enabled)
    }
}

fn collect_properties(component: &Arc<Component>, out: &mut Vec<PersistedProperty>) {
    let global_id = component.global_id();
    for descriptor in component.properties().properties() {
        if let Ok(value) = component.get_property_value(&descriptor.name) {
            out.push(PersistedProperty {
                global_id: global_id.clone(),
                property: descriptor.name.clone(),
                value: crate::property::to_json(&value),
            });
        }
    }
    for child in component.children() {
        collect_properties(&child, out);
    }
}

fn collect_connections(component: &Arc<Component>, out: &mut Vec<PersistedConnection>) {
    if let ComponentKind::InputPort(port) = &*component.kind.read() {
        if let Some(signal_global_id) = port.source_signal_global_id() {
            out.push(PersistedConnection {
                signal_global_id,
                input_port_global_id: component.global_id(),
            });
        }
    }
    for child in component.children() {
        collect_connections(&child, out);
    }
}

fn device_global_ids(component: &Arc<Component>) -> Vec<String> {
    let mut out = Vec::new();
    if matches!(*component.kind.read(), ComponentKind::Device(_)) {
        out.push(component.global_id());
    }
    for child in component.children() {
        out.extend(device_global_ids(&child));
    }
    out
}

fn find_by_global_id(root: &Arc<Component>, global_id: &str) -> Option<Arc<Component>> {
    if root.global_id() == global_id {
        return Some(root.clone());
    }
    for child in root.children() {
        if let Some(found) = find_by_global_id(&child, global_id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyDescriptor, PropertyValue};

    #[test]
    fn save_to_file_then_load_from_file_restores_property_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let instance = Instance::new("dev", RuntimeConfig::default());
        instance
            .root()
            .add_property(PropertyDescriptor::new("Gain", PropertyValue::Float(1.0)))
            .unwrap();
        instance.root().set_property_value("Gain", PropertyValue::Float(2.5)).unwrap();
        instance.save_to_file(&path).unwrap();

        let restored = Instance::new("dev", RuntimeConfig::default());
        restored
            .root()
            .add_property(PropertyDescriptor::new("Gain", PropertyValue::Float(1.0)))
            .unwrap();
        restored.load_from_file(&path, false).unwrap();

        match restored.root().get_property_value("Gain").unwrap() {
            PropertyValue::Float(v) => assert!((v - 2.5).abs() < f64::EPSILON),
            other => panic!("expected Float, got {other:?}"),
        }
    }

    #[test]
    fn load_from_file_warns_but_does_not_fail_on_a_missing_component() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            serde_json::to_string(&PersistedState {
                property_values: vec![PersistedProperty {
                    global_id: "/dev/NoSuchChild".to_string(),
                    property: "Gain".to_string(),
                    value: serde_json::json!(1.0),
                }],
                connected_devices: Vec::new(),
                connections: Vec::new(),
            })
            .unwrap(),
        )
        .unwrap();

        let instance = Instance::new("dev", RuntimeConfig::default());
        assert!(instance.load_from_file(&path, false).is_ok());
    }
}
