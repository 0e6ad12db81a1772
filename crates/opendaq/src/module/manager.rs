//! Ordered registry of [`Module`] implementations and the device-add
//! entry point that dispatches across them by connection-string scheme.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::Component;
use crate::error::{Error, Result};
use crate::module::capability::ServerCapability;
use crate::module::module_trait::Module;
use crate::module::resolver::{self, StreamingConnectionHeuristic};
use crate::property::{PropertyDescriptor, PropertyObject, PropertyValue};

/// Holds modules in registration order; later modules are tried only
/// after earlier ones decline a connection string.
#[derive(Default)]
pub struct ModuleManager {
    modules: RwLock<Vec<Arc<dyn Module>>>,
}

impl ModuleManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&self, module: Arc<dyn Module>) {
        self.modules.write().push(module);
    }

    /// Build the default `General`/`Device`/`Streaming` grouped
    /// configuration object `addDevice` accepts, with the full set of
    /// documented keys pre-populated from their defaults.
    #[must_use]
    pub fn create_default_add_device_config(&self) -> PropertyObject {
        let config = PropertyObject::new();
        let general = PropertyObject::new();
        let _ = general.add_property(PropertyDescriptor::new(
            "AutomaticallyLockDevice",
            PropertyValue::Bool(false),
        ));
        let _ = general.add_property(PropertyDescriptor::new("Username", PropertyValue::String(String::new())));
        let _ = general.add_property(PropertyDescriptor::new("Password", PropertyValue::String(String::new())));

        let device = PropertyObject::new();
        let _ = device.add_property(PropertyDescriptor::new(
            "ReAddDevicesEnabled",
            PropertyValue::Bool(true),
        ));

        let streaming = PropertyObject::new();
        let _ = streaming.add_property(PropertyDescriptor::new(
            "StreamingConnectionHeuristic",
            PropertyValue::Int(StreamingConnectionHeuristic::MinConnections as i64),
        ));
        let _ = streaming.add_property(PropertyDescriptor::new(
            "PrioritizedStreamingProtocols",
            PropertyValue::List(Vec::new()),
        ));
        let _ = streaming.add_property(PropertyDescriptor::new(
            "AllowedStreamingProtocols",
            PropertyValue::List(Vec::new()),
        ));

        let _ = config.add_property(PropertyDescriptor::new("General", PropertyValue::Object(Arc::new(general))));
        let _ = config.add_property(PropertyDescriptor::new("Device", PropertyValue::Object(Arc::new(device))));
        let _ = config.add_property(PropertyDescriptor::new("Streaming", PropertyValue::Object(Arc::new(streaming))));
        config
    }

    /// Collect every capability every registered module reports via its
    /// own discovery mechanism, folding streaming-only capabilities per
    /// the default heuristic.
    #[must_use]
    pub fn available_devices(&self) -> Vec<ServerCapability> {
        self.modules.read().iter().flat_map(|m| m.available_devices()).collect()
    }

    /// Add a device by connection string, trying each module in order
    /// until one accepts the scheme.
    pub fn add_device(&self, connection_string: &str, local_id: &str, config: &PropertyObject) -> Result<Arc<Component>> {
        if connection_string.starts_with(&format!("{}://", resolver::SMART_CONNECT_SCHEME)) {
            return self.add_device_smart_connect(connection_string, local_id, config);
        }
        for module in self.modules.read().iter() {
            if module.accepts_connection_string(connection_string) {
                return module.create_device(connection_string, local_id, config);
            }
        }
        Err(Error::InvalidParameter(format!(
            "no module accepts connection string `{connection_string}`"
        )))
    }

    fn add_device_smart_connect(&self, connection_string: &str, local_id: &str, config: &PropertyObject) -> Result<Arc<Component>> {
        let parsed = resolver::parse(connection_string)?;
        for module in self.modules.read().iter() {
            let candidate = format!("daqref://{}", parsed.host);
            if module.accepts_connection_string(&candidate) {
                return module.create_device(&candidate, local_id, config);
            }
        }
        Err(Error::InvalidParameter(format!(
            "smart-connect found no module for host `{}`",
            parsed.host
        )))
    }

    pub fn create_function_block(&self, type_id: &str, local_id: &str, config: &PropertyObject) -> Result<Arc<Component>> {
        for module in self.modules.read().iter() {
            if module.available_function_block_types().iter().any(|t| t.id == type_id) {
                return module.create_function_block(type_id, local_id, config);
            }
        }
        Err(Error::NotFound(format!("function block type `{type_id}`")))
    }
}
