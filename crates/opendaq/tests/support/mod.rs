//! A minimal in-process device module used to exercise the module
//! manager's pluggability end to end, without any real hardware or
//! network I/O. Not part of the public API.

use std::sync::Arc;

use opendaq::component::{Component, ComponentKind, EventBus};
use opendaq::error::{Error, Result};
use opendaq::module::{Module, TypeInfo};
use opendaq::property::PropertyObject;
use opendaq::signal::{DataDescriptor, Rule, SampleType};
use opendaq::component::specialized::{ChannelExt, DeviceExt, DeviceInfo};
use opendaq::component::ComponentRef;

/// Accepts `daqmock://<anything>` and builds a device with `channel_count`
/// channels, each carrying one signal following the `UniqueId_N` naming
/// scheme.
pub struct MockDeviceModule {
    pub channel_count: usize,
}

impl Module for MockDeviceModule {
    fn name(&self) -> &str {
        "MockDeviceModule"
    }

    fn available_device_types(&self) -> Vec<TypeInfo> {
        vec![TypeInfo {
            id: "mock_device".to_string(),
            name: "Mock Device".to_string(),
            description: "In-process test fixture".to_string(),
        }]
    }

    fn available_function_block_types(&self) -> Vec<TypeInfo> {
        Vec::new()
    }

    fn accepts_connection_string(&self, connection_string: &str) -> bool {
        connection_string.starts_with("daqmock://")
    }

    fn create_device(&self, connection_string: &str, local_id: &str, _config: &PropertyObject) -> Result<ComponentRef> {
        if !self.accepts_connection_string(connection_string) {
            return Err(Error::InvalidParameter(connection_string.to_string()));
        }
        let events = EventBus::new();
        let device = Component::new(
            local_id,
            ComponentKind::Device(DeviceExt::new(DeviceInfo {
                name: "Mock Device".to_string(),
                manufacturer: "openDAQ test fixtures".to_string(),
                serial_number: "MOCK-0001".to_string(),
                model: "mock".to_string(),
                custom: Default::default(),
            })),
            events.clone(),
        );

        let channels = Component::new("Ch", ComponentKind::Folder, events.clone());
        device.add_component(channels.clone())?;

        for i in 0..self.channel_count {
            let channel = Component::new(
                format!("Ch{i}"),
                ComponentKind::Channel(ChannelExt::default()),
                events.clone(),
            );
            let signals = Component::new("Sig", ComponentKind::Folder, events.clone());
            channel.add_component(signals.clone())?;

            let signal = Component::new(
                format!("UniqueId_{i}"),
                ComponentKind::Signal(opendaq::signal::SignalExt::new()),
                events.clone(),
            );
            if let ComponentKind::Signal(sig) = &*signal.kind.read() {
                sig.set_descriptor(DataDescriptor::new(
                    format!("UniqueId_{i}"),
                    SampleType::Float64,
                    Rule::Explicit,
                ))?;
            }
            signals.add_component(signal)?;
            channels.add_component(channel)?;
        }

        Ok(device)
    }

    fn create_function_block(&self, type_id: &str, _local_id: &str, _config: &PropertyObject) -> Result<ComponentRef> {
        Err(Error::NotFound(type_id.to_string()))
    }
}

#[allow(dead_code)]
pub fn mock_manager(channel_count: usize) -> Arc<opendaq::module::ModuleManager> {
    let manager = Arc::new(opendaq::module::ModuleManager::new());
    manager.add_module(Arc::new(MockDeviceModule { channel_count }));
    manager
}
