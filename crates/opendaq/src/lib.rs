//! Network-transparent data-acquisition middleware: a typed component
//! tree, a signal/packet pipeline, a pluggable module manager, and the
//! native config+streaming protocol that lets a client mirror a remote
//! device's tree in real time.

#![warn(missing_debug_implementations)]

pub mod component;
pub mod config;
pub mod config_protocol;
pub mod discovery;
pub mod error;
pub mod instance;
pub mod logging;
pub mod mirror;
pub mod module;
pub mod property;
pub mod scheduler;
pub mod signal;
pub mod supervisor;
pub mod type_manager;

pub use component::{Component, ComponentKind, ComponentRef, CoreEvent, CoreEventKind, EventBus, EventValue};
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use instance::Instance;
pub use property::{PropertyDescriptor, PropertyObject, PropertyValue, PropertyValueKind};

/// Crate version, exposed for protocol handshakes that want to report
/// their build alongside the negotiated wire version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_root_has_expected_local_id() {
        let instance = Instance::new("root", RuntimeConfig::default());
        assert_eq!(instance.root().local_id(), "root");
        assert_eq!(instance.root().global_id(), "/root");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
