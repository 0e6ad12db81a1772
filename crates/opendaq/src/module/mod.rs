//! Pluggable device/function-block providers, plus the manager and
//! connection-string resolver that tie them into an `Instance`.

pub mod capability;
pub mod manager;
pub mod module_trait;
pub mod resolver;

pub use capability::{AddressInfo, ConnectionType, ProtocolType, ServerCapability};
pub use manager::ModuleManager;
pub use module_trait::{Module, TypeInfo};
pub use resolver::{DeviceNode, ParsedConnectionString, StreamingConnectionHeuristic};
