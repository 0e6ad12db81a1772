//! The signal/packet pipeline: descriptors, packets, ports, connections,
//! and the signal and reader types that tie them together.

pub mod connection;
pub mod descriptor;
pub mod packet;
pub mod port;
pub mod reader;
#[allow(clippy::module_inception)]
pub mod signal;

pub use connection::{Connection, OverflowPolicy};
pub use descriptor::{DataDescriptor, Dimension, Rule, SampleType, ScalingRule};
pub use packet::{DataPacket, EventPacket, Packet};
pub use port::{InputPortExt, NotificationMode, NotifyCallback, PortNotification};
pub use reader::{ReadResult, Reader};
pub use signal::SignalExt;
