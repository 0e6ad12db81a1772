//! The native config+streaming protocol: wire framing, client-type
//! admission, and the server/client halves that speak it.

pub mod admission;
pub mod client;
pub mod message;
pub mod packet_transport;
pub mod server;
pub mod transport;

pub use admission::{AdmissionTable, ClientType, DropOthersPolicy};
pub use client::ConfigProtocolClient;
pub use message::{Frame, FrameKind, ReplyPayload, RequestPayload};
pub use packet_transport::PacketTransport;
pub use server::{ClientConnection, ConfigProtocolServer};
pub use transport::{connect, serve_connection};
