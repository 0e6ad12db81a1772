//! Global configuration, single source of truth.
//!
//! Centralizes the tunables that would otherwise be hardcoded across the
//! scheduler, the config protocol and the connection supervisor, split
//! into two levels:
//!
//! - **Level 1 (Static)**: compile-time defaults (protocol versions, ports)
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`] for values an `Instance` may
//!   override at construction time.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Current native config protocol version this build speaks.
///
/// Handshake negotiates `min(client_max, server_max)`; operations declare
/// a minimum version and are rejected locally with
/// [`crate::Error::ServerVersionTooLow`] when the negotiated version is
/// lower.
pub const PROTOCOL_VERSION_MAX: u32 = 5;

/// First protocol version at which binary packet payloads may be carried
/// as a length-prefixed blob appended after the JSON header, instead of
/// base64-encoded inline.
pub const PROTOCOL_VERSION_BINARY_BLOBS: u32 = 4;

/// Minimum protocol version required by each request kind that isn't
/// available since v1. Anything absent from this table is available
/// unconditionally.
pub const MIN_VERSION_LOCK_DEVICE: u32 = 3;
/// Minimum version required for `AddComponent`/`RemoveComponent`.
pub const MIN_VERSION_DYNAMIC_COMPONENTS: u32 = 2;

/// Default per-client send-buffer capacity (packets), before the server
/// drops the slowest client with `ReconnectRequested`.
pub const DEFAULT_CLIENT_SEND_BUFFER: usize = 1024;

/// Default queue depth for a signal-to-input-port connection, before the
/// overflow policy kicks in.
pub const DEFAULT_CONNECTION_QUEUE_CAPACITY: usize = 1024;

/// Default reconnection period for the [`crate::supervisor::ConnectionSupervisor`];
/// overridable via `TransportLayerConfig.ReconnectionPeriod`.
pub const DEFAULT_RECONNECTION_PERIOD: Duration = Duration::from_millis(500);

/// Default time a buffered mirror core-event is allowed to wait for its
/// parent to materialize before being dropped with a warning.
pub const DEFAULT_EVENT_BUFFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout for a single config-protocol round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime-overridable configuration for an `Instance`.
///
/// Cheap to clone; every field is `Copy` or reference-counted so sharing
/// one `RuntimeConfig` across the scheduler, the supervisor and every
/// config-protocol connection never requires a lock.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Worker count for the packet-processing [`crate::scheduler::Scheduler`].
    pub scheduler_workers: NonZeroUsize,
    /// Per-client send buffer capacity (packets) on the config protocol server.
    pub client_send_buffer: usize,
    /// Reconnection period used by [`crate::supervisor::ConnectionSupervisor`].
    pub reconnection_period: Duration,
    /// How long a buffered core-event notification waits for its parent.
    pub event_buffer_timeout: Duration,
    /// Default timeout for a single config-protocol request.
    pub request_timeout: Duration,
    /// Maximum number of concurrently admitted config connections, 0 = unbounded.
    pub max_config_connections: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scheduler_workers: std::thread::available_parallelism()
                .unwrap_or(NonZeroUsize::new(4).expect("4 is nonzero")),
            client_send_buffer: DEFAULT_CLIENT_SEND_BUFFER,
            reconnection_period: DEFAULT_RECONNECTION_PERIOD,
            event_buffer_timeout: DEFAULT_EVENT_BUFFER_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_config_connections: 0,
        }
    }
}

impl RuntimeConfig {
    /// Start from defaults; used by tests to tune a single knob inline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
