//! Error taxonomy shared across the component tree, signal pipeline and
//! config protocol.

use thiserror::Error;

/// Surface error kinds raised by openDAQ operations.
///
/// Every variant that originates from an operation on the component tree
/// carries the global id of the component involved, so callers and log
/// lines never have to guess which node failed.
#[derive(Debug, Error)]
pub enum Error {
    /// Null/empty required argument, or an unknown connection-string scheme.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unknown device type, function-block type, property or component.
    #[error("not found: {0}")]
    NotFound(String),

    /// `localId` collision among siblings, or a second Exclusive-Control admission.
    #[error("duplicate item: {0}")]
    DuplicateItem(String),

    /// A value failed type conversion, validation or coercion.
    #[error("invalid value for `{property}`: {reason}")]
    InvalidValue {
        /// Global id of the property object plus the property name.
        property: String,
        /// Human-readable reason (validator/coercer message, or type mismatch).
        reason: String,
    },

    /// Read-only write, or unlock attempted by a non-owner.
    #[error("access denied on `{0}`")]
    AccessDenied(String),

    /// Write/lock/unlock blocked by an active lock held by another user.
    #[error("device locked: `{0}`")]
    DeviceLocked(String),

    /// Operation attempted on a component after `remove()`.
    #[error("component removed: `{0}`")]
    ComponentRemoved(String),

    /// Network operation attempted while `ConfigurationStatus` is `Reconnecting`.
    #[error("connection lost: `{0}`")]
    ConnectionLost(String),

    /// Bad credentials, or anonymous access disallowed by the server.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Client-type admission denied.
    #[error("control client rejected: `{0}`")]
    ControlClientRejected(String),

    /// Server `MaxAllowedConfigConnections` reached.
    #[error("connection limit reached ({0} connections)")]
    ConnectionLimitReached(usize),

    /// Requested operation's minimum protocol version exceeds the negotiated one.
    #[error("server version too low: operation requires >= {required}, negotiated {negotiated}")]
    ServerVersionTooLow {
        /// Minimum version the operation declares.
        required: u32,
        /// Version actually negotiated during handshake.
        negotiated: u32,
    },

    /// `InputPort` acceptance predicate refused a signal.
    #[error("signal not accepted: `{0}`")]
    SignalNotAccepted(String),

    /// A batch operation (e.g. `addDevices`) returned a per-item mixture of
    /// successes and failures.
    #[error("partial success: {succeeded} succeeded, {failed} failed")]
    PartialSuccess {
        /// Number of items that succeeded.
        succeeded: usize,
        /// Number of items that failed.
        failed: usize,
    },

    /// Transport-level I/O failure (socket, framing, handshake).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire payload failed to encode/decode.
    #[error("protocol codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
