//! Streams subscribed signal packets to mirror clients alongside the
//! config connection's request/reply traffic, tagging each with a
//! monotonically increasing per-signal sequence number.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::signal::Packet;

/// Assigns and tracks per-signal sequence numbers for one connection's
/// packet stream, so a mirror client can detect drops.
#[derive(Default)]
pub struct PacketTransport {
    sequence_numbers: Mutex<HashMap<String, AtomicU64>>,
}

/// A packet tagged with the sequence number it carries on this
/// connection.
pub struct SequencedPacket {
    pub signal_global_id: String,
    pub sequence_number: u64,
    pub packet: Packet,
}

impl PacketTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `packet`, assigning the next sequence number for
    /// `signal_global_id` on this connection.
    pub fn next(&self, signal_global_id: &str, packet: Packet) -> SequencedPacket {
        let mut table = self.sequence_numbers.lock();
        let counter = table
            .entry(signal_global_id.to_string())
            .or_insert_with(|| AtomicU64::new(0));
        let sequence_number = counter.fetch_add(1, Ordering::Relaxed);
        SequencedPacket {
            signal_global_id: signal_global_id.to_string(),
            sequence_number,
            packet,
        }
    }
}
