//! A mirrored device's view of the streaming sources it can pull
//! packets from, alongside its configuration connection.

use crate::module::ServerCapability;

/// One streaming endpoint a mirrored device has available, distinct
/// from the configuration connection used to read/write properties.
#[derive(Debug, Clone)]
pub struct StreamingSource {
    pub capability: ServerCapability,
    pub active: bool,
}

/// Tracks a mirrored device's streaming sources and which one is
/// currently delivering packets.
#[derive(Default)]
pub struct MirrorDevice {
    pub streaming_sources: Vec<StreamingSource>,
    pub active_streaming_source: Option<usize>,
}

impl MirrorDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_streaming_source(&mut self, capability: ServerCapability) {
        self.streaming_sources.push(StreamingSource { capability, active: false });
    }

    /// Switch the active streaming source, deactivating any previous one.
    pub fn activate(&mut self, index: usize) -> bool {
        if index >= self.streaming_sources.len() {
            return false;
        }
        for (i, source) in self.streaming_sources.iter_mut().enumerate() {
            source.active = i == index;
        }
        self.active_streaming_source = Some(index);
        true
    }
}
