//! Connection supervisor: owns the reconnect loop for a mirrored
//! device's configuration and streaming connections, and republishes
//! their status as core events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::warn;

use crate::component::Component;
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

/// Status of the configuration connection to a mirrored device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationStatus {
    Connected,
    Reconnecting,
    Unrecoverable,
}

/// Status of one streaming source, keyed by `StreamingStatus_<protocol>_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingStatus {
    Connected,
    Reconnecting,
    Unrecoverable,
}

/// Watches one device's connections, retrying on failure until the
/// device is explicitly removed.
pub struct ConnectionSupervisor {
    device: Arc<Component>,
    connection_string: String,
    config: RuntimeConfig,
    configuration_status: RwLock<ConfigurationStatus>,
    streaming_statuses: RwLock<HashMap<String, StreamingStatus>>,
    removed: std::sync::atomic::AtomicBool,
}

impl ConnectionSupervisor {
    #[must_use]
    pub fn new(device: Arc<Component>, connection_string: impl Into<String>, config: RuntimeConfig) -> Self {
        Self {
            device,
            connection_string: connection_string.into(),
            config,
            configuration_status: RwLock::new(ConfigurationStatus::Connected),
            streaming_statuses: RwLock::new(HashMap::new()),
            removed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn configuration_status(&self) -> ConfigurationStatus {
        *self.configuration_status.read()
    }

    fn set_configuration_status(&self, status: ConfigurationStatus) {
        *self.configuration_status.write() = status;
        self.publish_status_changed("ConfigurationStatus", None, status_name(status));
    }

    pub fn set_streaming_status(&self, key: impl Into<String>, status: StreamingStatus) {
        let key = key.into();
        self.streaming_statuses.write().insert(key.clone(), status);
        self.publish_status_changed(&format!("StreamingStatus_{key}"), Some(key.as_str()), streaming_status_name(status));
    }

    fn publish_status_changed(&self, status_name: &str, streaming_object: Option<&str>, value: &str) {
        let _ = self.device.set_status(status_name, value);
        self.device
            .publish_connection_status_changed(status_name, &self.connection_string, streaming_object, value);
    }

    /// Fail fast on a write attempted while the device is reconnecting,
    /// rather than queuing it silently.
    pub fn check_writable(&self) -> Result<()> {
        if self.configuration_status() == ConfigurationStatus::Reconnecting {
            Err(Error::ConnectionLost(self.device.global_id()))
        } else {
            Ok(())
        }
    }

    pub fn mark_removed(&self) {
        self.removed.store(true, std::sync::atomic::Ordering::Release);
    }

    /// Run the reconnect loop. `connect` attempts one connection and
    /// returns once it drops; the supervisor retries unboundedly at
    /// `config.reconnection_period` until `mark_removed` is called.
    pub async fn run<F, Fut>(&self, mut connect: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        loop {
            if self.removed.load(std::sync::atomic::Ordering::Acquire) {
                return;
            }
            self.set_configuration_status(ConfigurationStatus::Connected);
            if let Err(err) = connect().await {
                warn!(error = %err, global_id = %self.device.global_id(), "connection dropped, reconnecting");
            }
            if self.removed.load(std::sync::atomic::Ordering::Acquire) {
                return;
            }
            self.set_configuration_status(ConfigurationStatus::Reconnecting);
            tokio::time::sleep(reconnection_period(&self.config)).await;
        }
    }
}

fn reconnection_period(config: &RuntimeConfig) -> Duration {
    config.reconnection_period
}

fn status_name(status: ConfigurationStatus) -> &'static str {
    match status {
        ConfigurationStatus::Connected => "Connected",
        ConfigurationStatus::Reconnecting => "Reconnecting",
        ConfigurationStatus::Unrecoverable => "Unrecoverable",
    }
}

fn streaming_status_name(status: StreamingStatus) -> &'static str {
    match status {
        StreamingStatus::Connected => "Connected",
        StreamingStatus::Reconnecting => "Reconnecting",
        StreamingStatus::Unrecoverable => "Unrecoverable",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentKind, EventBus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn device() -> Arc<Component> {
        Component::new("dev0", ComponentKind::Folder, EventBus::new())
    }

    #[test]
    fn check_writable_fails_fast_while_reconnecting() {
        let supervisor = ConnectionSupervisor::new(device(), "daqref://local", RuntimeConfig::default());
        assert!(supervisor.check_writable().is_ok());
        supervisor.set_configuration_status(ConfigurationStatus::Reconnecting);
        assert!(matches!(supervisor.check_writable(), Err(Error::ConnectionLost(_))));
    }

    #[test]
    fn status_changes_publish_connection_status_events() {
        let dev = device();
        let supervisor = ConnectionSupervisor::new(dev.clone(), "daqref://local", RuntimeConfig::default());

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        dev.on_core_event().subscribe(move |event| {
            if event.kind == crate::component::CoreEventKind::ConnectionStatusChanged {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        supervisor.set_configuration_status(ConfigurationStatus::Reconnecting);
        supervisor.set_streaming_status("daq.lt_0", StreamingStatus::Connected);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mark_removed_stops_check_writable_from_mattering_once_run_exits() {
        let supervisor = ConnectionSupervisor::new(device(), "daqref://local", RuntimeConfig::default());
        assert!(!supervisor.removed.load(Ordering::Acquire));
        supervisor.mark_removed();
        assert!(supervisor.removed.load(Ordering::Acquire));
    }
}
