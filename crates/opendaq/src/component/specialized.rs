//! Per-kind payloads carried inside [`crate::component::ComponentKind`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Identifies the user holding a device lock, or `None` for the
/// anonymous convention (a lock taken by a client that never
/// authenticated). Two `None`s are considered the same caller for
/// unlock purposes.
pub type UserId = Option<String>;

/// Network-facing identity and capability advertisement for a device.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub name: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub model: String,
    pub custom: HashMap<String, String>,
}

/// One client currently connected to this device's config protocol
/// server.
#[derive(Debug, Clone)]
pub struct ConnectedClientInfo {
    pub address: String,
    /// `None` for a pre-handshake connection or a client that never
    /// supplied a host name; never synthesized.
    pub host_name: Option<String>,
    pub is_control: bool,
}

/// Device-specific state: lock ownership, connected clients, and the
/// streaming/configuration endpoints this device exposes as a server.
#[derive(Default)]
pub struct DeviceExt {
    pub info: RwLock<DeviceInfo>,
    lock_owner: RwLock<Option<UserId>>,
    lock_depth: RwLock<u32>,
    pub connected_clients: RwLock<Vec<ConnectedClientInfo>>,
}

impl DeviceExt {
    #[must_use]
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info: RwLock::new(info),
            lock_owner: RwLock::new(None),
            lock_depth: RwLock::new(0),
            connected_clients: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        *self.lock_depth.read() > 0
    }

    #[must_use]
    pub fn lock_owner(&self) -> UserId {
        self.lock_owner.read().clone().flatten()
    }

    /// Acquire the lock for `user`. Nested locks by the same user are
    /// additive; a different user is rejected while held.
    pub fn lock(&self, user: UserId) -> Result<()> {
        let mut owner = self.lock_owner.write();
        let mut depth = self.lock_depth.write();
        if *depth > 0 && *owner != Some(user.clone()) {
            return Err(Error::DeviceLocked(format!("{owner:?}")));
        }
        *owner = Some(user);
        *depth += 1;
        Ok(())
    }

    /// Release one level of the lock held by `user`; the caller's id
    /// must match the owner (`None` matches `None`).
    pub fn unlock(&self, user: &UserId) -> Result<()> {
        let mut owner = self.lock_owner.write();
        let mut depth = self.lock_depth.write();
        if *depth == 0 {
            return Ok(());
        }
        if owner.as_ref() != Some(user) {
            return Err(Error::AccessDenied("unlock by non-owner".to_string()));
        }
        *depth -= 1;
        if *depth == 0 {
            *owner = None;
        }
        Ok(())
    }

    /// Check whether `user` may mutate this device: unlocked, or locked
    /// by `user` itself.
    pub fn check_write_allowed(&self, user: &UserId) -> Result<()> {
        let owner = self.lock_owner.read();
        if *owner == None || owner.as_ref() == Some(user) {
            Ok(())
        } else {
            Err(Error::DeviceLocked(format!("{owner:?}")))
        }
    }
}

/// Function-block specific metadata (type id only; properties and
/// signals live on the owning [`crate::component::Component`]).
#[derive(Default)]
pub struct FunctionBlockExt {
    pub type_id: String,
}

impl FunctionBlockExt {
    #[must_use]
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
        }
    }
}

/// Channel specific metadata: whether the underlying physical channel
/// is still active (distinct from the component `active` attribute,
/// which a client may toggle independently).
pub struct ChannelExt {
    pub hardware_active: AtomicBool,
}

impl Default for ChannelExt {
    fn default() -> Self {
        Self {
            hardware_active: AtomicBool::new(true),
        }
    }
}

impl ChannelExt {
    #[must_use]
    pub fn hardware_active(&self) -> bool {
        self.hardware_active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_locks_by_the_same_user_are_additive() {
        let device = DeviceExt::new(DeviceInfo::default());
        let user = Some("alice".to_string());
        device.lock(user.clone()).unwrap();
        device.lock(user.clone()).unwrap();
        assert!(device.is_locked());
        device.unlock(&user).unwrap();
        assert!(device.is_locked());
        device.unlock(&user).unwrap();
        assert!(!device.is_locked());
    }

    #[test]
    fn lock_by_a_different_user_is_rejected() {
        let device = DeviceExt::new(DeviceInfo::default());
        device.lock(Some("alice".to_string())).unwrap();
        let err = device.lock(Some("bob".to_string())).unwrap_err();
        assert!(matches!(err, Error::DeviceLocked(_)));
    }

    #[test]
    fn anonymous_lock_and_unlock_match_each_other() {
        let device = DeviceExt::new(DeviceInfo::default());
        device.lock(None).unwrap();
        assert!(device.is_locked());
        device.unlock(&None).unwrap();
        assert!(!device.is_locked());
    }

    #[test]
    fn unlock_by_non_owner_is_denied() {
        let device = DeviceExt::new(DeviceInfo::default());
        device.lock(Some("alice".to_string())).unwrap();
        let err = device.unlock(&Some("bob".to_string())).unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
    }
}
