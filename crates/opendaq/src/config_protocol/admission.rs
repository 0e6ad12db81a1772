//! Client-type admission: who may write, and what happens when a
//! stronger client shows up.

use crate::error::{Error, Result};

/// The access level a config-protocol connection negotiated at
/// handshake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    /// Read-only: subscribes to values and events, issues no writes.
    ViewOnly,
    /// May write properties and call procedures/functions.
    Control,
    /// Like `Control`, but admission evicts every other `Control`
    /// client with `ReconnectRequested` unless they were configured
    /// with `DropOthers = false`.
    ExclusiveControl,
}

/// Behavior when an `ExclusiveControl` client connects while others are
/// already admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOthersPolicy {
    /// Evict every other `Control`/`ExclusiveControl` client.
    DropOthers,
    /// Reject the new connection instead of evicting anyone.
    RejectIfOthersPresent,
}

/// Tracks which client types currently hold a slot, and arbitrates a
/// newly connecting client's admission request.
#[derive(Debug, Default)]
pub struct AdmissionTable {
    control_holders: Vec<u64>,
    exclusive_holder: Option<u64>,
}

/// Outcome of admitting a new client: whether it was let in, and which
/// previously-admitted connection ids must now be dropped.
#[derive(Debug, Clone)]
pub struct AdmissionResult {
    pub admitted: bool,
    pub evict: Vec<u64>,
}

impl AdmissionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, connection_id: u64, client_type: ClientType, policy: DropOthersPolicy) -> Result<AdmissionResult> {
        match client_type {
            ClientType::ViewOnly => Ok(AdmissionResult {
                admitted: true,
                evict: Vec::new(),
            }),
            ClientType::Control => {
                if self.exclusive_holder.is_some() {
                    return Err(Error::ControlClientRejected(
                        "an ExclusiveControl client already holds the device".to_string(),
                    ));
                }
                self.control_holders.push(connection_id);
                Ok(AdmissionResult {
                    admitted: true,
                    evict: Vec::new(),
                })
            }
            ClientType::ExclusiveControl => {
                let others: Vec<u64> = self
                    .control_holders
                    .iter()
                    .copied()
                    .chain(self.exclusive_holder)
                    .collect();
                if !others.is_empty() && policy == DropOthersPolicy::RejectIfOthersPresent {
                    return Err(Error::ControlClientRejected(
                        "other control clients already connected".to_string(),
                    ));
                }
                self.control_holders.clear();
                self.exclusive_holder = Some(connection_id);
                Ok(AdmissionResult {
                    admitted: true,
                    evict: others,
                })
            }
        }
    }

    pub fn release(&mut self, connection_id: u64) {
        self.control_holders.retain(|id| *id != connection_id);
        if self.exclusive_holder == Some(connection_id) {
            self.exclusive_holder = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_only_clients_are_always_admitted() {
        let mut table = AdmissionTable::new();
        let result = table.admit(1, ClientType::ViewOnly, DropOthersPolicy::DropOthers).unwrap();
        assert!(result.admitted);
        assert!(result.evict.is_empty());
    }

    #[test]
    fn exclusive_control_evicts_existing_control_clients_with_drop_others() {
        let mut table = AdmissionTable::new();
        table.admit(1, ClientType::Control, DropOthersPolicy::DropOthers).unwrap();
        table.admit(2, ClientType::Control, DropOthersPolicy::DropOthers).unwrap();
        let result = table.admit(3, ClientType::ExclusiveControl, DropOthersPolicy::DropOthers).unwrap();
        assert_eq!(result.evict.len(), 2);
        assert!(result.evict.contains(&1));
        assert!(result.evict.contains(&2));
    }

    #[test]
    fn exclusive_control_rejects_when_others_present_and_policy_forbids() {
        let mut table = AdmissionTable::new();
        table.admit(1, ClientType::Control, DropOthersPolicy::DropOthers).unwrap();
        let err = table
            .admit(2, ClientType::ExclusiveControl, DropOthersPolicy::RejectIfOthersPresent)
            .unwrap_err();
        assert!(matches!(err, Error::ControlClientRejected(_)));
    }

    #[test]
    fn control_rejected_while_exclusive_control_holds_device() {
        let mut table = AdmissionTable::new();
        table.admit(1, ClientType::ExclusiveControl, DropOthersPolicy::DropOthers).unwrap();
        let err = table.admit(2, ClientType::Control, DropOthersPolicy::DropOthers).unwrap_err();
        assert!(matches!(err, Error::ControlClientRejected(_)));
    }

    #[test]
    fn release_frees_the_slot_for_a_later_admission() {
        let mut table = AdmissionTable::new();
        table.admit(1, ClientType::ExclusiveControl, DropOthersPolicy::DropOthers).unwrap();
        table.release(1);
        let result = table.admit(2, ClientType::Control, DropOthersPolicy::DropOthers).unwrap();
        assert!(result.admitted);
    }
}
