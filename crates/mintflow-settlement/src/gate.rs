//! Single-flight gate for financial flows.
//!
//! At most one coordinator per (user, task kind) may run at a time in
//! this process. The permit releases its slot on drop, so early returns
//! and panics both free the gate.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use mintflow_protocols::TaskKind;

type GateKey = (String, TaskKind);

/// Tracks which (user, kind) flows are currently in flight.
#[derive(Clone, Default)]
pub struct FlowGate {
    active: Arc<DashMap<GateKey, ()>>,
}

impl FlowGate {
    /// Create an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to reserve the slot for `user` and `kind`. Returns `None`
    /// when a flow of that kind is already running for the user.
    pub fn try_acquire(&self, user: &str, kind: TaskKind) -> Option<FlowPermit> {
        let key = (user.to_string(), kind);
        match self.active.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(FlowPermit {
                    active: Arc::clone(&self.active),
                    key,
                })
            }
        }
    }

    /// Whether a flow of `kind` is currently running for `user`.
    pub fn is_active(&self, user: &str, kind: TaskKind) -> bool {
        self.active.contains_key(&(user.to_string(), kind))
    }
}

/// Held for the duration of a flow; releases the slot on drop.
pub struct FlowPermit {
    active: Arc<DashMap<GateKey, ()>>,
    key: GateKey,
}

impl Drop for FlowPermit {
    fn drop(&mut self) {
        self.active.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected_until_release() {
        let gate = FlowGate::new();
        let permit = gate.try_acquire("0xabc", TaskKind::Claim).unwrap();
        assert!(gate.try_acquire("0xabc", TaskKind::Claim).is_none());
        assert!(gate.is_active("0xabc", TaskKind::Claim));

        drop(permit);
        assert!(gate.try_acquire("0xabc", TaskKind::Claim).is_some());
    }

    #[test]
    fn test_distinct_kinds_and_users_do_not_contend() {
        let gate = FlowGate::new();
        let _claim = gate.try_acquire("0xabc", TaskKind::Claim).unwrap();
        assert!(gate.try_acquire("0xabc", TaskKind::Purchase).is_some());
        assert!(gate.try_acquire("0xdef", TaskKind::Claim).is_some());
    }
}
