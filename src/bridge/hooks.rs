//! Persistence hooks
//!
//! The host installs one callable to serialize opaque values and one to
//! restore them. Slots belong to a bridge instance and are shared by its
//! clones.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::errors::HostError;
use crate::host::{HostFunction, HostValue};

#[derive(Debug, Default)]
struct HookSlots {
    pickler: Option<HostFunction>,
    unpickler: Option<HostFunction>,
}

#[derive(Debug, Clone, Default)]
pub struct PersistenceHooks {
    slots: Arc<RwLock<HookSlots>>,
}

impl PersistenceHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the serializer, returning the one it replaces
    pub fn set_pickler(&self, hook: HostFunction) -> Option<HostFunction> {
        debug!(target: "graft::bridge", hook = hook.name(), "installed pickler");
        self.slots.write().pickler.replace(hook)
    }

    /// Install the deserializer, returning the one it replaces
    pub fn set_unpickler(&self, hook: HostFunction) -> Option<HostFunction> {
        debug!(target: "graft::bridge", hook = hook.name(), "installed unpickler");
        self.slots.write().unpickler.replace(hook)
    }

    pub fn clear(&self) {
        let mut slots = self.slots.write();
        slots.pickler = None;
        slots.unpickler = None;
    }

    pub fn pickler(&self) -> Option<HostFunction> {
        self.slots.read().pickler.clone()
    }

    pub fn unpickler(&self) -> Option<HostFunction> {
        self.slots.read().unpickler.clone()
    }

    /// Serialize `value` through the installed pickler
    pub fn pickle(&self, value: &HostValue) -> Result<HostValue, HostError> {
        // Clone out of the lock so the hook may reinstall itself
        let hook = self
            .pickler()
            .ok_or_else(|| HostError::runtime("no pickler installed"))?;
        hook.call(std::slice::from_ref(value))
    }

    /// Restore a value from the installed unpickler
    pub fn unpickle(&self, state: &HostValue) -> Result<HostValue, HostError> {
        let hook = self
            .unpickler()
            .ok_or_else(|| HostError::runtime("no unpickler installed"))?;
        hook.call(std::slice::from_ref(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &'static str) -> HostFunction {
        HostFunction::new(name, move |args| {
            Ok(HostValue::Tuple(vec![HostValue::from(name), args[0].clone()]))
        })
    }

    #[test]
    fn test_install_replace_clear() {
        let hooks = PersistenceHooks::new();
        assert!(hooks.pickler().is_none());
        assert!(hooks.pickle(&HostValue::Int(1)).is_err());

        assert!(hooks.set_pickler(tag("first")).is_none());
        let previous = hooks.set_pickler(tag("second")).unwrap();
        assert_eq!(previous.name(), "first");

        let out = hooks.pickle(&HostValue::Int(1)).unwrap();
        assert_eq!(
            out,
            HostValue::Tuple(vec![HostValue::from("second"), HostValue::Int(1)])
        );

        hooks.clear();
        assert!(hooks.pickler().is_none());
    }

    #[test]
    fn test_clones_share_slots() {
        let hooks = PersistenceHooks::new();
        let alias = hooks.clone();
        hooks.set_unpickler(tag("restore"));
        assert_eq!(alias.unpickler().unwrap().name(), "restore");
        assert!(alias.unpickle(&HostValue::Bytes(vec![1])).is_ok());
    }

    #[test]
    fn test_hook_may_reinstall_itself() {
        let hooks = PersistenceHooks::new();
        let inner = hooks.clone();
        hooks.set_pickler(HostFunction::new("reinstall", move |_| {
            inner.set_pickler(tag("next"));
            Ok(HostValue::None)
        }));
        hooks.pickle(&HostValue::None).unwrap();
        assert_eq!(hooks.pickler().unwrap().name(), "next");
    }
}
