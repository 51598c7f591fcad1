//! Contexts handed to mutation and selector functions.

use anyhow::anyhow;

use crate::core::monitor::UsageMonitor;
use crate::core::path::Path;
use crate::core::value::Value;
use crate::realm::Realm;

/// View of the target realm while an action's mutation function runs.
///
/// Reads here are not audited: a mutation is a write, not a derived read.
pub struct MutationContext<'a> {
    realm: &'a Realm,
    payload: &'a [Value],
}

impl<'a> MutationContext<'a> {
    pub(crate) fn new(realm: &'a Realm, payload: &'a [Value]) -> Self {
        Self { realm, payload }
    }

    pub fn path(&self) -> &Path {
        self.realm.path()
    }

    /// Value of the target realm before this action.
    pub fn value(&self) -> Value {
        self.realm.value()
    }

    /// Slice at `relative` below the target realm.
    pub fn read(&self, relative: impl Into<Path>) -> Value {
        self.realm.value().get_path(&relative.into())
    }

    pub fn payload(&self) -> &[Value] {
        self.payload
    }

    pub fn arg(&self, index: usize) -> anyhow::Result<&Value> {
        self.payload
            .get(index)
            .ok_or_else(|| anyhow!("missing payload argument {index} for {}", self.path()))
    }
}

/// View of a realm while one of its selectors runs. Every read is reported
/// to the usage monitor.
pub struct ReadContext<'a> {
    realm: &'a Realm,
    monitor: &'a UsageMonitor,
    args: &'a [Value],
}

impl<'a> ReadContext<'a> {
    pub(crate) fn new(realm: &'a Realm, monitor: &'a UsageMonitor, args: &'a [Value]) -> Self {
        Self {
            realm,
            monitor,
            args,
        }
    }

    pub fn path(&self) -> &Path {
        self.realm.path()
    }

    pub fn value(&self) -> Value {
        self.monitor.register_value_usage(self.realm.path());
        self.realm.value()
    }

    pub fn read(&self, relative: impl Into<Path>) -> Value {
        let relative = relative.into();
        self.monitor
            .register_value_usage(&self.realm.path().join(&relative));
        self.realm.value().get_path(&relative)
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    pub fn arg(&self, index: usize) -> anyhow::Result<&Value> {
        self.args
            .get(index)
            .ok_or_else(|| anyhow!("missing selector argument {index} for {}", self.path()))
    }
}
