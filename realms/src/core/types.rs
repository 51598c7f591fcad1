//! Shared identifiers and status types for the realm runtime.

use std::fmt;

/// Stable identifier of a realm inside one runtime.
///
/// Ids are allocated monotonically and never reused, so an id that is no
/// longer live always refers to a realm that has been unmounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealmId(pub u64);

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle position of a realm. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountStatus {
    /// Enrolled, waiting for the next synchronization.
    Pending,
    /// Live: value and navigation accessors are valid.
    Mounted,
    /// Torn down: every accessor fails.
    Unmounted,
}

impl fmt::Display for MountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MountStatus::Pending => "pending",
            MountStatus::Mounted => "mounted",
            MountStatus::Unmounted => "unmounted",
        };
        f.write_str(label)
    }
}
