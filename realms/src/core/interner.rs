//! Path interning: identity-stable, refcounted persistent paths.
//!
//! Many logically equal paths (built fresh on every read) collapse to one
//! [`PersistentPath`]. Identity of two persistent paths implies structural
//! equality of their content; subscriptions key on that identity.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use tracing::trace;

use crate::core::error::LookupError;
use crate::core::path::{Path, render};

struct Entry {
    key: String,
    path: Path,
    requirements: Cell<usize>,
}

/// Interned path. Cloning shares the identity; equality and hashing are by
/// identity.
#[derive(Clone)]
pub struct PersistentPath(Rc<Entry>);

impl PersistentPath {
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    /// Canonical string form this entry is bucketed under.
    pub fn key(&self) -> &str {
        &self.0.key
    }
}

impl PartialEq for PersistentPath {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for PersistentPath {}

impl Hash for PersistentPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for PersistentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PersistentPath({}, requirements={})",
            self.0.key,
            self.0.requirements.get()
        )
    }
}

/// Intern table keyed by the canonical string form.
///
/// Several structurally different paths may share a key (an integer and a
/// big integer render identically, as do distinct tags with one label), so
/// each key owns a bucket scanned for structural equality.
#[derive(Default)]
pub struct PathInterner {
    buckets: HashMap<String, Vec<PersistentPath>>,
}

impl PathInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: HashMap::with_capacity(capacity),
        }
    }

    /// Return the persistent path for `path`, interning it with one
    /// requirement if it is new. An existing entry is returned unchanged.
    pub fn get(&mut self, path: &Path) -> PersistentPath {
        self.lookup_or_insert(path).0
    }

    /// Like [`get`](Self::get), but an existing entry gains a requirement, so
    /// every call must be balanced by one
    /// [`release_requirement`](Self::release_requirement).
    pub fn acquire(&mut self, path: &Path) -> PersistentPath {
        let (persistent, fresh) = self.lookup_or_insert(path);
        if !fresh {
            persistent.0.requirements.set(persistent.0.requirements.get() + 1);
        }
        persistent
    }

    pub fn register_requirement(&mut self, persistent: &PersistentPath) -> Result<(), LookupError> {
        self.ensure_interned(persistent)?;
        let entry = &persistent.0;
        entry.requirements.set(entry.requirements.get() + 1);
        Ok(())
    }

    /// Drop one requirement; the entry is evicted when none remain.
    pub fn release_requirement(&mut self, persistent: &PersistentPath) -> Result<(), LookupError> {
        self.ensure_interned(persistent)?;
        let entry = &persistent.0;
        let remaining = entry.requirements.get().saturating_sub(1);
        entry.requirements.set(remaining);
        if remaining > 0 {
            return Ok(());
        }

        if let Some(bucket) = self.buckets.get_mut(&entry.key) {
            bucket.retain(|candidate| candidate != persistent);
            if bucket.is_empty() {
                self.buckets.remove(&entry.key);
            }
        }
        trace!(path = %entry.key, "evicted persistent path");
        Ok(())
    }

    pub fn is_interned(&self, persistent: &PersistentPath) -> bool {
        self.buckets
            .get(&persistent.0.key)
            .is_some_and(|bucket| bucket.contains(persistent))
    }

    /// Current requirement count, or `None` when the entry is not interned.
    pub fn requirements(&self, persistent: &PersistentPath) -> Option<usize> {
        self.is_interned(persistent)
            .then(|| persistent.0.requirements.get())
    }

    /// Number of interned entries.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn lookup_or_insert(&mut self, path: &Path) -> (PersistentPath, bool) {
        let key = render(path, true);
        let bucket = self.buckets.entry(key.clone()).or_default();
        if let Some(existing) = bucket.iter().find(|candidate| candidate.path() == path) {
            return (existing.clone(), false);
        }

        let persistent = PersistentPath(Rc::new(Entry {
            key,
            path: path.clone(),
            requirements: Cell::new(1),
        }));
        bucket.push(persistent.clone());
        trace!(path = %persistent.key(), "interned persistent path");
        (persistent, true)
    }

    fn ensure_interned(&self, persistent: &PersistentPath) -> Result<(), LookupError> {
        if self.is_interned(persistent) {
            return Ok(());
        }
        Err(LookupError::NotInterned {
            path: persistent.0.key.clone(),
        })
    }
}
