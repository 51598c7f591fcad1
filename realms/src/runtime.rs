//! The runtime: mounts realm trees and runs actions against them.
//!
//! A [`Runtime`] owns every piece of mutable state (the realm arena, the
//! lifecycle synchronizer, the transaction coordinator and the catalyst), so
//! a dispatch holds `&mut Runtime` from resolution to the post-commit sync
//! and nothing can interleave with it.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::catalyst::{AuditId, AuditRecorder, Catalyst, Subscription};
use crate::context::{MutationContext, ReadContext};
use crate::core::error::{RealmError, Result, StructuralError};
use crate::core::lifecycle::{LifecycleSynchronizer, SyncReport};
use crate::core::path::{Fragment, Path};
use crate::core::transaction::TransactionCoordinator;
use crate::core::types::{MountStatus, RealmId};
use crate::core::value::Value;
use crate::definition::{MutationFn, NodeDefinition, NodeKind, slice_spec};
use crate::io::config::RuntimeConfig;
use crate::realm::{Layout, Realm, RealmArena, RealmHandle};
use crate::storage::{RootCell, StorageCell};

/// What an action is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Absolute path, resolved from its mount.
    Path(Path),
    /// Previously resolved realm. Used directly while it is still mounted at
    /// the same path, otherwise its path is resolved again.
    Handle(RealmHandle),
}

impl From<Path> for Target {
    fn from(path: Path) -> Self {
        Target::Path(path)
    }
}

impl From<&Path> for Target {
    fn from(path: &Path) -> Self {
        Target::Path(path.clone())
    }
}

impl From<RealmHandle> for Target {
    fn from(handle: RealmHandle) -> Self {
        Target::Handle(handle)
    }
}

impl From<&RealmHandle> for Target {
    fn from(handle: &RealmHandle) -> Self {
        Target::Handle(handle.clone())
    }
}

/// One requested mutation.
pub struct Action {
    target: Target,
    key: String,
    payload: Vec<Value>,
    callback: Option<Box<dyn FnOnce()>>,
}

impl Action {
    pub fn new(target: impl Into<Target>, key: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            key: key.into(),
            payload: Vec::new(),
            callback: None,
        }
    }

    pub fn with_payload(mut self, payload: Vec<Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.payload.push(arg.into());
        self
    }

    /// Run `callback` once the commit and the following sync are done.
    pub fn on_commit(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("target", &self.target)
            .field("key", &self.key)
            .field("payload", &self.payload)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub target: RealmHandle,
    /// The mutation produced a value that is not `same` as the stored one.
    pub changed: bool,
    /// Altered realms in first-visit order: each changed realm, then its
    /// ancestors.
    pub altered: Vec<RealmId>,
    pub altered_paths: Vec<Path>,
    pub mounted: Vec<RealmId>,
    pub unmounted: Vec<RealmId>,
}

/// Structural work done by the mount or dispatch in progress, undone if it
/// fails.
#[derive(Debug, Default)]
struct Staged {
    spawned: Vec<RealmId>,
    dismissed: Vec<(RealmId, Fragment, RealmId)>,
}

pub struct Runtime {
    config: RuntimeConfig,
    staged: Staged,
    arena: RealmArena,
    lifecycle: LifecycleSynchronizer,
    transactions: TransactionCoordinator,
    catalyst: Catalyst,
    roots: HashMap<String, RealmId>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            catalyst: Catalyst::with_capacity(config.interner_capacity),
            config,
            staged: Staged::default(),
            arena: RealmArena::new(),
            lifecycle: LifecycleSynchronizer::new(),
            transactions: TransactionCoordinator::new(),
            roots: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Mount `definition` under `id`, starting from `initial` or the
    /// definition's default value.
    pub fn mount(
        &mut self,
        id: &str,
        definition: impl Into<Rc<NodeDefinition>>,
        initial: Option<Value>,
    ) -> Result<RealmHandle> {
        let definition = definition.into();
        let value = initial.unwrap_or_else(|| definition.default_value());
        self.mount_with_cell(id, definition, Rc::new(RootCell::new(value)))
    }

    /// Mount `definition` under `id` over an externally owned storage cell.
    pub fn mount_with_cell(
        &mut self,
        id: &str,
        definition: impl Into<Rc<NodeDefinition>>,
        cell: Rc<dyn StorageCell>,
    ) -> Result<RealmHandle> {
        if self.roots.contains_key(id) {
            return Err(StructuralError::DuplicateMount { id: id.to_string() }.into());
        }
        let path = Path::from([id]);
        self.staged = Staged::default();
        let root = match self.spawn(None, path.clone(), definition.into(), cell, true) {
            Ok(root) => root,
            Err(err) => {
                self.rollback();
                return Err(err);
            }
        };
        self.staged = Staged::default();
        self.roots.insert(id.to_string(), root);
        let report = self.synchronize();
        debug!(mount = id, realm = %root, realms = report.mounted.len(), "mounted");
        Ok(RealmHandle::new(root, path))
    }

    /// Unmount the tree mounted under `id`. Every handle into it is revoked.
    pub fn unmount(&mut self, id: &str) -> Result<SyncReport> {
        let root = *self
            .roots
            .get(id)
            .ok_or_else(|| StructuralError::UnknownMount { id: id.to_string() })?;
        self.lifecycle.dismiss(root)?;
        self.roots.remove(id);
        let report = self.synchronize();
        debug!(mount = id, realms = report.unmounted.len(), "unmounted");
        Ok(report)
    }

    /// Mount ids currently in use, sorted.
    pub fn mounts(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.roots.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Walk `path` from its mount to a mounted realm.
    pub fn resolve(&self, path: &Path) -> Result<RealmHandle> {
        let Some(first) = path.first() else {
            return Err(StructuralError::EmptyPath.into());
        };
        if path.len() > self.config.max_path_depth {
            return Err(StructuralError::PathTooDeep {
                path: path.to_string(),
                depth: path.len(),
                limit: self.config.max_path_depth,
            }
            .into());
        }
        let mut current = first
            .as_str()
            .and_then(|id| self.roots.get(id))
            .copied()
            .ok_or_else(|| StructuralError::UnknownMount {
                id: first.to_string(),
            })?;
        for fragment in &path.fragments()[1..] {
            current = self.arena.mounted(current)?.resolve_child(fragment)?;
        }
        self.arena.mounted(current)?;
        Ok(RealmHandle::new(current, path.clone()))
    }

    /// Turn a target into a handle on a mounted realm.
    pub fn resolve_target(&self, target: &Target) -> Result<RealmHandle> {
        match target {
            Target::Path(path) => self.resolve(path),
            Target::Handle(handle) => {
                let live = self
                    .arena
                    .get(handle.id())
                    .is_ok_and(|realm| {
                        realm.status() == MountStatus::Mounted && realm.path() == handle.path()
                    });
                if live {
                    Ok(handle.clone())
                } else {
                    self.resolve(handle.path())
                }
            }
        }
    }

    /// Mounted realm behind `id`.
    pub fn realm(&self, id: RealmId) -> Result<&Realm> {
        self.arena.mounted(id)
    }

    /// Current value of a mounted realm. Reported to a recording audit.
    pub fn value(&self, id: RealmId) -> Result<Value> {
        let realm = self.arena.mounted(id)?;
        self.catalyst.monitor().register_value_usage(realm.path());
        Ok(realm.value())
    }

    /// Current value of the realm at `path`.
    pub fn value_at(&self, path: &Path) -> Result<Value> {
        let handle = self.resolve(path)?;
        self.value(handle.id())
    }

    pub fn status(&self, id: RealmId) -> Result<MountStatus> {
        Ok(self.arena.status(id)?)
    }

    pub fn is_mounted(&self, id: RealmId) -> bool {
        self.arena.is_mounted(id)
    }

    /// Number of live realms (pending or mounted).
    pub fn realm_count(&self) -> usize {
        self.arena.len()
    }

    /// Run one action: resolve, mutate, write, commit, sync, callback.
    pub fn dispatch(&mut self, action: Action) -> Result<CommitReport> {
        let Action {
            target,
            key,
            payload,
            callback,
        } = action;
        let handle = self.resolve_target(&target)?;
        let id = handle.id();
        let mutation = {
            let realm = self.arena.mounted(id)?;
            realm
                .definition()
                .find_mutation(&key)
                .cloned()
                .ok_or_else(|| StructuralError::UnknownAction {
                    path: realm.path().to_string(),
                    key: key.clone(),
                })?
        };
        debug!(path = %handle.path(), %key, "dispatch");

        self.transactions.begin()?;
        self.staged = Staged::default();
        let changed = match self.apply(id, &key, &mutation, &payload) {
            Ok(changed) => changed,
            Err(err) => {
                self.transactions.abort();
                self.rollback();
                warn!(path = %handle.path(), %key, error = %err, "action aborted");
                return Err(err);
            }
        };
        self.staged = Staged::default();
        let altered = self.transactions.commit(&self.arena)?;
        let mut altered_paths = Vec::with_capacity(altered.len());
        for realm in &altered {
            self.arena.refresh_observed(*realm);
            altered_paths.push(self.arena.get(*realm)?.path().clone());
        }

        let sync = self.synchronize();
        if let Some(callback) = callback {
            callback();
        }
        Ok(CommitReport {
            target: handle,
            changed,
            altered,
            altered_paths,
            mounted: sync.mounted,
            unmounted: sync.unmounted,
        })
    }

    /// Evaluate selector `name` on the target realm.
    pub fn select(&self, target: impl Into<Target>, name: &str, args: &[Value]) -> Result<Value> {
        let handle = self.resolve_target(&target.into())?;
        let realm = self.arena.mounted(handle.id())?;
        let selector =
            realm
                .definition()
                .find_selector(name)
                .ok_or_else(|| StructuralError::UnknownSelector {
                    path: realm.path().to_string(),
                    name: name.to_string(),
                })?;
        let ctx = ReadContext::new(realm, self.catalyst.monitor(), args);
        selector(&ctx).map_err(|source| RealmError::Selector {
            name: name.to_string(),
            path: realm.path().to_string(),
            source,
        })
    }

    /// Start recording every value read until the recorder is finished.
    pub fn start_audit(&self) -> Result<AuditRecorder> {
        Ok(self.catalyst.start_audit()?)
    }

    pub fn finish_audit(&mut self, recorder: AuditRecorder) -> Result<Subscription> {
        Ok(recorder.finish(&mut self.catalyst)?)
    }

    pub fn cancel_audit(&mut self, recorder: AuditRecorder) -> Result<()> {
        Ok(self.catalyst.cancel_audit(recorder)?)
    }

    pub fn share(&mut self, subscription: &Subscription) -> Result<Subscription> {
        Ok(self.catalyst.share(subscription)?)
    }

    pub fn release(&mut self, subscription: Subscription) -> Result<()> {
        self.catalyst.release(subscription)
    }

    /// Audits invalidated by the commit behind `report`.
    pub fn affected_audits(&self, report: &CommitReport) -> Vec<AuditId> {
        self.catalyst.affected(&report.altered_paths)
    }

    pub fn catalyst(&self) -> &Catalyst {
        &self.catalyst
    }

    fn synchronize(&mut self) -> SyncReport {
        self.lifecycle.sync(&mut self.arena)
    }

    /// Undo the staged spawns and dismissals of a failed mount or dispatch.
    fn rollback(&mut self) {
        let staged = mem::take(&mut self.staged);
        self.lifecycle.withdraw(&staged.spawned);
        for id in staged.spawned.iter().rev() {
            self.arena.discard(*id);
        }
        for (parent, fragment, child) in staged.dismissed {
            if self.lifecycle.recall(child) {
                self.arena.attach_child(parent, fragment, child);
            }
        }
    }

    /// Create a realm and, depth first, every child its value calls for.
    /// All of them stay pending until the next sync. Paths deeper than
    /// `max_path_depth` are rejected, since `resolve` could never reach them.
    fn spawn(
        &mut self,
        parent: Option<RealmId>,
        path: Path,
        definition: Rc<NodeDefinition>,
        cell: Rc<dyn StorageCell>,
        is_univocal: bool,
    ) -> Result<RealmId> {
        if path.len() > self.config.max_path_depth {
            return Err(StructuralError::PathTooDeep {
                path: path.to_string(),
                depth: path.len(),
                limit: self.config.max_path_depth,
            }
            .into());
        }
        let is_divergent = definition.kind().is_divergent();
        let layout = Layout {
            parent,
            path: path.clone(),
            is_univocal,
            is_divergent,
        };
        let id = self.arena.insert(layout, definition.clone(), cell.clone());
        if let Err(err) = self.lifecycle.enroll(id, parent) {
            self.arena.discard(id);
            return Err(err.into());
        }
        self.staged.spawned.push(id);

        let value = cell.get();
        for spec in definition.kind().child_specs(&value, &cell) {
            let child = self.spawn(
                Some(id),
                path.child(spec.fragment.clone()),
                spec.definition,
                spec.cell,
                !is_divergent,
            )?;
            self.arena.attach_child(id, spec.fragment, child);
        }
        Ok(id)
    }

    /// Run the mutation and write its result. Nothing is written unless the
    /// mutation returns `Ok`; a write whose propagation fails is reverted.
    fn apply(&mut self, id: RealmId, key: &str, mutation: &MutationFn, payload: &[Value]) -> Result<bool> {
        let realm = self.arena.mounted(id)?;
        let next = mutation(&MutationContext::new(realm, payload)).map_err(|source| {
            RealmError::Mutation {
                key: key.to_string(),
                path: realm.path().to_string(),
                source,
            }
        })?;
        let previous = realm.value();
        if next.same(&previous) {
            return Ok(false);
        }

        let baseline = realm.observed().clone();
        let cell = realm.cell().clone();
        cell.set(next)?;
        self.transactions.register_altered(id, baseline)?;
        if let Err(err) = self.value_did_update(id) {
            if let Err(restore) = cell.set(previous) {
                warn!(realm = %id, error = %restore, "failed to restore value");
            }
            return Err(err);
        }
        Ok(true)
    }

    /// Propagate a write on `id` to the realms below it. Observed values
    /// are refreshed only once the commit succeeds.
    fn value_did_update(&mut self, id: RealmId) -> Result<()> {
        let (definition, cell, path) = {
            let realm = self.arena.get(id)?;
            (realm.definition().clone(), realm.cell().clone(), realm.path().clone())
        };
        if let NodeKind::List(item) = definition.kind() {
            let len = cell.get().len();
            self.reconcile_items(id, &path, item, &cell, len)?;
        }

        let children = self.arena.get(id)?.children();
        for (_, child) in children {
            if !self.arena.is_mounted(child) {
                continue;
            }
            let observed = {
                let realm = self.arena.get(child)?;
                if realm.value().same(realm.observed()) {
                    continue;
                }
                realm.observed().clone()
            };
            self.transactions.register_altered(child, observed)?;
            self.value_did_update(child)?;
        }
        Ok(())
    }

    /// Match a list realm's items to its new length: surplus items are
    /// dismissed, missing indices are spawned pending.
    fn reconcile_items(
        &mut self,
        id: RealmId,
        path: &Path,
        item: &Rc<NodeDefinition>,
        cell: &Rc<dyn StorageCell>,
        len: usize,
    ) -> Result<()> {
        let existing = self.arena.get(id)?.children();
        let known = existing.len();
        for (fragment, child) in existing {
            if fragment.as_index().is_some_and(|index| index >= len) {
                self.lifecycle.dismiss(child)?;
                self.arena.detach_child(id, &fragment);
                self.staged.dismissed.push((id, fragment, child));
            }
        }
        for index in known..len {
            let spec = slice_spec(cell, Fragment::from(index), item);
            let child = self.spawn(
                Some(id),
                path.child(spec.fragment.clone()),
                spec.definition,
                spec.cell,
                false,
            )?;
            self.arena.attach_child(id, spec.fragment, child);
        }
        if known != len {
            debug!(%path, from = known, to = len, "list reconciled");
        }
        Ok(())
    }
}
