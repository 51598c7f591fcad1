//! Realms: the nodes of the state tree, and the arena that owns them.
//!
//! The arena is the only owner of realm data. Ids and [`RealmHandle`]s are
//! plain references into it; teardown removes the entry, so every accessor
//! called through a stale id fails with [`AccessError::Unmounted`].

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::core::error::{AccessError, RealmError, StructuralError};
use crate::core::lifecycle::LifecycleHooks;
use crate::core::path::{Fragment, Path};
use crate::core::transaction::RealmGraph;
use crate::core::types::{MountStatus, RealmId};
use crate::core::value::Value;
use crate::definition::{NodeDefinition, NodeKind};
use crate::storage::StorageCell;

/// Position and structural flags of a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub parent: Option<RealmId>,
    pub path: Path,
    /// Exactly one instance of this shape can exist at this path.
    pub is_univocal: bool,
    /// Children are structurally interchangeable siblings.
    pub is_divergent: bool,
}

/// Resolved reference to a realm: its id plus the path it was reached by.
///
/// Dispatching through a handle whose realm has been unmounted falls back to
/// resolving the path again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealmHandle {
    id: RealmId,
    path: Path,
}

impl RealmHandle {
    pub(crate) fn new(id: RealmId, path: Path) -> Self {
        Self { id, path }
    }

    pub fn id(&self) -> RealmId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct Realm {
    id: RealmId,
    layout: Layout,
    definition: Rc<NodeDefinition>,
    cell: Rc<dyn StorageCell>,
    observed: Value,
    status: MountStatus,
    children: HashMap<Fragment, RealmId>,
}

impl Realm {
    pub fn id(&self) -> RealmId {
        self.id
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn path(&self) -> &Path {
        &self.layout.path
    }

    pub fn parent(&self) -> Option<RealmId> {
        self.layout.parent
    }

    pub fn definition(&self) -> &Rc<NodeDefinition> {
        &self.definition
    }

    pub fn status(&self) -> MountStatus {
        self.status
    }

    /// Current value, read through the storage cell.
    pub fn value(&self) -> Value {
        self.cell.get()
    }

    /// Value as of the last mount or change propagation.
    pub fn observed(&self) -> &Value {
        &self.observed
    }

    pub(crate) fn cell(&self) -> &Rc<dyn StorageCell> {
        &self.cell
    }

    /// Child ids ordered by fragment rendering, list items by index.
    pub fn children(&self) -> Vec<(Fragment, RealmId)> {
        let mut children: Vec<(Fragment, RealmId)> = self
            .children
            .iter()
            .map(|(fragment, id)| (fragment.clone(), *id))
            .collect();
        children.sort_by(|(a, _), (b, _)| match (a.as_index(), b.as_index()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.to_string().cmp(&b.to_string()),
        });
        children
    }

    /// Child realm at `fragment`.
    pub fn resolve_child(&self, fragment: &Fragment) -> Result<RealmId, StructuralError> {
        let found = match self.definition.kind() {
            NodeKind::Leaf => None,
            NodeKind::Record(_) | NodeKind::List(_) | NodeKind::Wrapper(_) => {
                self.children.get(fragment).copied()
            }
        };
        found.ok_or_else(|| StructuralError::MissingChild {
            path: self.layout.path.to_string(),
            fragment: fragment.to_string(),
        })
    }
}

/// Owner of every live realm. Ids are never reused.
#[derive(Default)]
pub struct RealmArena {
    realms: HashMap<RealmId, Realm>,
    next_id: u64,
}

impl RealmArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending realm and return its id.
    pub(crate) fn insert(
        &mut self,
        layout: Layout,
        definition: Rc<NodeDefinition>,
        cell: Rc<dyn StorageCell>,
    ) -> RealmId {
        self.next_id += 1;
        let id = RealmId(self.next_id);
        let observed = cell.get();
        self.realms.insert(
            id,
            Realm {
                id,
                layout,
                definition,
                cell,
                observed,
                status: MountStatus::Pending,
                children: HashMap::new(),
            },
        );
        id
    }

    /// Drop a realm that never mounted, detaching it from its parent.
    pub(crate) fn discard(&mut self, id: RealmId) {
        if self.unlink(id).is_some() {
            trace!(realm = %id, "pending realm discarded");
        }
    }

    pub(crate) fn attach_child(&mut self, parent: RealmId, fragment: Fragment, child: RealmId) {
        if let Some(realm) = self.realms.get_mut(&parent) {
            realm.children.insert(fragment, child);
        }
    }

    pub(crate) fn detach_child(&mut self, parent: RealmId, fragment: &Fragment) {
        if let Some(realm) = self.realms.get_mut(&parent) {
            realm.children.remove(fragment);
        }
    }

    /// Re-read the value of `id` into its observed slot.
    pub(crate) fn refresh_observed(&mut self, id: RealmId) {
        if let Some(realm) = self.realms.get_mut(&id) {
            realm.observed = realm.cell.get();
        }
    }

    /// Live realm in any status (pending or mounted).
    pub fn get(&self, id: RealmId) -> Result<&Realm, RealmError> {
        match self.realms.get(&id) {
            Some(realm) => Ok(realm),
            None => Err(self.missing(id)),
        }
    }

    /// Mounted realm; pending and unmounted realms are an access error.
    pub fn mounted(&self, id: RealmId) -> Result<&Realm, RealmError> {
        let realm = self.get(id)?;
        match realm.status {
            MountStatus::Mounted => Ok(realm),
            MountStatus::Pending => Err(AccessError::Pending { realm: id }.into()),
            MountStatus::Unmounted => Err(AccessError::Unmounted { realm: id }.into()),
        }
    }

    pub fn is_mounted(&self, id: RealmId) -> bool {
        self.realms
            .get(&id)
            .is_some_and(|realm| realm.status == MountStatus::Mounted)
    }

    /// Status of `id`; ids that were allocated and are gone are unmounted.
    pub fn status(&self, id: RealmId) -> Result<MountStatus, StructuralError> {
        if let Some(realm) = self.realms.get(&id) {
            return Ok(realm.status);
        }
        if self.was_allocated(id) {
            return Ok(MountStatus::Unmounted);
        }
        Err(StructuralError::UnknownRealm { realm: id })
    }

    pub fn len(&self) -> usize {
        self.realms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.realms.is_empty()
    }

    /// Remove `id` and clear its parent's child entry if it still points here.
    fn unlink(&mut self, id: RealmId) -> Option<Realm> {
        let realm = self.realms.remove(&id)?;
        if let (Some(parent), Some(fragment)) = (realm.layout.parent, realm.layout.path.last()) {
            if let Some(parent) = self.realms.get_mut(&parent) {
                if parent.children.get(fragment) == Some(&id) {
                    parent.children.remove(fragment);
                }
            }
        }
        Some(realm)
    }

    fn was_allocated(&self, id: RealmId) -> bool {
        id.0 >= 1 && id.0 <= self.next_id
    }

    fn missing(&self, id: RealmId) -> RealmError {
        if self.was_allocated(id) {
            return AccessError::Unmounted { realm: id }.into();
        }
        StructuralError::UnknownRealm { realm: id }.into()
    }
}

impl RealmGraph for RealmArena {
    fn parent_of(&self, realm: RealmId) -> Option<RealmId> {
        self.realms.get(&realm).and_then(Realm::parent)
    }

    fn current_value(&self, realm: RealmId) -> Option<Value> {
        self.realms.get(&realm).map(Realm::value)
    }
}

impl LifecycleHooks for RealmArena {
    fn did_mount(&mut self, id: RealmId) {
        if let Some(realm) = self.realms.get_mut(&id) {
            realm.status = MountStatus::Mounted;
            realm.observed = realm.cell.get();
            trace!(realm = %id, path = %realm.layout.path, "realm mounted");
        }
    }

    fn did_unmount(&mut self, id: RealmId) {
        if let Some(realm) = self.unlink(id) {
            trace!(realm = %id, path = %realm.layout.path, "realm unmounted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RootCell;

    fn leaf_layout(path: Path, parent: Option<RealmId>) -> Layout {
        Layout {
            parent,
            path,
            is_univocal: true,
            is_divergent: false,
        }
    }

    fn insert_leaf(arena: &mut RealmArena, path: Path, parent: Option<RealmId>) -> RealmId {
        arena.insert(
            leaf_layout(path, parent),
            Rc::new(NodeDefinition::leaf("leaf", Value::Int(0))),
            Rc::new(RootCell::new(Value::Int(0))),
        )
    }

    #[test]
    fn pending_realm_rejects_access_until_mounted() {
        let mut arena = RealmArena::new();
        let id = insert_leaf(&mut arena, Path::from(["a"]), None);

        let err = arena.mounted(id).err().expect("pending");
        assert!(matches!(err, RealmError::Access(AccessError::Pending { .. })));

        arena.did_mount(id);
        assert_eq!(arena.mounted(id).expect("mounted").value(), Value::Int(0));
    }

    #[test]
    fn unmounted_realm_is_revoked() {
        let mut arena = RealmArena::new();
        let id = insert_leaf(&mut arena, Path::from(["a"]), None);
        arena.did_mount(id);
        arena.did_unmount(id);

        let err = arena.mounted(id).err().expect("revoked");
        assert!(matches!(err, RealmError::Access(AccessError::Unmounted { .. })));
        assert_eq!(arena.status(id), Ok(MountStatus::Unmounted));
        assert_eq!(
            arena.status(RealmId(99)),
            Err(StructuralError::UnknownRealm { realm: RealmId(99) })
        );
    }

    #[test]
    fn unmount_detaches_child_from_parent() {
        let mut arena = RealmArena::new();
        let parent = insert_leaf(&mut arena, Path::from(["p"]), None);
        let child = insert_leaf(&mut arena, Path::from(["p", "c"]), Some(parent));
        arena.attach_child(parent, Fragment::from("c"), child);
        arena.did_mount(parent);
        arena.did_mount(child);

        arena.did_unmount(child);

        let parent_realm = arena.get(parent).expect("parent");
        assert!(parent_realm.children().is_empty());
    }

    #[test]
    fn discard_detaches_pending_child() {
        let mut arena = RealmArena::new();
        let parent = insert_leaf(&mut arena, Path::from(["p"]), None);
        let child = insert_leaf(&mut arena, Path::from(["p", "c"]), Some(parent));
        arena.attach_child(parent, Fragment::from("c"), child);

        arena.discard(child);

        assert!(arena.get(parent).expect("parent").children().is_empty());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn leaf_resolves_no_children() {
        let mut arena = RealmArena::new();
        let id = insert_leaf(&mut arena, Path::from(["a"]), None);
        let err = arena
            .get(id)
            .expect("realm")
            .resolve_child(&Fragment::from("x"))
            .expect_err("leaf");
        assert_eq!(
            err,
            StructuralError::MissingChild {
                path: "[/a]".to_string(),
                fragment: "x".to_string()
            }
        );
    }
}
