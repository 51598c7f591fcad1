//! Batched mount/unmount synchronization.
//!
//! Enroll and dismiss requests only queue work. [`LifecycleSynchronizer::sync`]
//! applies a whole batch in two phases: every removal first, then every
//! insertion. Within each phase the bookkeeping is updated for the whole
//! batch before any hook runs, so no hook observes a half-applied batch.

use std::collections::{HashMap, HashSet};
use std::mem;

use tracing::debug;

use crate::core::error::StructuralError;
use crate::core::types::RealmId;

/// Callbacks invoked by [`LifecycleSynchronizer::sync`].
pub trait LifecycleHooks {
    fn did_mount(&mut self, realm: RealmId);
    fn did_unmount(&mut self, realm: RealmId);
}

/// Realms that changed state during one `sync`, in hook order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub mounted: Vec<RealmId>,
    pub unmounted: Vec<RealmId>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty() && self.unmounted.is_empty()
    }
}

#[derive(Debug)]
struct PendingMount {
    realm: RealmId,
    parent: Option<RealmId>,
    children: Vec<RealmId>,
}

#[derive(Debug)]
struct MountedEntry {
    parent: Option<RealmId>,
    children: Vec<RealmId>,
}

#[derive(Debug, Default)]
pub struct LifecycleSynchronizer {
    to_mount: Vec<PendingMount>,
    pending_index: HashMap<RealmId, usize>,
    to_unmount: Vec<RealmId>,
    mounted: HashMap<RealmId, MountedEntry>,
    dirty: bool,
}

impl LifecycleSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `realm` for mounting under `parent`.
    ///
    /// The parent must already be mounted or pending in the current batch.
    pub fn enroll(&mut self, realm: RealmId, parent: Option<RealmId>) -> Result<(), StructuralError> {
        if self.mounted.contains_key(&realm) || self.pending_index.contains_key(&realm) {
            return Err(StructuralError::AlreadyEnrolled { realm });
        }

        if let Some(parent) = parent {
            if self.to_unmount.contains(&parent) {
                return Err(StructuralError::ParentDismissed { realm, parent });
            }
            if let Some(entry) = self.mounted.get_mut(&parent) {
                entry.children.push(realm);
            } else if let Some(&index) = self.pending_index.get(&parent) {
                self.to_mount[index].children.push(realm);
            } else {
                return Err(StructuralError::OrphanEnroll { realm, parent });
            }
        }

        self.pending_index.insert(realm, self.to_mount.len());
        self.to_mount.push(PendingMount {
            realm,
            parent,
            children: Vec::new(),
        });
        self.dirty = true;
        Ok(())
    }

    /// Queue a mounted `realm` and its whole subtree for unmounting.
    pub fn dismiss(&mut self, realm: RealmId) -> Result<(), StructuralError> {
        if !self.mounted.contains_key(&realm) {
            if self.pending_index.contains_key(&realm) {
                return Err(StructuralError::DismissPending { realm });
            }
            return Err(StructuralError::DismissUnknown { realm });
        }
        if !self.to_unmount.contains(&realm) {
            self.to_unmount.push(realm);
        }
        self.dirty = true;
        Ok(())
    }

    /// Take pending `realms` back out of the batch, as if never enrolled.
    /// Mounted or unknown ids are ignored.
    pub fn withdraw(&mut self, realms: &[RealmId]) {
        let withdrawn: HashSet<RealmId> = realms
            .iter()
            .copied()
            .filter(|realm| self.pending_index.contains_key(realm))
            .collect();
        if withdrawn.is_empty() {
            return;
        }
        self.to_mount
            .retain(|pending| !withdrawn.contains(&pending.realm));
        for pending in &mut self.to_mount {
            pending.children.retain(|child| !withdrawn.contains(child));
        }
        for entry in self.mounted.values_mut() {
            entry.children.retain(|child| !withdrawn.contains(child));
        }
        self.pending_index = self
            .to_mount
            .iter()
            .enumerate()
            .map(|(index, pending)| (pending.realm, index))
            .collect();
        self.refresh_dirty();
    }

    /// Cancel a queued dismissal of `realm`. Returns whether one was queued.
    pub fn recall(&mut self, realm: RealmId) -> bool {
        let before = self.to_unmount.len();
        self.to_unmount.retain(|queued| *queued != realm);
        self.refresh_dirty();
        self.to_unmount.len() != before
    }

    /// Apply every queued dismissal, then every queued enrollment.
    ///
    /// Pending realms recorded under a dismissed subtree are cancelled: they
    /// never mount and are reported (and hooked) as unmounted.
    pub fn sync<H: LifecycleHooks>(&mut self, hooks: &mut H) -> SyncReport {
        let mut report = SyncReport::default();
        if !self.dirty {
            return report;
        }

        let doomed = self.collect_doomed();
        let cancelled: HashSet<RealmId> = doomed
            .iter()
            .copied()
            .filter(|realm| self.pending_index.contains_key(realm))
            .collect();
        for realm in &doomed {
            self.mounted.remove(realm);
        }
        for &realm in &doomed {
            hooks.did_unmount(realm);
        }
        report.unmounted = doomed;

        let batch = mem::take(&mut self.to_mount);
        self.pending_index.clear();
        let mut inserted = Vec::with_capacity(batch.len());
        for pending in batch {
            if cancelled.contains(&pending.realm) {
                continue;
            }
            self.mounted.insert(
                pending.realm,
                MountedEntry {
                    parent: pending.parent,
                    children: pending.children,
                },
            );
            inserted.push(pending.realm);
        }
        for &realm in &inserted {
            hooks.did_mount(realm);
        }
        report.mounted = inserted;

        self.dirty = false;
        debug!(
            mounted = report.mounted.len(),
            unmounted = report.unmounted.len(),
            "lifecycle synchronized"
        );
        report
    }

    /// Pre-order descendants of every queued dismissal, each detached from its
    /// parent's child list.
    fn collect_doomed(&mut self) -> Vec<RealmId> {
        let roots = mem::take(&mut self.to_unmount);
        let mut visited = HashSet::new();
        let mut doomed = Vec::new();

        for root in roots {
            if visited.contains(&root) {
                continue;
            }
            let parent = self.mounted.get(&root).and_then(|entry| entry.parent);
            if let Some(parent_entry) = parent.and_then(|p| self.mounted.get_mut(&p)) {
                parent_entry.children.retain(|child| *child != root);
            }

            let mut stack = vec![root];
            while let Some(realm) = stack.pop() {
                if !visited.insert(realm) {
                    continue;
                }
                doomed.push(realm);
                stack.extend(self.recorded_children(realm).iter().rev().copied());
            }
        }
        doomed
    }

    fn refresh_dirty(&mut self) {
        self.dirty = !self.to_mount.is_empty() || !self.to_unmount.is_empty();
    }

    fn recorded_children(&self, realm: RealmId) -> &[RealmId] {
        if let Some(entry) = self.mounted.get(&realm) {
            return &entry.children;
        }
        match self.pending_index.get(&realm) {
            Some(&index) => &self.to_mount[index].children,
            None => &[],
        }
    }

    pub fn is_mounted(&self, realm: RealmId) -> bool {
        self.mounted.contains_key(&realm)
    }

    pub fn is_pending(&self, realm: RealmId) -> bool {
        self.pending_index.contains_key(&realm)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mounted_len(&self) -> usize {
        self.mounted.len()
    }

    /// Recorded children of a mounted realm.
    pub fn children_of(&self, realm: RealmId) -> Option<&[RealmId]> {
        self.mounted
            .get(&realm)
            .map(|entry| entry.children.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<(&'static str, RealmId)>,
    }

    impl LifecycleHooks for Recorder {
        fn did_mount(&mut self, realm: RealmId) {
            self.events.push(("mount", realm));
        }

        fn did_unmount(&mut self, realm: RealmId) {
            self.events.push(("unmount", realm));
        }
    }

    const ROOT: RealmId = RealmId(1);
    const CHILD: RealmId = RealmId(2);
    const GRANDCHILD: RealmId = RealmId(3);

    #[test]
    fn orphan_enroll_fails_before_sync() {
        let mut sync = LifecycleSynchronizer::new();
        let err = sync.enroll(CHILD, Some(ROOT)).expect_err("orphan");
        assert_eq!(
            err,
            StructuralError::OrphanEnroll {
                realm: CHILD,
                parent: ROOT
            }
        );
        assert!(!sync.is_dirty());
    }

    #[test]
    fn child_mounts_after_parent_across_syncs() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();

        sync.enroll(ROOT, None).expect("enroll root");
        sync.sync(&mut hooks);
        sync.enroll(CHILD, Some(ROOT)).expect("enroll child");
        let report = sync.sync(&mut hooks);

        assert_eq!(report.mounted, vec![CHILD]);
        assert!(sync.is_mounted(CHILD));
        assert_eq!(sync.children_of(ROOT), Some(&[CHILD][..]));
    }

    #[test]
    fn child_may_enroll_under_pending_parent_in_same_batch() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();

        sync.enroll(ROOT, None).expect("root");
        sync.enroll(CHILD, Some(ROOT)).expect("child");
        sync.enroll(GRANDCHILD, Some(CHILD)).expect("grandchild");
        sync.sync(&mut hooks);

        assert_eq!(
            hooks.events,
            vec![("mount", ROOT), ("mount", CHILD), ("mount", GRANDCHILD)]
        );
    }

    #[test]
    fn dismiss_unmounts_whole_subtree_in_pre_order() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        sync.enroll(ROOT, None).expect("root");
        sync.enroll(CHILD, Some(ROOT)).expect("child");
        sync.enroll(GRANDCHILD, Some(CHILD)).expect("grandchild");
        sync.sync(&mut hooks);
        hooks.events.clear();

        sync.dismiss(ROOT).expect("dismiss");
        let report = sync.sync(&mut hooks);

        assert_eq!(report.unmounted, vec![ROOT, CHILD, GRANDCHILD]);
        assert_eq!(sync.mounted_len(), 0);
        assert!(hooks.events.iter().all(|(kind, _)| *kind == "unmount"));
    }

    #[test]
    fn dismissing_a_child_detaches_it_from_parent() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        sync.enroll(ROOT, None).expect("root");
        sync.enroll(CHILD, Some(ROOT)).expect("child");
        sync.sync(&mut hooks);

        sync.dismiss(CHILD).expect("dismiss");
        sync.sync(&mut hooks);

        assert!(sync.is_mounted(ROOT));
        assert_eq!(sync.children_of(ROOT), Some(&[][..]));
    }

    #[test]
    fn removals_run_before_insertions() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        sync.enroll(ROOT, None).expect("root");
        sync.enroll(CHILD, Some(ROOT)).expect("child");
        sync.sync(&mut hooks);
        hooks.events.clear();

        sync.enroll(GRANDCHILD, Some(ROOT)).expect("new child");
        sync.dismiss(CHILD).expect("dismiss");
        sync.sync(&mut hooks);

        assert_eq!(
            hooks.events,
            vec![("unmount", CHILD), ("mount", GRANDCHILD)]
        );
    }

    #[test]
    fn dismiss_distinguishes_pending_from_unknown() {
        let mut sync = LifecycleSynchronizer::new();
        sync.enroll(ROOT, None).expect("root");

        assert_eq!(
            sync.dismiss(ROOT),
            Err(StructuralError::DismissPending { realm: ROOT })
        );
        assert_eq!(
            sync.dismiss(CHILD),
            Err(StructuralError::DismissUnknown { realm: CHILD })
        );
    }

    #[test]
    fn withdrawn_realms_never_mount() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        sync.enroll(ROOT, None).expect("root");
        sync.sync(&mut hooks);
        hooks.events.clear();

        sync.enroll(CHILD, Some(ROOT)).expect("child");
        sync.enroll(GRANDCHILD, Some(CHILD)).expect("grandchild");
        sync.withdraw(&[CHILD, GRANDCHILD]);

        assert!(!sync.is_dirty());
        assert!(sync.sync(&mut hooks).is_empty());
        assert!(hooks.events.is_empty());
        assert_eq!(sync.children_of(ROOT), Some(&[][..]));
    }

    #[test]
    fn recalled_dismissal_keeps_realm_mounted() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        sync.enroll(ROOT, None).expect("root");
        sync.enroll(CHILD, Some(ROOT)).expect("child");
        sync.sync(&mut hooks);

        sync.dismiss(CHILD).expect("dismiss");
        assert!(sync.recall(CHILD));
        assert!(!sync.recall(CHILD));
        sync.sync(&mut hooks);

        assert!(sync.is_mounted(CHILD));
        assert_eq!(sync.children_of(ROOT), Some(&[CHILD][..]));
    }

    #[test]
    fn double_enroll_is_rejected() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        sync.enroll(ROOT, None).expect("root");
        assert!(sync.enroll(ROOT, None).is_err());
        sync.sync(&mut hooks);
        assert_eq!(
            sync.enroll(ROOT, None),
            Err(StructuralError::AlreadyEnrolled { realm: ROOT })
        );
    }

    #[test]
    fn pending_child_of_dismissed_parent_is_cancelled() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        sync.enroll(ROOT, None).expect("root");
        sync.sync(&mut hooks);
        hooks.events.clear();

        sync.enroll(CHILD, Some(ROOT)).expect("child");
        sync.dismiss(ROOT).expect("dismiss");
        let report = sync.sync(&mut hooks);

        assert_eq!(report.unmounted, vec![ROOT, CHILD]);
        assert!(report.mounted.is_empty());
        assert!(!sync.is_mounted(CHILD));
    }

    #[test]
    fn enroll_under_parent_queued_for_dismissal_fails() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        sync.enroll(ROOT, None).expect("root");
        sync.sync(&mut hooks);

        sync.dismiss(ROOT).expect("dismiss");
        assert_eq!(
            sync.enroll(CHILD, Some(ROOT)),
            Err(StructuralError::ParentDismissed {
                realm: CHILD,
                parent: ROOT
            })
        );
    }

    #[test]
    fn clean_sync_is_a_no_op() {
        let mut sync = LifecycleSynchronizer::new();
        let mut hooks = Recorder::default();
        assert!(sync.sync(&mut hooks).is_empty());
        assert!(hooks.events.is_empty());
    }
}
