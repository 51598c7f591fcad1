//! Catalyst: turns recorded read paths into refcounted subscriptions.
//!
//! Each finished audit holds one requirement on every persistent path it
//! read. Requirements are counted per persistent path, so overlapping audits
//! keep a shared path interned until the last of them is released.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::core::error::{AuditError, RealmError};
use crate::core::interner::{PathInterner, PersistentPath};
use crate::core::monitor::UsageMonitor;
use crate::core::path::{Path, PathRelation, compare};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuditId(pub u64);

impl fmt::Display for AuditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audit-{}", self.0)
    }
}

/// One subscriber's claim on an audit. Must be handed back to
/// [`Catalyst::release`].
#[must_use = "subscriptions hold path requirements until released"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    audit: AuditId,
    subscriber: u64,
}

impl Subscription {
    pub fn audit(&self) -> AuditId {
        self.audit
    }
}

/// Proof that a recording is in progress; finish it to obtain a
/// [`Subscription`].
#[must_use = "an unfinished audit blocks every later audit"]
#[derive(Debug)]
pub struct AuditRecorder {
    _recording: (),
}

impl AuditRecorder {
    /// Stop recording and subscribe to the minimal set of paths read.
    pub fn finish(self, catalyst: &mut Catalyst) -> Result<Subscription, AuditError> {
        let paths = catalyst.monitor.stop()?;
        Ok(catalyst.subscribe(&paths))
    }
}

struct AuditRecord {
    paths: Vec<PersistentPath>,
    subscribers: Vec<u64>,
}

#[derive(Default)]
pub struct Catalyst {
    monitor: UsageMonitor,
    interner: PathInterner,
    audits: HashMap<AuditId, AuditRecord>,
    next_audit: u64,
    next_subscriber: u64,
}

impl Catalyst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            interner: PathInterner::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn monitor(&self) -> &UsageMonitor {
        &self.monitor
    }

    pub fn interner(&self) -> &PathInterner {
        &self.interner
    }

    pub fn start_audit(&self) -> Result<AuditRecorder, AuditError> {
        self.monitor.start()?;
        Ok(AuditRecorder { _recording: () })
    }

    /// Stop recording and throw the recorded paths away.
    pub fn cancel_audit(&mut self, recorder: AuditRecorder) -> Result<(), AuditError> {
        let AuditRecorder { _recording: () } = recorder;
        let paths = self.monitor.stop()?;
        debug!(discarded = paths.len(), "audit cancelled");
        Ok(())
    }

    /// Create an audit over `paths` with a single subscriber.
    pub fn subscribe(&mut self, paths: &[Path]) -> Subscription {
        self.next_audit += 1;
        let audit = AuditId(self.next_audit);
        let persistent: Vec<PersistentPath> = paths
            .iter()
            .map(|path| self.interner.acquire(path))
            .collect();
        let subscriber = self.allocate_subscriber();
        self.audits.insert(
            audit,
            AuditRecord {
                paths: persistent,
                subscribers: vec![subscriber],
            },
        );
        debug!(%audit, paths = paths.len(), "audit subscribed");
        Subscription { audit, subscriber }
    }

    /// Add another subscriber to the audit behind `subscription`.
    pub fn share(&mut self, subscription: &Subscription) -> Result<Subscription, AuditError> {
        let subscriber = self.allocate_subscriber();
        let record = self
            .audits
            .get_mut(&subscription.audit)
            .filter(|record| record.subscribers.contains(&subscription.subscriber))
            .ok_or_else(|| unknown(subscription))?;
        record.subscribers.push(subscriber);
        Ok(Subscription {
            audit: subscription.audit,
            subscriber,
        })
    }

    /// Drop one subscriber. The last subscriber releases every path
    /// requirement and the audit itself.
    pub fn release(&mut self, subscription: Subscription) -> Result<(), RealmError> {
        let record = self
            .audits
            .get_mut(&subscription.audit)
            .ok_or_else(|| unknown(&subscription))?;
        let before = record.subscribers.len();
        record
            .subscribers
            .retain(|subscriber| *subscriber != subscription.subscriber);
        if record.subscribers.len() == before {
            return Err(unknown(&subscription).into());
        }
        if !record.subscribers.is_empty() {
            return Ok(());
        }

        if let Some(record) = self.audits.remove(&subscription.audit) {
            for path in &record.paths {
                self.interner.release_requirement(path)?;
            }
            debug!(audit = %subscription.audit, paths = record.paths.len(), "audit released");
        }
        Ok(())
    }

    /// Paths the audit behind `subscription` depends on.
    pub fn paths(&self, subscription: &Subscription) -> Option<Vec<Path>> {
        self.audits
            .get(&subscription.audit)
            .map(|record| record.paths.iter().map(|p| p.path().clone()).collect())
    }

    /// Audits invalidated by a commit that altered `altered`.
    ///
    /// An audit is hit when one of its paths equals or contains an altered
    /// path, or lies below a deepest altered path (one with no altered path
    /// beneath it). Ancestors reached only by the commit walk are never
    /// deepest, so reads of sibling slices that kept their identity stay
    /// valid. Sorted by id.
    pub fn affected(&self, altered: &[Path]) -> Vec<AuditId> {
        let deepest: Vec<&Path> = altered
            .iter()
            .filter(|path| {
                !altered
                    .iter()
                    .any(|other| compare(path, other) == PathRelation::Ascendant)
            })
            .collect();
        let mut hits: Vec<AuditId> = self
            .audits
            .iter()
            .filter(|(_, record)| {
                record.paths.iter().any(|path| {
                    let covers = altered.iter().any(|changed| {
                        matches!(
                            compare(path.path(), changed),
                            PathRelation::Equal | PathRelation::Ascendant
                        )
                    });
                    covers
                        || deepest.iter().any(|changed| {
                            compare(path.path(), changed) == PathRelation::Descendant
                        })
                })
            })
            .map(|(id, _)| *id)
            .collect();
        hits.sort();
        hits
    }

    pub fn audit_count(&self) -> usize {
        self.audits.len()
    }

    fn allocate_subscriber(&mut self) -> u64 {
        self.next_subscriber += 1;
        self.next_subscriber
    }
}

fn unknown(subscription: &Subscription) -> AuditError {
    AuditError::UnknownSubscription {
        audit: subscription.audit.0,
        subscriber: subscription.subscriber,
    }
}
