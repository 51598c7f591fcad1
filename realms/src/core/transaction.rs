//! Transaction coordinator: one in-flight mutation, altered-ancestor set.

use std::collections::HashSet;

use tracing::debug;

use crate::core::error::TransactionError;
use crate::core::types::RealmId;
use crate::core::value::Value;

/// Read-only view of the realm tree needed to close a transaction.
pub trait RealmGraph {
    fn parent_of(&self, realm: RealmId) -> Option<RealmId>;
    /// Current value of `realm`, or `None` if it is no longer live.
    fn current_value(&self, realm: RealmId) -> Option<Value>;
}

#[derive(Debug, Default)]
pub struct TransactionCoordinator {
    active: bool,
    touched: HashSet<RealmId>,
    baselines: Vec<(RealmId, Value)>,
}

impl TransactionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn begin(&mut self) -> Result<(), TransactionError> {
        if self.active {
            return Err(TransactionError::AlreadyInProgress);
        }
        self.active = true;
        Ok(())
    }

    /// Record `baseline` as the value of `realm` before this transaction
    /// touched it. Later calls for the same realm are ignored.
    pub fn register_altered(&mut self, realm: RealmId, baseline: Value) -> Result<(), TransactionError> {
        if !self.active {
            return Err(TransactionError::NotInProgress);
        }
        if self.touched.insert(realm) {
            self.baselines.push((realm, baseline));
        }
        Ok(())
    }

    /// Close the transaction and return every realm that must be treated as
    /// altered: each touched realm whose value differs from its baseline,
    /// plus its ancestors. Each realm appears once, in first-visit order.
    pub fn commit<G: RealmGraph>(&mut self, graph: &G) -> Result<Vec<RealmId>, TransactionError> {
        if !self.active {
            return Err(TransactionError::NotInProgress);
        }

        let mut completed = HashSet::new();
        let mut altered = Vec::new();
        for (realm, baseline) in &self.baselines {
            let changed = graph
                .current_value(*realm)
                .is_some_and(|current| !current.same(baseline));
            if !changed {
                continue;
            }

            let mut cursor = Some(*realm);
            while let Some(current) = cursor {
                if !completed.insert(current) {
                    break;
                }
                altered.push(current);
                cursor = graph.parent_of(current);
            }
        }

        debug!(
            touched = self.baselines.len(),
            altered = altered.len(),
            "transaction committed"
        );
        self.reset();
        Ok(altered)
    }

    /// Abandon the transaction without computing anything.
    pub fn abort(&mut self) {
        if self.active {
            debug!(touched = self.baselines.len(), "transaction aborted");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.touched.clear();
        self.baselines.clear();
        self.active = false;
    }
}
