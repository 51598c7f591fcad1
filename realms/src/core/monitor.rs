//! Usage monitor: records which paths a read touched.
//!
//! At most one cassette records at a time. Nested recording is rejected with
//! [`AuditError::AlreadyRecording`]; selector evaluation is not reentrant.

use std::cell::RefCell;

use crate::core::error::AuditError;
use crate::core::path::{Path, PathRelation, compare};

/// Recorded paths. Slots are nulled instead of removed so indices stay put
/// while scanning.
type Cassette = Vec<Option<Path>>;

#[derive(Default)]
pub struct UsageMonitor {
    cassette: RefCell<Option<Cassette>>,
}

impl UsageMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Result<(), AuditError> {
        let mut slot = self.cassette.borrow_mut();
        if slot.is_some() {
            return Err(AuditError::AlreadyRecording);
        }
        *slot = Some(Vec::new());
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.cassette.borrow().is_some()
    }

    /// Record a read of `path`. Ignored while no cassette is recording.
    pub fn register_value_usage(&self, path: &Path) {
        let mut slot = self.cassette.borrow_mut();
        let Some(cassette) = slot.as_mut() else {
            return;
        };

        for entry in &mut *cassette {
            let Some(existing) = entry else {
                continue;
            };
            match compare(existing, path) {
                PathRelation::Equal | PathRelation::Ascendant => return,
                PathRelation::Descendant => *entry = None,
                PathRelation::Disjoint => {}
            }
        }
        cassette.push(Some(path.clone()));
    }

    /// Stop recording and return the minimal set of paths covering every
    /// read: no returned path is an ascendant or descendant of another.
    pub fn stop(&self) -> Result<Vec<Path>, AuditError> {
        let cassette = self
            .cassette
            .borrow_mut()
            .take()
            .ok_or(AuditError::NotRecording)?;
        Ok(cassette.into_iter().flatten().collect())
    }
}
