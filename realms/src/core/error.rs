//! Error taxonomy for the realm runtime.
//!
//! Every variant is a programming or integration error: the runtime never
//! retries and never recovers silently. Paths are carried in their rendered
//! diagnostic form.

use thiserror::Error;

use crate::core::types::RealmId;

/// Tree-shape violations: mounting, enrolling, dismissing and resolving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("mount id '{id}' is already in use")]
    DuplicateMount { id: String },
    #[error("no mount named '{id}'")]
    UnknownMount { id: String },
    #[error("realm {realm} is already enrolled")]
    AlreadyEnrolled { realm: RealmId },
    #[error("cannot enroll realm {realm}: parent {parent} is neither mounted nor pending")]
    OrphanEnroll { realm: RealmId, parent: RealmId },
    #[error("cannot enroll realm {realm}: parent {parent} is queued for dismissal")]
    ParentDismissed { realm: RealmId, parent: RealmId },
    #[error("cannot dismiss realm {realm}: it is still pending")]
    DismissPending { realm: RealmId },
    #[error("cannot dismiss realm {realm}: it is not mounted")]
    DismissUnknown { realm: RealmId },
    #[error("no realm {realm} in this runtime")]
    UnknownRealm { realm: RealmId },
    #[error("{path} has no child at fragment '{fragment}'")]
    MissingChild { path: String, fragment: String },
    #[error("cannot resolve an empty path")]
    EmptyPath,
    #[error("{path} is {depth} fragments deep (limit {limit})")]
    PathTooDeep {
        path: String,
        depth: usize,
        limit: usize,
    },
    #[error("{path} has no action '{key}'")]
    UnknownAction { path: String, key: String },
    #[error("{path} has no selector '{name}'")]
    UnknownSelector { path: String, name: String },
    #[error("cannot write fragment '{fragment}' into a {found} value")]
    ShapeMismatch { fragment: String, found: &'static str },
}

/// Misuse of the single in-flight transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("a transaction is already in progress")]
    AlreadyInProgress,
    #[error("no transaction is in progress")]
    NotInProgress,
}

/// Access through a realm id or handle that is not live.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("realm {realm} is pending and cannot be accessed yet")]
    Pending { realm: RealmId },
    #[error("realm {realm} has been unmounted")]
    Unmounted { realm: RealmId },
}

/// Persistent-path bookkeeping against an entry that is not interned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("path {path} is not interned")]
    NotInterned { path: String },
}

/// Misuse of the usage monitor or catalyst.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("an audit is already recording")]
    AlreadyRecording,
    #[error("no audit is recording")]
    NotRecording,
    #[error("unknown subscription (audit {audit}, subscriber {subscriber})")]
    UnknownSubscription { audit: u64, subscriber: u64 },
}

/// Umbrella error returned by the runtime surface.
#[derive(Debug, Error)]
pub enum RealmError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("action '{key}' on {path} failed")]
    Mutation {
        key: String,
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("selector '{name}' on {path} failed")]
    Selector {
        name: String,
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RealmError {
    pub fn is_access(&self) -> bool {
        matches!(self, RealmError::Access(_))
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, RealmError::Structural(_))
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, RealmError::Transaction(_))
    }
}

pub type Result<T, E = RealmError> = std::result::Result<T, E>;
