//! Runtime for a hierarchical, reactive state container.
//!
//! State lives in a tree of *realms*. Each realm owns one slice of the value
//! mounted at its root and is addressed by a [`Path`] that starts with the
//! mount id. The crate keeps a strict split:
//!
//! - **[`core`]**: the path model, path interner, lifecycle synchronizer,
//!   transaction coordinator and usage monitor. No knowledge of node kinds,
//!   fully testable in isolation.
//! - **[`realm`]**, **[`definition`]**, **[`storage`]**: realm nodes, the
//!   node kinds they are built from, and the cells their values live in.
//! - **[`runtime`]**: mounting, path resolution, action dispatch and audits.
//! - **[`catalyst`]**: refcounted subscriptions over the paths an audit read.
//!
//! [`io`], [`logging`] and [`demo`] back the `realms` binary.

pub mod catalyst;
pub mod context;
pub mod core;
pub mod definition;
pub mod demo;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod realm;
pub mod runtime;
pub mod storage;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::catalyst::{AuditId, AuditRecorder, Catalyst, Subscription};
pub use crate::core::error::{
    AccessError, AuditError, LookupError, RealmError, StructuralError, TransactionError,
};
pub use crate::core::path::{Fragment, Path, PathRelation, Tag};
pub use crate::core::types::{MountStatus, RealmId};
pub use crate::core::value::Value;
pub use crate::definition::NodeDefinition;
pub use crate::realm::RealmHandle;
pub use crate::runtime::{Action, CommitReport, Runtime, Target};
