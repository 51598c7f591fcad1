//! Deterministic, pure building blocks shared by the realm runtime.
//!
//! Core modules own no realm tree and perform no I/O. They operate on ids,
//! paths and values handed to them by the runtime and are tested in isolation.

pub mod error;
pub mod interner;
pub mod lifecycle;
pub mod monitor;
pub mod path;
pub mod transaction;
pub mod types;
pub mod value;
