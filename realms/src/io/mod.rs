//! I/O helpers for the realms CLI.

pub mod config;
