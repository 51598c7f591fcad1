//! Stable exit codes for realms CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid input, config, or a runtime error.
pub const INVALID: i32 = 1;
