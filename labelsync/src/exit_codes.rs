//! Stable exit codes for labelsync CLI commands.

/// Command succeeded (a batch may still have skipped or declined events).
pub const OK: i32 = 0;
/// Invalid invocation, config, edition or cursor value.
pub const INVALID: i32 = 1;
/// A run halted on a wiki or repository failure; the cursor was left at the
/// last completed event.
pub const TRANSPORT: i32 = 2;
