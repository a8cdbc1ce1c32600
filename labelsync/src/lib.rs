//! Keeps item labels in step with page moves on a wiki.
//!
//! Follows the move log of one language edition and, for every page that
//! moved, decides whether the linked item's label should follow the new
//! title. The crate is split the usual way:
//!
//! - **[`core`]**: Pure, deterministic rules (label decision, forbidden
//!   substrings, redirect title folding, event filtering, cursor ordering).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (action API clients, config,
//!   cursor files, journals, terminal prompts) behind traits so tests can
//!   substitute fakes.
//!
//! Orchestration modules ([`reconcile`], [`run`]) tie core rules to the
//! collaborators to implement `labelsync run`.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod reconcile;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
