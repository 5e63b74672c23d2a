//! Reconciliation between the local task store and a remote card tracker.
//!
//! [`SyncEngine`] is the entry point: it imports boards as projects,
//! re-syncs linked projects and pushes local edits back to cards.

mod engine;
mod error;
pub mod labels;
mod locks;
mod reconcile;
mod report;

use std::time::Duration;

pub use engine::SyncEngine;
pub use error::SyncError;
pub use locks::ProjectLocks;
pub use reconcile::{PushAction, Reconciler};
pub use report::{CardAction, CardOutcome, ListFailure, PushOutcome, SyncReport};

#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Once elapsed, no further list is fetched during a walk.
    pub deadline: Option<Duration>,
}
