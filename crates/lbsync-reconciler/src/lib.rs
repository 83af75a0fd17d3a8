//! lbsync-reconciler: Reconciliation of routing configuration
//!
//! This crate turns discovered topology into routing configuration:
//! - Building resolved frontends from declarations and a service map
//! - Detecting changes between poll cycles
//! - Notifying subscribers of committed configurations
//! - Running the poll loop as a single task

pub mod builder;
pub mod notifier;
pub mod reconciler;
pub mod task;

#[cfg(test)]
mod testing;

pub use builder::build;
pub use notifier::ChangeNotifier;
pub use reconciler::{CycleStats, PollOutcome, Reconciler};
pub use task::ReconcilerHandle;
