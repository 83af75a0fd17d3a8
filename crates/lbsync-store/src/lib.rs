//! lbsync-store: Storage and hand-off
//!
//! This crate provides the file-backed collaborators of the reconciler:
//! - The frontend declaration store
//! - The snapshot writer subscriber that hands committed configuration to the load balancer

pub mod declarations;
pub mod snapshot;

pub use declarations::DeclarationStore;
pub use snapshot::SnapshotWriter;
