//! lbsync-core: Core types for the lbsync reconciler
//!
//! This crate provides the fundamental types used throughout lbsync:
//! - Frontend declarations and the resolved routing configuration
//! - Discovery metadata and the resolved service map
//! - Content fingerprints
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod model;

pub use config::*;
pub use error::*;
pub use fingerprint::Fingerprint;
pub use model::*;
