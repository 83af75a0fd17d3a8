//! lbsync-api: Admin API for lbsync
//!
//! This crate provides the operator facing HTTP API:
//! - Replacing the frontend declarations
//! - Inspecting the committed configuration
//! - Reconciler status

pub mod auth;
pub mod rest;

pub use auth::Credentials;
pub use rest::create_router;
