//! lbsync-discovery: Service discovery
//!
//! This crate provides the discovery side of lbsync:
//! - Fetching the raw service document from the discovery backend
//! - Resolving link environment variables into a service map

pub mod client;
pub mod resolver;

pub use client::{DiscoveryClient, HttpDiscoveryClient};
pub use resolver::resolve;
