//! # Plexus Common
//!
//! Common types shared across the Plexus middleware runtime.
//!
//! This crate provides the foundational pieces every other Plexus crate
//! builds upon: the error type and the service-address model that binds
//! application code to transports without naming any of them.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{Error, Result, ResultExt};
pub use types::{BindingName, ConnectionId, ServiceAddress, DEFAULT_DOMAIN};
