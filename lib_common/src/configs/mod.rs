//! # Configuration Modules
//!
//! Stream configuration and the endpoint-resolution policy for the
//! persistent search channel.

/// Endpoint resolution and stream configuration.
pub mod config_sys;
