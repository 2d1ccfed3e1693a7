//! # Stream Ingestors Module
//!
//! Clients for the platform's realtime upstream services. Each submodule
//! owns one persistent connection: establishment, lifecycle logging,
//! reconnection, and the routing of inbound events into the fan-out bus.

/// The WebSocket client for the backend search/AI stream.
pub mod search_wss;
