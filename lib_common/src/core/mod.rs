//! # Core Engine Module
//!
//! The protocol core of the search-stream client:
//!
//! - **`model`**: the canonical data model every inbound wire shape becomes.
//! - **`normalizer`**: tagged-union decode of the wire's three generations
//!   into one canonical event.
//! - **`dispatcher`**: the typed fan-out bus with opaque subscription
//!   handles and per-callback failure isolation.
//! - **`composer`**: outbound query payloads, enriched with stored location.
//! - **`location`**: the device-position permission negotiation.

/// Outbound query payload composition.
pub mod composer;
/// Typed fan-out bus and subscription handles.
pub mod dispatcher;
/// Location permission negotiation and the position-provider seam.
pub mod location;
/// Canonical data model for wire and stored shapes.
pub mod model;
/// Wire-shape normalization into canonical events.
pub mod normalizer;
