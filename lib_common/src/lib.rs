//! # Dalil Search-Stream Client Library
//!
//! Shared client core for the Dalil local-search platform: the persistent
//! full-duplex channel to the backend search/AI service, normalization of
//! its evolved wire shapes into one canonical model, the typed fan-out bus
//! for UI subscribers, the location permission negotiation, and the
//! device-local stored state the outbound composer reads.

// Declare the modules to re-export
pub mod configs;
pub mod core;
pub mod ingestors;
pub mod loggers;
pub mod storage;

// Re-export the primary API surface
pub use crate::configs::config_sys::{
    resolve_endpoint, BuildMode, EndpointConfig, PageOrigin, StreamConfig, PRIMARY_DOMAIN,
    PRODUCTION_ENDPOINT,
};
pub use crate::core::composer::compose_user_message;
pub use crate::core::dispatcher::{Dispatcher, EventBus, SubscriptionHandle};
pub use crate::core::location::{
    FixedPositionProvider, LocationCoordinator, PositionError, PositionProvider,
};
pub use crate::core::model::{
    AiSummary, CategoryResults, FilterDescriptor, GeoCoordinate, LocationOutcome,
    ProcessedResultItem, SearchEvent, SearchResultItem, Translation, WireFrame,
};
pub use crate::core::normalizer::{
    normalize_chat, normalize_multi, normalize_results, NormalizeError,
};
pub use crate::ingestors::search_wss::{EmitHandle, SearchStreamClient};
pub use crate::loggers::diagrecord::{DiagLevel, DiagRecord};
pub use crate::loggers::sink::{Diag, DiagnosticSink, LogSink, MemorySink};
pub use crate::storage::local_store::{DeviceStore, StoreError, USER_LOCATION_KEY};
