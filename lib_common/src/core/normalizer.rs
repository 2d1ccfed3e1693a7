//! # Inbound Message Normalizer
//!
//! The wire protocol for search results went through three incompatible
//! generations: a bare array, an enveloped `{results, cache}` object, and a
//! multi-entity object with or without AI post-processing. This module
//! absorbs that history: each inbound payload is classified into a closed set
//! of wire variants (tried in priority order) and converted into one
//! [`SearchEvent`], so exactly one consumer-facing contract exists. A payload
//! matching no known variant becomes an explicit error the channel loop logs
//! and drops; it is never coerced or partially fanned out.
//!
//! The normalizer holds no state and performs no I/O.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::core::model::{
    AiSummary, CategoryResults, FilterDescriptor, ProcessedResultItem, SearchEvent,
    SearchResultItem,
};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("results payload is neither an array nor a {{results, cache}} object")]
    UnrecognizedResults,
    #[error("multi-entity payload carries neither an AI bundle nor a per-category results map")]
    UnrecognizedMulti,
    #[error("failed to decode {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn decode<T: serde::de::DeserializeOwned>(
    context: &'static str,
    value: &Value,
) -> Result<T, NormalizeError> {
    serde_json::from_value(value.clone()).map_err(|source| NormalizeError::Decode { context, source })
}

/// Wire generations of the legacy results channel, in recognition order.
enum ResultsWire {
    /// Oldest shape: a bare ordered array of result items.
    Flat(Vec<SearchResultItem>),
    /// Enveloped shape: `{results: [...], cache?: <opaque>}`.
    Enveloped {
        results: Vec<SearchResultItem>,
        cache: Option<Value>,
    },
}

fn classify_results(raw: &Value) -> Result<ResultsWire, NormalizeError> {
    if raw.is_array() {
        return Ok(ResultsWire::Flat(decode("flat results array", raw)?));
    }
    if let Value::Object(map) = raw {
        if let Some(results) = map.get("results") {
            return Ok(ResultsWire::Enveloped {
                results: decode("enveloped results array", results)?,
                cache: map.get("cache").cloned().filter(|v| !v.is_null()),
            });
        }
    }
    Err(NormalizeError::UnrecognizedResults)
}

/// Normalizes a `search_results` payload (legacy channel).
pub fn normalize_results(raw: &Value) -> Result<SearchEvent, NormalizeError> {
    match classify_results(raw)? {
        ResultsWire::Flat(flat_results) => Ok(SearchEvent {
            flat_results,
            ..SearchEvent::default()
        }),
        ResultsWire::Enveloped { results, cache } => Ok(SearchEvent {
            flat_results: results,
            cache_token: cache,
            ..SearchEvent::default()
        }),
    }
}

/// Wire generations of the multi-entity channel, in priority order.
enum MultiWire {
    /// AI bundle: both `processedResults` and `dynamicFilters` present.
    AiProcessed {
        processed: Vec<ProcessedResultItem>,
        filters: Vec<FilterDescriptor>,
        summary: Option<AiSummary>,
        cache: Option<Value>,
        raw_map: Option<CategoryResults>,
    },
    /// Legacy bundle: a per-category `results` map without AI fields.
    Legacy {
        map: CategoryResults,
        raw_map: Value,
        cache: Option<Value>,
    },
}

fn classify_multi(raw: &Value) -> Result<MultiWire, NormalizeError> {
    let Value::Object(map) = raw else {
        return Err(NormalizeError::UnrecognizedMulti);
    };

    let processed = map.get("processedResults").filter(|v| !v.is_null());
    let filters = map.get("dynamicFilters").filter(|v| !v.is_null());
    if let (Some(processed), Some(filters)) = (processed, filters) {
        let raw_map = match map.get("results").filter(|v| v.is_object()) {
            Some(results) => Some(decode("per-category results map", results)?),
            None => None,
        };
        return Ok(MultiWire::AiProcessed {
            processed: decode("AI-processed results", processed)?,
            filters: decode("dynamic filters", filters)?,
            summary: match map.get("aiSummary").filter(|v| !v.is_null()) {
                Some(summary) => Some(decode("AI summary", summary)?),
                None => None,
            },
            cache: map.get("cache").cloned().filter(|v| !v.is_null()),
            raw_map,
        });
    }

    if let Some(results) = map.get("results").filter(|v| v.is_object()) {
        return Ok(MultiWire::Legacy {
            map: decode("per-category results map", results)?,
            raw_map: results.clone(),
            cache: map.get("cache").cloned().filter(|v| !v.is_null()),
        });
    }

    Err(NormalizeError::UnrecognizedMulti)
}

/// Normalizes a `multi_search_results` payload.
pub fn normalize_multi(raw: &Value) -> Result<SearchEvent, NormalizeError> {
    let search_type = raw
        .get("search_type")
        .and_then(Value::as_str)
        .map(str::to_string);
    let human_summary = raw
        .get("summary")
        .and_then(Value::as_str)
        .map(str::to_string);

    match classify_multi(raw)? {
        MultiWire::AiProcessed {
            processed,
            filters,
            summary,
            cache,
            raw_map,
        } => {
            // The raw per-category map rides along for subscribers written
            // against the pre-AI contract; the flat view is derived from it.
            let (structured_results, flat_results) = match raw_map {
                Some(map) => {
                    let flat = map.flatten();
                    (Some(map), flat)
                }
                None => (None, Vec::new()),
            };
            Ok(SearchEvent {
                flat_results,
                structured_results,
                ai_processed_results: Some(processed),
                dynamic_filters: Some(filters),
                ai_summary: summary,
                cache_token: cache,
                search_type,
                human_summary,
            })
        }
        MultiWire::Legacy {
            map,
            raw_map,
            cache,
        } => {
            let flat_results = map.flatten();
            Ok(SearchEvent {
                flat_results,
                structured_results: Some(map),
                cache_token: Some(synthesize_cache_token(cache, raw_map)),
                search_type,
                human_summary,
                ..SearchEvent::default()
            })
        }
    }
}

// Compatibility shim: older subscribers locate the per-category map through
// an `enhanced_results` field on the cache object, so one is synthesized by
// shallow-merging it into whatever cache the server provided.
fn synthesize_cache_token(cache: Option<Value>, raw_map: Value) -> Value {
    let mut merged = match cache {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    merged.insert("enhanced_results".to_string(), raw_map);
    Value::Object(merged)
}

/// Normalizes an `ai_message` payload: a bare string is wrapped into the
/// canonical function-call envelope, anything else passes through unchanged.
pub fn normalize_chat(raw: Value) -> Value {
    match raw {
        Value::String(message) => json!({
            "function": "reply",
            "parameters": { "message": message }
        }),
        other => other,
    }
}
