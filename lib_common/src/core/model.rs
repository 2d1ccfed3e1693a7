use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON frame exchanged over the persistent channel: an event name plus an
/// arbitrary payload. `request_location` arrives with no payload at all, so
/// `data` defaults to null; outbound null payloads (a denied
/// `location_response`) are written out explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Device coordinates persisted under [`crate::storage::local_store::USER_LOCATION_KEY`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Outcome of one location-permission negotiation, fanned out to local
/// subscribers. Capability absent, provider failure, and timeout all
/// collapse to `Denied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationOutcome {
    Granted,
    Denied,
}

/// Bilingual display-name pair carried by directory entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Translation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_ar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
}

/// # Search Result Item
///
/// One ranked directory entity (shop, service, product, or person). `id` is
/// unique within a single result set only. Unknown wire fields are kept in
/// `extra` so normalization never loses data the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchResultItem {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<Translation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(rename = "isRecommended", skip_serializing_if = "Option::is_none")]
    pub is_recommended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-category partition of a multi-entity result set. Flattening order is
/// part of the contract: services, then users, then shops, then products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CategoryResults {
    pub services: Vec<SearchResultItem>,
    pub users: Vec<SearchResultItem>,
    pub shops: Vec<SearchResultItem>,
    pub products: Vec<SearchResultItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CategoryResults {
    pub fn flatten(&self) -> Vec<SearchResultItem> {
        let mut all = Vec::with_capacity(
            self.services.len() + self.users.len() + self.shops.len() + self.products.len(),
        );
        all.extend(self.services.iter().cloned());
        all.extend(self.users.iter().cloned());
        all.extend(self.shops.iter().cloned());
        all.extend(self.products.iter().cloned());
        all
    }

    pub fn total(&self) -> usize {
        self.services.len() + self.users.len() + self.shops.len() + self.products.len()
    }
}

/// AI-enriched result item. Nested blocks (location, contact, rating,
/// category, metadata) stay opaque JSON; subscribers render them as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProcessedResultItem {
    pub id: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Value>,
    #[serde(rename = "filterTags", skip_serializing_if = "Option::is_none")]
    pub filter_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One server-generated filter descriptor (chip) for the result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FilterDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// AI post-processing summary of a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AiSummary {
    #[serde(rename = "totalResults", skip_serializing_if = "Option::is_none")]
    pub total_results: Option<i64>,
    #[serde(rename = "primaryType", skip_serializing_if = "Option::is_none")]
    pub primary_type: Option<String>,
    #[serde(rename = "topCategories", skip_serializing_if = "Option::is_none")]
    pub top_categories: Option<Vec<String>>,
    #[serde(rename = "hasRecommended", skip_serializing_if = "Option::is_none")]
    pub has_recommended: Option<bool>,
    #[serde(rename = "searchQuality", skip_serializing_if = "Option::is_none")]
    pub search_quality: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// # Canonical Search Event
///
/// The single normalized shape every inbound result message becomes,
/// regardless of which wire generation produced it. `flat_results` is always
/// populated so subscribers written against the oldest contract keep working;
/// the richer fields are present only when the server sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SearchEvent {
    pub flat_results: Vec<SearchResultItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_results: Option<CategoryResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_processed_results: Option<Vec<ProcessedResultItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_filters: Option<Vec<FilterDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<AiSummary>,
    /// Opaque server reference for retrieving this result set later.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_token: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_summary: Option<String>,
}
