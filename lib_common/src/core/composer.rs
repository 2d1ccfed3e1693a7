//! # Outbound Message Composer
//!
//! Builds the `user_message` payload for a user query, enriched with the last
//! granted device location when one is stored. Fire-and-forget: the protocol
//! carries no request/response correlation, so callers needing isolation
//! serialize their own queries.

use serde_json::{json, Value};

use crate::core::model::GeoCoordinate;
use crate::storage::local_store::{DeviceStore, USER_LOCATION_KEY};

/// Composes the query payload: `{message}` when no location is stored,
/// `{message, userLocation}` otherwise. A corrupt stored value reads as
/// absent rather than failing the send.
pub fn compose_user_message(message: &str, store: &DeviceStore) -> Value {
    match store.get_json::<GeoCoordinate>(USER_LOCATION_KEY) {
        Some(location) => json!({ "message": message, "userLocation": location }),
        None => json!({ "message": message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn message_only_when_no_location_stored() {
        let dir = tempdir().expect("tempdir");
        let store = DeviceStore::open(dir.path().join("device_store.json"));

        let payload = compose_user_message("pharmacy near me", &store);
        assert_eq!(payload, json!({"message": "pharmacy near me"}));
    }

    #[test]
    fn stored_location_is_attached() {
        let dir = tempdir().expect("tempdir");
        let store = DeviceStore::open(dir.path().join("device_store.json"));
        store
            .put(USER_LOCATION_KEY, &GeoCoordinate { lat: 30.05, lon: 31.23 })
            .expect("put");

        let payload = compose_user_message("pharmacy near me", &store);
        assert_eq!(
            payload,
            json!({
                "message": "pharmacy near me",
                "userLocation": {"lat": 30.05, "lon": 31.23}
            })
        );
    }

    #[test]
    fn corrupt_stored_location_is_discarded() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("device_store.json");
        std::fs::write(&path, r#"{"userLocation": "31.2,30.0"}"#).expect("write");
        let store = DeviceStore::open(&path);

        let payload = compose_user_message("pharmacy near me", &store);
        assert_eq!(payload, json!({"message": "pharmacy near me"}));
    }
}
