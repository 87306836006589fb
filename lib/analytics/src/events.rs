//! Event validation
//!
//! Accepted payloads:
//!
//! ```json
//! {"type": "search", "data": {"q": "Nike shoes", "collections": ["products"]}}
//! {"type": "query_click", "data": {"q": "Nike shoes", "doc_id": "21", "user_id": "u9",
//!                                  "position": 2, "collection": "products"}}
//! ```

use crate::error::{EventError, Result};
use crate::sink::{AnalyticsSink, ClickEvent};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

pub const SEARCH_EVENT: &str = "search";
pub const QUERY_CLICK_EVENT: &str = "query_click";

/// Validates events and forwards them to an [`AnalyticsSink`]
#[derive(Clone)]
pub struct EventManager {
    sink: Arc<dyn AnalyticsSink>,
}

impl EventManager {
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self { sink }
    }

    /// Record one event.
    ///
    /// A malformed event records nothing, with one exception: a `search`
    /// event records suggestions for its collections in order, so the
    /// entries before an invalid collection are kept.
    pub fn add_event(&self, event: &Value) -> Result<()> {
        let event_type = event
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingType)?;

        match event_type {
            SEARCH_EVENT => self.add_search(event_data(event)?),
            QUERY_CLICK_EVENT => self.add_click(event_data(event)?),
            other => Err(EventError::UnknownType(other.to_string())),
        }
    }

    fn add_search(&self, data: &Map<String, Value>) -> Result<()> {
        let query = string_property(data, "q")?;
        let collections = data
            .get("collections")
            .and_then(Value::as_array)
            .ok_or(EventError::InvalidProperty("collections"))?;

        for collection in collections {
            let collection = collection
                .as_str()
                .ok_or(EventError::InvalidProperty("collections"))?;
            self.sink.add_suggestion(collection, query);
        }

        debug!("Recorded search `{}` for {} collections", query, collections.len());
        Ok(())
    }

    fn add_click(&self, data: &Map<String, Value>) -> Result<()> {
        let query = string_property(data, "q")?;
        let doc_id = string_property(data, "doc_id")?;
        let user_id = string_property(data, "user_id")?;
        let position = data
            .get("position")
            .and_then(Value::as_u64)
            .ok_or(EventError::InvalidProperty("position"))?;
        let collection = string_property(data, "collection")?;

        self.sink.add_click_event(ClickEvent {
            collection: collection.to_string(),
            query: query.to_string(),
            user_id: user_id.to_string(),
            doc_id: doc_id.to_string(),
            position,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

fn event_data(event: &Value) -> Result<&Map<String, Value>> {
    event
        .get("data")
        .and_then(Value::as_object)
        .ok_or(EventError::MissingData)
}

fn string_property<'a>(data: &'a Map<String, Value>, key: &'static str) -> Result<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or(EventError::InvalidProperty(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InMemoryAnalytics;
    use serde_json::json;

    fn manager() -> (Arc<InMemoryAnalytics>, EventManager) {
        let sink = Arc::new(InMemoryAnalytics::new());
        (sink.clone(), EventManager::new(sink))
    }

    #[test]
    fn test_search_event() {
        let (sink, events) = manager();
        let event = json!({"type": "search", "data": {"q": "Nike shoes", "collections": ["products", "brands"]}});
        events.add_event(&event).unwrap();

        assert_eq!(sink.suggestion_count("products", "Nike shoes"), 1);
        assert_eq!(sink.suggestion_count("brands", "Nike shoes"), 1);
    }

    #[test]
    fn test_search_event_partial_record() {
        let (sink, events) = manager();
        let event = json!({"type": "search", "data": {"q": "shoes", "collections": ["products", 7, "brands"]}});

        let err = events.add_event(&event).unwrap_err();
        assert_eq!(err, EventError::InvalidProperty("collections"));
        assert_eq!(sink.suggestion_count("products", "shoes"), 1);
        assert_eq!(sink.suggestion_count("brands", "shoes"), 0);
    }

    #[test]
    fn test_search_event_errors() {
        let (sink, events) = manager();

        let bad = [
            json!({"data": {"q": "x", "collections": []}}),
            json!({"type": 1, "data": {"q": "x", "collections": []}}),
            json!({"type": "search"}),
            json!({"type": "search", "data": []}),
            json!({"type": "search", "data": {"q": 1, "collections": ["c"]}}),
            json!({"type": "search", "data": {"q": "x", "collections": "c"}}),
        ];
        for event in &bad {
            assert!(events.add_event(event).is_err(), "{} should be rejected", event);
        }
        assert_eq!(sink.total_suggestions(), 0);
    }

    #[test]
    fn test_unknown_type() {
        let (sink, events) = manager();
        let err = events.add_event(&json!({"type": "purchase", "data": {}})).unwrap_err();
        assert_eq!(err, EventError::UnknownType("purchase".to_string()));
        assert_eq!(err.to_string(), "Unknown event type `purchase`");
        assert!(sink.clicks().is_empty());
    }

    #[test]
    fn test_click_event() {
        let (sink, events) = manager();
        let event = json!({
            "type": "query_click",
            "data": {"q": "shoes", "doc_id": "21", "user_id": "u9", "position": 2, "collection": "products"}
        });
        events.add_event(&event).unwrap();

        let clicks = sink.clicks_for("products");
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].doc_id, "21");
        assert_eq!(clicks[0].user_id, "u9");
        assert_eq!(clicks[0].position, 2);
    }

    #[test]
    fn test_click_event_errors() {
        let (sink, events) = manager();
        let valid = json!({"q": "shoes", "doc_id": "21", "user_id": "u9", "position": 2, "collection": "products"});

        for key in ["q", "doc_id", "user_id", "position", "collection"] {
            let mut data = valid.clone();
            data.as_object_mut().unwrap().remove(key);
            let err = events.add_event(&json!({"type": "query_click", "data": data})).unwrap_err();
            assert_eq!(err, EventError::InvalidProperty(key));
        }

        for position in [json!(-1), json!(1.5), json!("2")] {
            let mut data = valid.clone();
            data["position"] = position;
            assert!(events.add_event(&json!({"type": "query_click", "data": data})).is_err());
        }

        assert!(sink.clicks().is_empty());
    }
}
