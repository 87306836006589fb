use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A click on a search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClickEvent {
    pub collection: String,
    pub query: String,
    pub user_id: String,
    pub doc_id: String,
    pub position: u64,
    pub timestamp: DateTime<Utc>,
}

/// Receiver of the signals recorded by [`crate::EventManager`]
pub trait AnalyticsSink: Send + Sync {
    fn add_suggestion(&self, collection: &str, query: &str);

    fn add_click_event(&self, event: ClickEvent);
}

/// Sink that keeps every signal in memory
#[derive(Debug, Default)]
pub struct InMemoryAnalytics {
    // collection -> query -> count
    suggestions: RwLock<AHashMap<String, AHashMap<String, u64>>>,
    clicks: RwLock<Vec<ClickEvent>>,
}

impl InMemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `query` was suggested for `collection`.
    pub fn suggestion_count(&self, collection: &str, query: &str) -> u64 {
        self.suggestions
            .read()
            .get(collection)
            .and_then(|queries| queries.get(query))
            .copied()
            .unwrap_or(0)
    }

    /// Queries recorded for `collection`, most frequent first.
    pub fn top_queries(&self, collection: &str, limit: usize) -> Vec<(String, u64)> {
        let suggestions = self.suggestions.read();
        let Some(queries) = suggestions.get(collection) else {
            return Vec::new();
        };

        let mut ranked: Vec<(String, u64)> = queries.iter().map(|(q, c)| (q.clone(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub fn clicks(&self) -> Vec<ClickEvent> {
        self.clicks.read().clone()
    }

    pub fn clicks_for(&self, collection: &str) -> Vec<ClickEvent> {
        self.clicks
            .read()
            .iter()
            .filter(|c| c.collection == collection)
            .cloned()
            .collect()
    }

    pub fn total_suggestions(&self) -> u64 {
        self.suggestions.read().values().flat_map(|q| q.values()).sum()
    }
}

impl AnalyticsSink for InMemoryAnalytics {
    fn add_suggestion(&self, collection: &str, query: &str) {
        let mut suggestions = self.suggestions.write();
        *suggestions
            .entry(collection.to_string())
            .or_default()
            .entry(query.to_string())
            .or_insert(0) += 1;
    }

    fn add_click_event(&self, event: ClickEvent) {
        self.clicks.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(collection: &str, position: u64) -> ClickEvent {
        ClickEvent {
            collection: collection.to_string(),
            query: "shoes".to_string(),
            user_id: "u1".to_string(),
            doc_id: "d1".to_string(),
            position,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_suggestion_counts() {
        let sink = InMemoryAnalytics::new();
        sink.add_suggestion("products", "nike");
        sink.add_suggestion("products", "nike");
        sink.add_suggestion("products", "adidas");
        sink.add_suggestion("brands", "nike");

        assert_eq!(sink.suggestion_count("products", "nike"), 2);
        assert_eq!(sink.suggestion_count("brands", "nike"), 1);
        assert_eq!(sink.suggestion_count("brands", "adidas"), 0);
        assert_eq!(sink.total_suggestions(), 4);
        assert_eq!(
            sink.top_queries("products", 1),
            vec![("nike".to_string(), 2)]
        );
        assert!(sink.top_queries("missing", 5).is_empty());
    }

    #[test]
    fn test_click_events() {
        let sink = InMemoryAnalytics::new();
        sink.add_click_event(click("products", 1));
        sink.add_click_event(click("brands", 3));

        assert_eq!(sink.clicks().len(), 2);
        let product_clicks = sink.clicks_for("products");
        assert_eq!(product_clicks.len(), 1);
        assert_eq!(product_clicks[0].position, 1);
    }

    #[test]
    fn test_click_event_serialization() {
        let event = click("products", 2);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["position"], 2);
        assert!(json["timestamp"].is_string());

        let back: ClickEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
