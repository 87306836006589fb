//! # docflat Analytics
//!
//! Event ingestion for search suggestions and result clicks. Events are
//! validated by [`EventManager`] and recorded through an injected
//! [`AnalyticsSink`].

pub mod error;
pub mod events;
pub mod sink;

pub use error::{EventError, Result};
pub use events::{EventManager, QUERY_CLICK_EVENT, SEARCH_EVENT};
pub use sink::{AnalyticsSink, ClickEvent, InMemoryAnalytics};
