//! Event catalog service.
//!
//! The browse and event detail pages read events through [`EventCatalog`].
//! [`InMemoryEventCatalog`] serves a fixed list with simulated latency, which
//! is all the storefront needs until the events API lands.

use crate::error::{CheckoutError, CheckoutResult};
use crate::types::{CartItem, Money};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventdesk_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Event identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wraps an event id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A listed event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event id
    pub id: EventId,
    /// Title
    pub title: String,
    /// Long description
    #[serde(default)]
    pub description: String,
    /// Category slug (`music`, `sports`, ...)
    pub category: String,
    /// Venue name
    pub venue: String,
    /// City or area
    #[serde(default)]
    pub location: String,
    /// Start time
    pub starts_at: DateTime<Utc>,
    /// End time
    pub ends_at: Option<DateTime<Utc>>,
    /// Ticket price; zero for free events
    pub price: Money,
    /// Tickets left
    pub tickets_available: u32,
    /// Shown in the featured carousel
    #[serde(default)]
    pub featured: bool,
    /// Cover image URL
    #[serde(default)]
    pub image: String,
}

impl Event {
    /// True when no ticket is left
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.tickets_available == 0
    }

    /// True for free events
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.price.is_zero()
    }

    /// Cart line for `quantity` tickets to this event
    #[must_use]
    pub fn to_cart_item(&self, quantity: u32) -> CartItem {
        CartItem {
            id: self.id.to_string(),
            title: self.title.clone(),
            price: self.price,
            quantity,
            image: self.image.clone(),
        }
    }

    fn mentions(&self, needle: &str) -> bool {
        [&self.title, &self.venue, &self.location, &self.description]
            .iter()
            .any(|text| text.to_lowercase().contains(needle))
    }
}

/// Browse filters; an empty filter matches every event
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Only this category (case-insensitive)
    pub category: Option<String>,
    /// Case-insensitive search over title, venue, location and description
    pub search: Option<String>,
    /// Price ceiling
    pub max_price: Option<Money>,
    /// Only free events
    pub free_only: bool,
    /// Starting at or after
    pub from: Option<DateTime<Utc>>,
    /// Starting at or before
    pub until: Option<DateTime<Utc>>,
    /// Hide events that already started
    pub upcoming_only: bool,
}

impl EventFilter {
    /// Matches everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a category
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Restrict to events mentioning `text`
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Restrict to events costing at most `price`
    #[must_use]
    pub const fn max_price(mut self, price: Money) -> Self {
        self.max_price = Some(price);
        self
    }

    /// Restrict to free events
    #[must_use]
    pub const fn free_only(mut self) -> Self {
        self.free_only = true;
        self
    }

    /// Restrict to events starting within `[from, until]`
    #[must_use]
    pub const fn between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.until = Some(until);
        self
    }

    /// Hide events that already started
    #[must_use]
    pub const fn upcoming(mut self) -> Self {
        self.upcoming_only = true;
        self
    }

    /// True when `event` passes every set filter
    #[must_use]
    pub fn matches(&self, event: &Event, now: DateTime<Utc>) -> bool {
        if self
            .category
            .as_ref()
            .is_some_and(|category| !event.category.eq_ignore_ascii_case(category.trim()))
        {
            return false;
        }

        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty() && !event.mentions(&needle) {
                return false;
            }
        }

        if self.max_price.is_some_and(|max| event.price > max) {
            return false;
        }
        if self.free_only && !event.is_free() {
            return false;
        }
        if self.from.is_some_and(|from| event.starts_at < from) {
            return false;
        }
        if self.until.is_some_and(|until| event.starts_at > until) {
            return false;
        }

        !(self.upcoming_only && event.starts_at < now)
    }
}

/// Read access to listed events
#[async_trait]
pub trait EventCatalog: Send + Sync {
    /// Events passing `filter`, soonest first
    async fn list(&self, filter: &EventFilter) -> CheckoutResult<Vec<Event>>;

    /// One event
    ///
    /// # Errors
    ///
    /// [`CheckoutError::NotFound`] when the id is unknown.
    async fn get(&self, id: &EventId) -> CheckoutResult<Event>;

    /// Upcoming featured events, soonest first
    async fn featured(&self) -> CheckoutResult<Vec<Event>>;

    /// Distinct categories, sorted
    async fn categories(&self) -> CheckoutResult<Vec<String>>;
}

/// Catalog over a fixed list of events
pub struct InMemoryEventCatalog {
    events: Vec<Event>,
    latency: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryEventCatalog {
    /// Catalog with no simulated latency
    #[must_use]
    pub fn new(events: Vec<Event>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events,
            latency: Duration::ZERO,
            clock,
        }
    }

    /// Delay every call by `latency`
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn sorted(mut events: Vec<Event>) -> Vec<Event> {
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then_with(|| a.id.cmp(&b.id)));
        events
    }
}

#[async_trait]
impl EventCatalog for InMemoryEventCatalog {
    async fn list(&self, filter: &EventFilter) -> CheckoutResult<Vec<Event>> {
        self.simulate_latency().await;

        let now = self.clock.now();
        let events: Vec<Event> = self
            .events
            .iter()
            .filter(|event| filter.matches(event, now))
            .cloned()
            .collect();

        tracing::debug!(matched = events.len(), total = self.events.len(), "Listed events");
        Ok(Self::sorted(events))
    }

    async fn get(&self, id: &EventId) -> CheckoutResult<Event> {
        self.simulate_latency().await;

        self.events
            .iter()
            .find(|event| &event.id == id)
            .cloned()
            .ok_or_else(|| CheckoutError::NotFound {
                what: "Event".to_string(),
            })
    }

    async fn featured(&self) -> CheckoutResult<Vec<Event>> {
        self.simulate_latency().await;

        let now = self.clock.now();
        let events = self
            .events
            .iter()
            .filter(|event| event.featured && event.starts_at >= now)
            .cloned()
            .collect();

        Ok(Self::sorted(events))
    }

    async fn categories(&self) -> CheckoutResult<Vec<String>> {
        self.simulate_latency().await;

        let categories: BTreeSet<String> = self
            .events
            .iter()
            .map(|event| event.category.to_lowercase())
            .collect();

        Ok(categories.into_iter().collect())
    }
}
