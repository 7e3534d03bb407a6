//! # Event Bus
//!
//! Priority-ordered publish/subscribe for CMS events.
//!
//! ## Dispatch Rules
//!
//! - Handlers for an event name run one after another on the publishing task,
//!   in ascending `priority` order. Equal priorities keep registration order.
//! - The dispatch value is the last non-null [`HandlerResult::Value`].
//! - [`HandlerResult::Stop`] (or a `Value(false)`) halts dispatch immediately;
//!   the dispatch value is then `false`.
//! - A handler error or panic is logged and collected in [`Dispatch::errors`];
//!   the remaining handlers still run.
//!
//! ## Usage
//!
//! ```rust
//! use cms_core::events::{handler, Event, EventBus, HandlerResult};
//! use serde_json::json;
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! bus.subscribe(
//!     "shop.order_placed",
//!     handler(|_event| async { Ok(HandlerResult::Value(json!("receipt sent"))) }),
//!     5,
//! );
//!
//! let dispatch = bus
//!     .publish(Event::custom("shop.order_placed", json!({"order_id": 1})))
//!     .await;
//! assert_eq!(dispatch.value, Some(json!("receipt sent")));
//! # }
//! ```

use super::types::Event;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Priority used when a subscriber does not ask for one
pub const DEFAULT_PRIORITY: i32 = 10;

/// What a handler hands back to the bus
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    /// No result; dispatch continues and the previous value is kept
    Continue,
    /// A result; becomes the dispatch value unless it is null
    Value(Value),
    /// Halt dispatch; no later handler runs
    Stop,
}

/// Errors that can occur during event handler execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventHandlerError {
    /// Returned by handlers to signal a failure
    #[error("Handler error: {0}")]
    Generic(String),

    /// A handler failure as recorded by the bus
    #[error("Handler {subscription} failed on event '{event_name}': {reason}")]
    ExecutionFailed {
        event_name: String,
        subscription: SubscriptionId,
        reason: String,
    },

    #[error("Handler {subscription} panicked on event '{event_name}'")]
    HandlerPanicked {
        event_name: String,
        subscription: SubscriptionId,
    },
}

impl EventHandlerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Generic(reason.into())
    }

    fn reason(&self) -> String {
        match self {
            Self::Generic(reason) | Self::ExecutionFailed { reason, .. } => reason.clone(),
            Self::HandlerPanicked { .. } => "panicked".to_string(),
        }
    }
}

pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<HandlerResult, EventHandlerError>> + Send>>;

/// Event handler function type
///
/// Handlers receive their own clone of the event.
pub type EventHandler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as an [`EventHandler`]
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HandlerResult, EventHandlerError>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    priority: i32,
    owner: Option<String>,
    handler: EventHandler,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("owner", &self.owner)
            .field("handler", &"<EventHandler>")
            .finish()
    }
}

/// Outcome of one [`EventBus::publish`]
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub event_name: String,
    /// Last non-null handler value, or `false` when a handler halted dispatch
    pub value: Option<Value>,
    pub halted: bool,
    pub handlers_run: usize,
    pub errors: Vec<EventHandlerError>,
}

impl Dispatch {
    fn empty(event_name: &str) -> Self {
        Self {
            event_name: event_name.to_string(),
            value: None,
            halted: false,
            handlers_run: 0,
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Statistics about the bus
#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    pub total_subscriptions: usize,
    pub event_names: usize,
    pub events_published: u64,
}

/// Registry of event subscriptions with synchronous, ordered dispatch
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
    events_published: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &*self.subscriptions.read())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event_name`. Lower priorities run first.
    pub fn subscribe(
        &self,
        event_name: &str,
        handler: EventHandler,
        priority: i32,
    ) -> SubscriptionId {
        self.insert(event_name, handler, priority, None)
    }

    /// Register a handler on behalf of a module so it can be removed with
    /// [`EventBus::unsubscribe_owner`]
    pub fn subscribe_as(
        &self,
        owner: &str,
        event_name: &str,
        handler: EventHandler,
        priority: i32,
    ) -> SubscriptionId {
        self.insert(event_name, handler, priority, Some(owner.to_string()))
    }

    fn insert(
        &self,
        event_name: &str,
        handler: EventHandler,
        priority: i32,
        owner: Option<String>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut subscriptions = self.subscriptions.write();
        let handlers = subscriptions.entry(event_name.to_string()).or_default();
        handlers.push(Subscription {
            id,
            priority,
            owner,
            handler,
        });
        // stable: equal priorities keep registration order
        handlers.sort_by_key(|s| s.priority);

        debug!(event_name = %event_name, subscription = %id, priority, "Subscribed handler");
        id
    }

    /// Remove one subscription, or every subscription for the event when
    /// `subscription` is `None`. Returns how many were removed.
    pub fn unsubscribe(&self, event_name: &str, subscription: Option<SubscriptionId>) -> usize {
        let mut subscriptions = self.subscriptions.write();

        let removed = match subscription {
            None => subscriptions
                .remove(event_name)
                .map(|handlers| handlers.len())
                .unwrap_or(0),
            Some(id) => {
                let Some(handlers) = subscriptions.get_mut(event_name) else {
                    return 0;
                };
                let before = handlers.len();
                handlers.retain(|s| s.id != id);
                let removed = before - handlers.len();
                if handlers.is_empty() {
                    subscriptions.remove(event_name);
                }
                removed
            }
        };

        debug!(event_name = %event_name, removed, "Unsubscribed handlers");
        removed
    }

    /// Remove every subscription registered by `owner`
    pub fn unsubscribe_owner(&self, owner: &str) -> usize {
        let mut subscriptions = self.subscriptions.write();
        let mut removed = 0;

        subscriptions.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|s| s.owner.as_deref() != Some(owner));
            removed += before - handlers.len();
            !handlers.is_empty()
        });

        debug!(owner = %owner, removed, "Removed owner subscriptions");
        removed
    }

    pub fn has_subscribers(&self, event_name: &str) -> bool {
        self.subscriber_count(event_name) > 0
    }

    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.subscriptions
            .read()
            .get(event_name)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Event names with at least one subscription, sorted
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subscriptions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch `event` to its subscribers in priority order.
    ///
    /// The subscription list is snapshotted first, so handlers may subscribe
    /// or unsubscribe while running; changes apply to the next publish.
    pub async fn publish(&self, event: Event) -> Dispatch {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        let event_name = event.name().to_string();

        let snapshot: Vec<(SubscriptionId, EventHandler)> = match self
            .subscriptions
            .read()
            .get(&event_name)
        {
            Some(handlers) => handlers
                .iter()
                .map(|s| (s.id, s.handler.clone()))
                .collect(),
            None => Vec::new(),
        };

        let mut dispatch = Dispatch::empty(&event_name);
        if snapshot.is_empty() {
            debug!(event_name = %event_name, "No subscribers for event");
            return dispatch;
        }

        for (id, handler) in snapshot {
            let outcome = AssertUnwindSafe(handler(event.clone()))
                .catch_unwind()
                .await;
            dispatch.handlers_run += 1;

            match outcome {
                Ok(Ok(HandlerResult::Continue)) => {}
                Ok(Ok(HandlerResult::Value(Value::Bool(false)))) | Ok(Ok(HandlerResult::Stop)) => {
                    debug!(event_name = %event_name, subscription = %id, "Handler halted dispatch");
                    dispatch.halted = true;
                    dispatch.value = Some(Value::Bool(false));
                    break;
                }
                Ok(Ok(HandlerResult::Value(value))) => {
                    if !value.is_null() {
                        dispatch.value = Some(value);
                    }
                }
                Ok(Err(err)) => {
                    let error = EventHandlerError::ExecutionFailed {
                        event_name: event_name.clone(),
                        subscription: id,
                        reason: err.reason(),
                    };
                    warn!("{error}; continuing with remaining handlers");
                    dispatch.errors.push(error);
                }
                Err(_) => {
                    let error = EventHandlerError::HandlerPanicked {
                        event_name: event_name.clone(),
                        subscription: id,
                    };
                    warn!("{error}; continuing with remaining handlers");
                    dispatch.errors.push(error);
                }
            }
        }

        dispatch
    }

    pub fn stats(&self) -> EventBusStats {
        let subscriptions = self.subscriptions.read();
        EventBusStats {
            total_subscriptions: subscriptions.values().map(Vec::len).sum(),
            event_names: subscriptions.len(),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}
