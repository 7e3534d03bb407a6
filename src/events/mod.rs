//! # Event System
//!
//! In-process publish/subscribe connecting core lifecycle and content
//! operations to module handlers.
//!
//! - [`types`] - typed [`Event`] payloads, one variant per event name
//! - [`bus`] - the [`EventBus`] with priority-ordered, short-circuiting dispatch

pub mod bus;
pub mod types;

pub use bus::{
    handler, Dispatch, EventBus, EventBusStats, EventHandler, EventHandlerError, HandlerFuture,
    HandlerResult, SubscriptionId, DEFAULT_PRIORITY,
};
pub use types::{names, Event};
