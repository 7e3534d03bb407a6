//! Module System Tests
//!
//! Lifecycle operations, runtime loading and the merged module listing,
//! driven through `ModuleManager` over an in-memory store.

mod listing;
mod loading;
mod migrations;
