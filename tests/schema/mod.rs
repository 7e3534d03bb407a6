//! Content Schema Tests
//!
//! Content types, field definitions and the content save path, including
//! modules taking part in saves through `content.*` events.

mod content;
mod fields;
