#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # CMS Core
//!
//! Module and event orchestration core for a content-management system.
//!
//! ## Overview
//!
//! The core lets installable modules extend the CMS without changes to core
//! code. Modules are discovered from manifests on disk, installed with their
//! own reversible schema migrations, and loaded at boot, where they subscribe
//! handlers to an in-process event bus. Other subsystems, such as the content
//! save path, publish events that those handlers observe, enrich or veto.
//!
//! ## Module Organization
//!
//! - [`events`] - Typed events and the priority-ordered `EventBus`
//! - [`modules`] - Discovery, the lifecycle manager and the `CmsModule` trait
//! - [`schema`] - Content types, fields and the content save path
//! - [`database`] - Store traits, in-memory and Postgres stores, migrations
//! - [`models`] - Persisted records
//! - [`context`] - `CmsContext` dependency injection container
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cms_core::config::CmsConfig;
//! use cms_core::context::CmsContext;
//! use cms_core::modules::ModuleFactoryRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = CmsContext::in_memory(CmsConfig::default(), ModuleFactoryRegistry::new())?;
//! context.boot().await;
//!
//! let result = context.modules.install("blog").await;
//! println!("install blog: {} ({})", result.success, result.message());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests, no database required
//! ```

pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod modules;
pub mod schema;

pub use config::{CmsConfig, ConfigManager};
pub use context::CmsContext;
pub use database::{InMemoryStore, PgStore, Store};
pub use error::{CmsError, CmsResult, ErrorKind};
pub use events::{Event, EventBus, HandlerResult};
pub use modules::{CmsModule, ModuleContext, ModuleManager, OperationResult};
pub use schema::{ContentService, SchemaRegistry};
