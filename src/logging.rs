//! # Structured Logging Module
//!
//! Process-wide `tracing` subscriber setup plus helpers that give module
//! lifecycle operations a consistent structured shape.

use crate::config::{LogFormat, LoggingConfig};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// `RUST_LOG` wins over `config.level` when set. An already installed global
/// subscriber (for example one set up by an embedding application) is left
/// in place.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

        let layer = match config.format {
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - keeping existing one");
        }

        tracing::info!(format = ?config.format, level = %config.level, "Structured logging initialized");
    });
}

/// Log one module lifecycle operation
pub fn log_module_operation(operation: &str, module_id: &str, success: bool, details: Option<&str>) {
    if success {
        tracing::info!(
            operation = %operation,
            module_id = %module_id,
            success = success,
            details = details,
            "MODULE_OPERATION"
        );
    } else {
        tracing::warn!(
            operation = %operation,
            module_id = %module_id,
            success = success,
            details = details,
            "MODULE_OPERATION"
        );
    }
}

/// Log a schema change, including implicit ones made by field auto-creation
pub fn log_schema_change(change: &str, content_type_id: i64, field_name: Option<&str>, implicit: bool) {
    tracing::info!(
        change = %change,
        content_type_id = content_type_id,
        field_name = field_name,
        implicit = implicit,
        "SCHEMA_CHANGE"
    );
}
