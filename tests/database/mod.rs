//! Database Tests
//!
//! `PgStore` against a real Postgres using SQLx's test harness; each test
//! gets its own database with the core migrations applied. Enabled with
//! `--features test-db` and a `DATABASE_URL`.

#[cfg(feature = "test-db")]
mod postgres;
