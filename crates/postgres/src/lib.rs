//! # Postgres
//!
//! Connection pooling and schema migrations for the RV spot marketplace database.

/// Database connection pool, health check and migrations.
pub mod database;
