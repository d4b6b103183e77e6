//! # Auth Services
//!
//! Identity for the marketplace: accounts and roles, bcrypt password
//! storage, JWT session tokens with stored refresh sessions, and the
//! actix middleware that authenticates and authorizes requests.

/// JWT token handling.
pub mod jwt;
/// Middleware for request authentication and role enforcement.
pub mod middleware;
/// Service definitions for user management and authentication operations.
pub mod service;
/// Types and structures used in authentication services.
pub mod types;
