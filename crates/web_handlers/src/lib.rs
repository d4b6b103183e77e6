//! # Web Handlers for the RV Marketplace
//!
//! HTTP handlers for every API surface and the route table that mounts
//! them behind the authentication middleware.

/// Signup, verification, sessions and password reset
mod auth_handlers;
pub use auth_handlers::*;

/// User profile handlers (get/update profile, change password)
mod profile_handlers;
pub use profile_handlers::*;

/// Listing CRUD, discovery, reviews and saved listings
mod listing_handlers;
pub use listing_handlers::*;

/// Booking lifecycle handlers
mod booking_handlers;
pub use booking_handlers::*;

/// Checkout, settlement, webhook and ledger handlers
mod payment_handlers;
pub use payment_handlers::*;

/// Direct message REST handlers
mod message_handlers;
pub use message_handlers::*;

/// Real-time chat socket
mod chat_socket;
pub use chat_socket::*;

/// Admin dashboard, moderation and content management
mod admin_handlers;
pub use admin_handlers::*;

/// Landowner dashboard handlers
mod landowner_handlers;
pub use landowner_handlers::*;

/// Public website pages and the contact form
mod content_handlers;
pub use content_handlers::*;

/// Route table
pub mod routes;
pub use routes::configure;
