//! # Admin Services
//!
//! Oversight for operators (dashboard aggregates, user moderation, global
//! listing/booking/transaction views, editable website pages) and the
//! landowner's own dashboard.

/// Website pages editable by admins.
pub mod content;
/// Admin error type.
pub mod error;
/// Landowner dashboard aggregates.
pub mod landowner;
/// Admin dashboard and moderation.
pub mod service;
/// Aggregate and request types.
pub mod types;

pub use content::ContentService;
pub use error::AdminError;
pub use landowner::LandownerDashboard;
pub use service::AdminService;
pub use types::*;
