//! # Listings
//!
//! Parking spots offered by landowners: owner-scoped CRUD, public discovery
//! and faceted filtering, reviews with a maintained rating aggregate, and
//! travelers' saved listings.

/// Listing error type.
pub mod error;
/// Reviews and rating aggregates.
pub mod reviews;
/// Saved listings.
pub mod saved;
/// Listing CRUD and discovery.
pub mod service;
/// Listing models and request types.
pub mod types;

pub use error::ListingError;
pub use reviews::ReviewService;
pub use saved::{SavedListingService, SavedState};
pub use service::ListingService;
pub use types::*;
