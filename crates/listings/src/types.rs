use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Most images a listing may carry.
pub const MAX_LISTING_IMAGES: usize = 10;

/// A parking spot offered by a landowner.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Listing {
    /// Listing id
    pub id: Uuid,
    /// Landowner who owns the listing
    pub owner_id: Uuid,
    /// Free-text location (city, region, address)
    pub location: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Hosted image URLs
    pub images: Vec<String>,
    /// Spot name
    pub spot: String,
    /// Amenities offered
    pub amenities: Vec<String>,
    /// Accepted RV types
    pub rv_types: Vec<String>,
    /// Accepted slide-out counts
    pub max_slides: Vec<String>,
    /// Site types (pull-through, back-in, ...)
    pub site_types: Vec<String>,
    /// Accepted rig lengths
    pub site_lengths: Vec<String>,
    /// Description
    pub description: String,
    /// Whether the spot accepts bookings
    pub is_available: bool,
    /// Nightly price in cents
    pub price_cents: i64,
    /// Average review rating, one decimal
    pub average_rating: f64,
    /// Number of reviews
    pub total_ratings: i32,
    /// Owner display name, present on discovery queries
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Column list matching [`Listing`] for queries aliasing `listings` as `l`.
pub const LISTING_COLUMNS: &str = "l.id, l.owner_id, l.location, l.latitude, l.longitude, \
     l.images, l.spot, l.amenities, l.rv_types, l.max_slides, l.site_types, l.site_lengths, \
     l.description, l.is_available, l.price_cents, l.average_rating, l.total_ratings, \
     l.created_at, l.updated_at";

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    List(Vec<String>),
    One(String),
}

impl From<StringOrList> for Vec<String> {
    fn from(value: StringOrList) -> Self {
        let items = match value {
            StringOrList::List(items) => items,
            StringOrList::One(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(items) => items,
                Err(_) => vec![raw],
            },
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Accepts a JSON array, a string holding a JSON array, or a single string.
pub fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrList::deserialize(deserializer).map(Into::into)
}

/// [`string_or_list`] for optional fields.
pub fn optional_string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrList>::deserialize(deserializer).map(|v| v.map(Into::into))
}

fn validate_images(images: &[String]) -> Result<(), ValidationError> {
    if images.len() > MAX_LISTING_IMAGES {
        return Err(ValidationError::new("too_many_images")
            .with_message(format!("At most {} images", MAX_LISTING_IMAGES).into()));
    }
    if images
        .iter()
        .any(|u| !(u.starts_with("https://") || u.starts_with("http://")))
    {
        return Err(ValidationError::new("image_url")
            .with_message("Images must be http(s) URLs".into()));
    }
    Ok(())
}

/// Body of a create-listing request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateListingRequest {
    /// Free-text location
    #[validate(length(min = 1, max = 255, message = "Location is required"))]
    pub location: String,
    /// Latitude in degrees
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,
    /// Longitude in degrees
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "Longitude must be between -180 and 180"
    ))]
    pub longitude: f64,
    /// Hosted image URLs
    #[serde(default, deserialize_with = "string_or_list")]
    #[validate(custom(function = "validate_images"))]
    pub images: Vec<String>,
    /// Spot name
    #[validate(length(min = 1, max = 255, message = "Spot name is required"))]
    pub spot: String,
    /// Amenities offered
    #[serde(default, deserialize_with = "string_or_list")]
    pub amenities: Vec<String>,
    /// Accepted RV types
    #[serde(default, deserialize_with = "string_or_list")]
    pub rv_types: Vec<String>,
    /// Accepted slide-out counts
    #[serde(default, deserialize_with = "string_or_list")]
    pub max_slides: Vec<String>,
    /// Site types
    #[serde(default, deserialize_with = "string_or_list")]
    pub site_types: Vec<String>,
    /// Accepted rig lengths
    #[serde(default, deserialize_with = "string_or_list")]
    pub site_lengths: Vec<String>,
    /// Description
    #[validate(length(min = 1, max = 5000, message = "Description is required"))]
    pub description: String,
    /// Whether the spot accepts bookings right away
    #[serde(default = "default_available")]
    pub is_available: bool,
    /// Nightly price in cents
    #[validate(range(min = 1, message = "Price must be positive"))]
    pub price_cents: i64,
}

fn default_available() -> bool {
    true
}

/// Body of an update-listing request. Absent fields keep their value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateListingRequest {
    /// Free-text location
    #[validate(length(min = 1, max = 255, message = "Location cannot be empty"))]
    pub location: Option<String>,
    /// Latitude in degrees
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,
    /// Longitude in degrees
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "Longitude must be between -180 and 180"
    ))]
    pub longitude: Option<f64>,
    /// Hosted image URLs
    #[serde(default, deserialize_with = "optional_string_or_list")]
    #[validate(custom(function = "validate_images"))]
    pub images: Option<Vec<String>>,
    /// Spot name
    #[validate(length(min = 1, max = 255, message = "Spot name cannot be empty"))]
    pub spot: Option<String>,
    /// Amenities offered
    #[serde(default, deserialize_with = "optional_string_or_list")]
    pub amenities: Option<Vec<String>>,
    /// Accepted RV types
    #[serde(default, deserialize_with = "optional_string_or_list")]
    pub rv_types: Option<Vec<String>>,
    /// Accepted slide-out counts
    #[serde(default, deserialize_with = "optional_string_or_list")]
    pub max_slides: Option<Vec<String>>,
    /// Site types
    #[serde(default, deserialize_with = "optional_string_or_list")]
    pub site_types: Option<Vec<String>>,
    /// Accepted rig lengths
    #[serde(default, deserialize_with = "optional_string_or_list")]
    pub site_lengths: Option<Vec<String>>,
    /// Description
    #[validate(length(min = 1, max = 5000, message = "Description cannot be empty"))]
    pub description: Option<String>,
    /// Availability toggle
    pub is_available: Option<bool>,
    /// Nightly price in cents
    #[validate(range(min = 1, message = "Price must be positive"))]
    pub price_cents: Option<i64>,
}

/// Query string of the location search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive substring of the location
    #[serde(alias = "location")]
    pub q: String,
}

/// Raw query string of the listing filter. List parameters are comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    /// Lowest nightly price in cents
    #[serde(alias = "minPrice")]
    pub min_price: Option<i64>,
    /// Highest nightly price in cents
    #[serde(alias = "maxPrice")]
    pub max_price: Option<i64>,
    /// Lowest average rating
    #[serde(alias = "minRating")]
    pub min_rating: Option<f64>,
    /// Every amenity must be present
    pub amenities: Option<String>,
    /// Any of these site types
    pub site_types: Option<String>,
    /// Any of these RV types
    #[serde(alias = "rv_type")]
    pub rv_types: Option<String>,
    /// Any of these rig lengths
    #[serde(alias = "site_length")]
    pub site_lengths: Option<String>,
    /// Any of these slide-out counts
    #[serde(alias = "max_slide")]
    pub max_slides: Option<String>,
}

/// Parsed listing filter.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ListingFilter {
    /// Lowest nightly price in cents
    pub min_price: Option<i64>,
    /// Highest nightly price in cents
    pub max_price: Option<i64>,
    /// Lowest average rating
    pub min_rating: Option<f64>,
    /// Amenities that must all be present
    pub amenities: Vec<String>,
    /// Site types, any may match
    pub site_types: Vec<String>,
    /// RV types, any may match
    pub rv_types: Vec<String>,
    /// Rig lengths, any may match
    pub site_lengths: Vec<String>,
    /// Slide-out counts, any may match
    pub max_slides: Vec<String>,
}

/// Splits a comma-separated parameter, dropping blanks.
pub fn split_csv(param: Option<&str>) -> Vec<String> {
    param
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl From<FilterQuery> for ListingFilter {
    fn from(query: FilterQuery) -> Self {
        Self {
            min_price: query.min_price,
            max_price: query.max_price,
            min_rating: query.min_rating,
            amenities: split_csv(query.amenities.as_deref()),
            site_types: split_csv(query.site_types.as_deref()),
            rv_types: split_csv(query.rv_types.as_deref()),
            site_lengths: split_csv(query.site_lengths.as_deref()),
            max_slides: split_csv(query.max_slides.as_deref()),
        }
    }
}

/// A stored review.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    /// Review id
    pub id: Uuid,
    /// Reviewed listing
    pub listing_id: Uuid,
    /// Reviewer
    pub user_id: Uuid,
    /// Rating 1..=5
    pub rating: i16,
    /// Review text
    pub review: String,
    /// Reviewer name
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Reviewer email
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Body of an add-review request.
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    /// Rating 1..=5
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    /// Optional review text
    #[serde(default)]
    #[validate(length(max = 500, message = "Review must be less than 500 characters"))]
    pub review: String,
}

/// Reviews of one listing with its rating aggregate.
#[derive(Debug, Serialize)]
pub struct ListingReviews {
    /// Listing id
    pub listing_id: Uuid,
    /// Spot name
    pub spot: String,
    /// Location
    pub location: String,
    /// Average rating, one decimal
    pub average_rating: f64,
    /// Review count
    pub total_ratings: i32,
    /// Reviews, newest first
    pub reviews: Vec<Review>,
}

/// Rounds an average rating to one decimal.
pub fn round_rating(average: f64) -> f64 {
    (average * 10.0).round() / 10.0
}
