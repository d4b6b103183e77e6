use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use notification_services::VerificationError;

/// Marketplace role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Books parking spots.
    Traveler,
    /// Lists parking spots and receives payouts.
    Landowner,
    /// Platform operator. Never self-registered.
    Admin,
}

impl Role {
    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Traveler => "traveler",
            Role::Landowner => "landowner",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role string that is not one of the known roles.
#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "traveler" => Ok(Role::Traveler),
            "landowner" => Ok(Role::Landowner),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(value)),
        }
    }
}

/// Request structure for user sign-up
#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    /// Name of the user
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    /// Email address of the user
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,

    /// Password for the user account
    #[validate(length(min = 8, max = 72, message = "Password must be 8-72 characters"))]
    pub password: String,

    /// Either `traveler` or `landowner`
    pub role: Role,
}

/// Request carrying an email verification code
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    /// Address the code was sent to
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    /// 6-digit code
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

/// Request naming only an email address (resend verification, forgot password)
#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    /// Email address of the account
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
}

/// Request structure for user login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address of the user
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,

    /// Password for the user account
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request carrying a refresh token
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    /// Refresh token issued at login
    pub refresh_token: String,
}

/// Logout request. Without a token every session of the caller is revoked.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    /// Session to revoke
    pub refresh_token: Option<String>,
}

/// Request completing a password reset
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    /// Email address of the account
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    /// Reset code from the email
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
    /// New password
    #[validate(length(min = 8, max = 72, message = "Password must be 8-72 characters"))]
    pub new_password: String,
}

/// Request changing the password of the signed-in user
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    /// Current password
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    /// New password
    #[validate(length(min = 8, max = 72, message = "Password must be 8-72 characters"))]
    pub new_password: String,
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    /// Display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    /// Phone number
    #[validate(length(min = 7, max = 20, message = "Phone number must be 7-20 characters"))]
    pub phone: Option<String>,

    /// Hosted avatar URL
    #[validate(url(message = "Image must be a URL"))]
    pub image: Option<String>,

    /// Short biography
    #[validate(length(max = 1000, message = "Bio must be at most 1000 characters"))]
    pub bio: Option<String>,
}

/// Generic confirmation message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Message describing the outcome
    pub message: String,
}

impl MessageResponse {
    /// Creates a message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response structure for user sign-up
#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    /// What the user should do next
    pub message: String,
    /// Whether the verification email was handed to the provider
    pub email_sent: bool,
    /// The created account
    pub user: UserInfo,
}

/// Response structure for user authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Access token for the user
    pub access_token: String,
    /// Refresh token for the user
    pub refresh_token: String,
    /// User information
    pub user: UserInfo,
}

/// Information about the user, used in responses
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    /// Unique identifier for the user
    pub id: Uuid,
    /// Name of the user
    pub name: String,
    /// Email address of the user
    pub email: String,
    /// Role of the user
    pub role: Role,
    /// Whether the user's email is verified
    pub email_verified: bool,
    /// Whether the account is active (not suspended)
    pub is_active: bool,
    /// Phone number
    pub phone: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
    /// Short biography
    pub bio: Option<String>,
    /// Whether a payout account is connected
    pub has_connect_account: bool,
    /// Time at which the user was created
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            email_verified: user.email_verified,
            is_active: user.is_active,
            phone: user.phone,
            image: user.image,
            bio: user.bio,
            has_connect_account: user.stripe_account_id.is_some(),
            created_at: user.created_at,
        }
    }
}

/// User model representing the database schema
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique identifier for the user
    pub id: Uuid,
    /// Name of the user
    pub name: String,
    /// Email address of the user, lowercased
    pub email: String,
    /// Hashed password of the user
    pub password_hash: String,
    /// Role of the user
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Whether the user's email is verified
    pub email_verified: bool,
    /// Whether the user account is active; false means suspended
    pub is_active: bool,
    /// Phone number
    pub phone: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
    /// Short biography
    pub bio: Option<String>,
    /// Connected payout account (`acct_…`)
    pub stripe_account_id: Option<String>,
    /// Whether the user has a live chat connection
    pub is_online: bool,
    /// When the last chat connection closed
    pub last_seen: Option<DateTime<Utc>>,
    /// Timestamp when the user was created
    pub created_at: DateTime<Utc>,
    /// Timestamp when the user was last updated
    pub updated_at: DateTime<Utc>,
}

/// Column list matching [`User`].
pub const USER_COLUMNS: &str = "id, name, email, password_hash, role, email_verified, is_active, \
     phone, image, bio, stripe_account_id, is_online, last_seen, created_at, updated_at";

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived bearer token for API calls
    Access,
    /// Long-lived token exchanged for a new pair
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject of the token, the user ID
    pub sub: String,
    /// Email address of the user
    pub email: String,
    /// Role of the user
    pub role: Role,
    /// Token kind
    pub typ: TokenType,
    /// Unique token id
    pub jti: String,
    /// Expiration timestamp of the token
    pub exp: usize,
    /// Issued at timestamp of the token
    pub iat: usize,
}

/// Custom error type for authentication-related errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The email address already exists in the system
    #[error("Email already exists")]
    EmailExists,

    /// The provided credentials are invalid
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The user was not found in the system
    #[error("User not found")]
    UserNotFound,

    /// Login attempted before the email was verified
    #[error("Email not verified")]
    EmailNotVerified,

    /// The email is already verified
    #[error("Email already verified")]
    AlreadyVerified,

    /// The account has been suspended by an administrator
    #[error("Account suspended")]
    AccountSuspended,

    /// The submitted code does not match
    #[error("Invalid verification code")]
    InvalidCode,

    /// No live code exists for this request
    #[error("Verification code expired")]
    CodeExpired,

    /// The code was guessed wrong too often
    #[error("Too many verification attempts")]
    TooManyAttempts,

    /// The token is missing, malformed, expired, revoked or of the wrong kind
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The caller lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An internal server error occurred
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An error occurred while hashing the password
    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    /// An error occurred while encoding a token
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// An error occurred while validating input data
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<VerificationError> for AuthError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::NotFound | VerificationError::Expired => AuthError::CodeExpired,
            VerificationError::TooManyAttempts => AuthError::TooManyAttempts,
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Validation(err.to_string())
    }
}

impl actix_web::ResponseError for AuthError {
    fn error_response(&self) -> actix_web::HttpResponse {
        use actix_web::HttpResponse;

        match self {
            AuthError::EmailExists => HttpResponse::Conflict().json(serde_json::json!({
                "error": "email_exists",
                "message": "An account with this email already exists"
            })),
            AuthError::InvalidCredentials => HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "invalid_credentials",
                "message": "Invalid email or password"
            })),
            AuthError::UserNotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "user_not_found",
                "message": "User not found"
            })),
            AuthError::EmailNotVerified => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "email_not_verified",
                "message": "Please verify your email before logging in"
            })),
            AuthError::AlreadyVerified => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "already_verified",
                "message": "Email is already verified"
            })),
            AuthError::AccountSuspended => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "account_suspended",
                "message": "This account has been suspended"
            })),
            AuthError::InvalidCode => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_code",
                "message": "Invalid verification code"
            })),
            AuthError::CodeExpired => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "code_expired",
                "message": "Verification code expired or not found, please request a new one"
            })),
            AuthError::TooManyAttempts => HttpResponse::TooManyRequests().json(serde_json::json!({
                "error": "too_many_attempts",
                "message": "Too many attempts, please request a new code"
            })),
            AuthError::InvalidToken | AuthError::Jwt(_) => {
                HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "invalid_token",
                    "message": "Invalid or expired token"
                }))
            }
            AuthError::Forbidden(msg) => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "forbidden",
                "message": msg
            })),
            AuthError::Validation(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "validation_error",
                "message": msg
            })),
            _ => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "An internal error occurred"
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use actix_web::http::StatusCode;

    #[test]
    fn test_role_round_trips_through_text() {
        for role in [Role::Traveler, Role::Landowner, Role::Admin] {
            assert_eq!(Role::try_from(role.as_str().to_string()).unwrap(), role);
        }
        assert!(Role::try_from("superuser".to_string()).is_err());
    }

    #[test]
    fn test_signup_request_rejects_short_password() {
        let request = SignUpRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "short".to_string(),
            role: Role::Traveler,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AuthError::InvalidCredentials.error_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::AccountSuspended.error_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::EmailNotVerified.error_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::EmailExists.error_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::Database(sqlx::Error::RowNotFound)
                .error_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_verification_errors_map_to_auth_errors() {
        assert!(matches!(
            AuthError::from(VerificationError::Expired),
            AuthError::CodeExpired
        ));
        assert!(matches!(
            AuthError::from(VerificationError::TooManyAttempts),
            AuthError::TooManyAttempts
        ));
    }
}
