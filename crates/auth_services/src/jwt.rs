use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::{AuthError, Claims, TokenType, User};

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL_HOURS: i64 = 1;
/// Lifetime of a refresh token and its stored session.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Creates the service from `JWT_SECRET`.
    pub fn new() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("⚠️ JWT_SECRET not set, using the development secret");
            "dev-secret-change-this-in-production".to_string()
        });
        Self::with_secret(&secret)
    }

    /// Creates the service with an explicit secret.
    pub fn with_secret(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    fn issue(&self, user: &User, typ: TokenType, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            typ,
            jti: Uuid::new_v4().to_string(),
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// One-hour bearer token for API calls.
    pub fn generate_access_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue(
            user,
            TokenType::Access,
            Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        )
    }

    /// Thirty-day token exchanged at `/refresh-token` for a new pair.
    pub fn generate_refresh_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue(
            user,
            TokenType::Refresh,
            Duration::days(REFRESH_TOKEN_TTL_DAYS),
        )
    }

    /// Verifies signature, expiry and token kind.
    pub fn verify_token(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        if token_data.claims.typ != expected {
            return Err(AuthError::InvalidToken);
        }

        Ok(token_data.claims)
    }

    /// Verifies an access token and returns the user id it names.
    pub fn extract_user_id_from_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = self.verify_token(token, TokenType::Access)?;
        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)
    }
}

/// Hex SHA-256 digest under which a refresh token is stored.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Landowner,
            email_verified: true,
            is_active: true,
            phone: None,
            image: None,
            bio: None,
            stripe_account_id: None,
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = JwtService::with_secret("secret");
        let user = user();
        let token = jwt.generate_access_token(&user).unwrap();

        let claims = jwt.verify_token(&token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, Role::Landowner);
        assert_eq!(jwt.extract_user_id_from_token(&token).unwrap(), user.id);
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let jwt = JwtService::with_secret("secret");
        let user = user();
        let access = jwt.generate_access_token(&user).unwrap();
        let refresh = jwt.generate_refresh_token(&user).unwrap();

        assert!(matches!(
            jwt.verify_token(&access, TokenType::Refresh),
            Err(AuthError::InvalidToken)
        ));
        assert!(jwt.extract_user_id_from_token(&refresh).is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = JwtService::with_secret("one")
            .generate_access_token(&user())
            .unwrap();
        assert!(
            JwtService::with_secret("two")
                .verify_token(&token, TokenType::Access)
                .is_err()
        );
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let jwt = JwtService::with_secret("secret");
        let user = user();
        let a = jwt.generate_refresh_token(&user).unwrap();
        let b = jwt.generate_refresh_token(&user).unwrap();
        assert_ne!(token_digest(&a), token_digest(&b));
    }

    #[test]
    fn test_token_digest_is_sha256_hex() {
        assert_eq!(
            token_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
