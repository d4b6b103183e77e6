use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::jwt::{JwtService, REFRESH_TOKEN_TTL_DAYS, token_digest};
use crate::types::{
    AuthError, AuthResponse, Role, SignUpRequest, USER_COLUMNS, UpdateProfileRequest, User,
    UserInfo,
};

/// A service for handling user authentication operations such as creating users,
/// retrieving user information, verifying credentials, and managing sessions.
pub struct AuthService {
    pool: PgPool,
}

impl AuthService {
    /// Creates a new instance of `AuthService` with the provided database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a new, unverified user. Admin accounts cannot be created this way.
    pub async fn create_user(&self, request: &SignUpRequest) -> Result<User, AuthError> {
        if request.role == Role::Admin {
            return Err(AuthError::Validation(
                "Role must be traveler or landowner".to_string(),
            ));
        }

        let email = normalize_email(&request.email);

        let existing_user = sqlx::query("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        if existing_user.is_some() {
            return Err(AuthError::EmailExists);
        }

        let password_hash = hash(&request.password, DEFAULT_COST)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(request.name.trim())
        .bind(&email)
        .bind(&password_hash)
        .bind(request.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        log::info!("👤 Created {} account {}", user.role, user.email);
        Ok(user)
    }

    /// Retrieves a user by email regardless of status.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Retrieves a user by id regardless of status.
    pub async fn get_user_by_id(&self, user_id: &Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Checks credentials for login. Unknown emails and wrong passwords fail alike.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        ensure_can_sign_in(&user)?;
        Ok(user)
    }

    /// Marks the user's email verified.
    pub async fn mark_email_verified(&self, user_id: &Uuid) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::UserNotFound)?;

        Ok(user)
    }

    /// Stores a new password hash.
    pub async fn update_password(&self, user_id: &Uuid, new_password: &str) -> Result<(), AuthError> {
        let password_hash = hash(new_password, DEFAULT_COST)?;

        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(&password_hash)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    /// Verifies the current password, then stores the new one.
    pub async fn change_password(
        &self,
        user_id: &Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify(current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.update_password(user_id, new_password).await
    }

    /// Creates a new session for the user with a refresh token hash
    pub async fn create_session(
        &self,
        user_id: &Uuid,
        refresh_token_hash: &str,
    ) -> Result<Uuid, AuthError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO user_sessions (user_id, refresh_token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(refresh_token_hash)
        .bind(Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS))
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Issues an access/refresh pair and records the refresh session.
    pub async fn issue_session(
        &self,
        jwt_service: &JwtService,
        user: User,
    ) -> Result<AuthResponse, AuthError> {
        let access_token = jwt_service.generate_access_token(&user)?;
        let refresh_token = jwt_service.generate_refresh_token(&user)?;

        self.create_session(&user.id, &token_digest(&refresh_token))
            .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: UserInfo::from(user),
        })
    }

    /// Exchanges a refresh token for a new pair, revoking the old session.
    pub async fn refresh_session(
        &self,
        jwt_service: &JwtService,
        refresh_token: &str,
    ) -> Result<AuthResponse, AuthError> {
        let claims = jwt_service.verify_token(refresh_token, crate::types::TokenType::Refresh)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let consumed = sqlx::query(
            "DELETE FROM user_sessions \
             WHERE refresh_token_hash = $1 AND user_id = $2 AND expires_at > NOW()",
        )
        .bind(token_digest(refresh_token))
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if consumed.rows_affected() == 0 {
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .get_user_by_id(&user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        ensure_can_sign_in(&user)?;

        self.issue_session(jwt_service, user).await
    }

    /// Revokes one session of the user.
    pub async fn delete_session(&self, user_id: &Uuid, refresh_token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM user_sessions WHERE user_id = $1 AND refresh_token_hash = $2")
            .bind(user_id)
            .bind(token_digest(refresh_token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revokes every session of the user. Returns how many were removed.
    pub async fn delete_user_sessions(&self, user_id: &Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Applies a partial profile update.
    pub async fn update_user_profile(
        &self,
        user_id: &Uuid,
        request: &UpdateProfileRequest,
    ) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                phone = COALESCE($2, phone),
                image = COALESCE($3, image),
                bio = COALESCE($4, bio),
                updated_at = NOW()
            WHERE id = $5
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.phone.as_deref().map(str::trim))
        .bind(request.image.as_deref())
        .bind(request.bio.as_deref())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::UserNotFound)?;

        Ok(user)
    }

    /// Makes sure an admin account exists for `email`.
    ///
    /// An existing account is promoted, verified and reactivated; its password
    /// is left untouched.
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if let Some(existing) = self.get_user_by_email(email).await? {
            let user = sqlx::query_as::<_, User>(&format!(
                "UPDATE users SET role = 'admin', email_verified = TRUE, is_active = TRUE, \
                 updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
            ))
            .bind(existing.id)
            .fetch_one(&self.pool)
            .await?;
            return Ok(user);
        }

        let password_hash = hash(password, DEFAULT_COST)?;
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, role, email_verified) \
             VALUES ($1, $2, $3, 'admin', TRUE) RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(normalize_email(email))
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await?;

        log::info!("🛡️ Created admin account {}", user.email);
        Ok(user)
    }
}

/// Lowercases and trims an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Rejects suspended accounts and unverified emails.
pub fn ensure_can_sign_in(user: &User) -> Result<(), AuthError> {
    if !user.is_active {
        return Err(AuthError::AccountSuspended);
    }
    if !user.email_verified {
        return Err(AuthError::EmailNotVerified);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_active: bool, email_verified: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Traveler,
            email_verified,
            is_active,
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
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_sign_in_gate() {
        assert!(ensure_can_sign_in(&user(true, true)).is_ok());
        assert!(matches!(
            ensure_can_sign_in(&user(false, true)),
            Err(AuthError::AccountSuspended)
        ));
        assert!(matches!(
            ensure_can_sign_in(&user(true, false)),
            Err(AuthError::EmailNotVerified)
        ));
    }
}
