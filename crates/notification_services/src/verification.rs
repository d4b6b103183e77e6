use chrono::{Duration, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::types::{VerificationCode, VerificationError, VerificationStore};

/// Wrong guesses allowed before a code is discarded.
pub const MAX_VERIFICATION_ATTEMPTS: u32 = 3;

/// Key under which an account email-verification code is stored.
pub fn email_verification_key(email: &str) -> String {
    format!("email_verify:{}", email.trim().to_lowercase())
}

/// Key under which a password-reset code is stored.
pub fn password_reset_key(email: &str) -> String {
    format!("password_reset:{}", email.trim().to_lowercase())
}

/// A thread-safe store for verification codes, allowing concurrent access.
pub fn create_verification_store() -> VerificationStore {
    Arc::new(Mutex::new(HashMap::new()))
}

fn lock(store: &VerificationStore) -> MutexGuard<'_, HashMap<String, VerificationCode>> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Stores (or replaces) the code for `key`, valid for `expires_in_minutes`.
pub fn store_verification_code(
    store: &VerificationStore,
    key: &str,
    code: &str,
    expires_in_minutes: i64,
) {
    let verification = VerificationCode {
        code: code.to_string(),
        expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
        attempts: 0,
    };

    lock(store).insert(key.to_string(), verification);
}

/// Verifies the provided code against the stored verification code.
///
/// A matching code is consumed. Each wrong guess counts as an attempt; once
/// the attempt budget is exhausted the code is discarded.
pub fn verify_code(
    store: &VerificationStore,
    key: &str,
    provided_code: &str,
) -> Result<bool, VerificationError> {
    let matched = check(store, key, provided_code)?;
    if matched {
        lock(store).remove(key);
    }
    Ok(matched)
}

/// Like [`verify_code`] but leaves a matching code in place so it can be
/// consumed by a later step (e.g. the actual password reset).
pub fn check_code(
    store: &VerificationStore,
    key: &str,
    provided_code: &str,
) -> Result<bool, VerificationError> {
    check(store, key, provided_code)
}

fn check(
    store: &VerificationStore,
    key: &str,
    provided_code: &str,
) -> Result<bool, VerificationError> {
    let mut store = lock(store);

    let verification = store.get_mut(key).ok_or(VerificationError::NotFound)?;

    if verification.expires_at < Utc::now() {
        store.remove(key);
        return Err(VerificationError::Expired);
    }

    if verification.attempts >= MAX_VERIFICATION_ATTEMPTS {
        store.remove(key);
        return Err(VerificationError::TooManyAttempts);
    }

    if verification.code == provided_code.trim() {
        return Ok(true);
    }

    verification.attempts += 1;
    Ok(false)
}

/// Drops every expired code. Returns how many were removed.
pub fn purge_expired_codes(store: &VerificationStore) -> usize {
    let now = Utc::now();
    let mut store = lock(store);
    let before = store.len();
    store.retain(|_, v| v.expires_at >= now);
    before - store.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_code_is_consumed() {
        let store = create_verification_store();
        store_verification_code(&store, "k", "123456", 10);

        assert_eq!(verify_code(&store, "k", "123456"), Ok(true));
        assert_eq!(
            verify_code(&store, "k", "123456"),
            Err(VerificationError::NotFound)
        );
    }

    #[test]
    fn test_attempt_budget() {
        let store = create_verification_store();
        store_verification_code(&store, "k", "123456", 10);

        assert_eq!(verify_code(&store, "k", "000000"), Ok(false));
        assert_eq!(verify_code(&store, "k", "000001"), Ok(false));
        assert_eq!(verify_code(&store, "k", "000002"), Ok(false));
        assert_eq!(
            verify_code(&store, "k", "123456"),
            Err(VerificationError::TooManyAttempts)
        );
        assert_eq!(
            verify_code(&store, "k", "123456"),
            Err(VerificationError::NotFound)
        );
    }

    #[test]
    fn test_expired_code_is_rejected_and_removed() {
        let store = create_verification_store();
        store_verification_code(&store, "k", "123456", -1);

        assert_eq!(
            verify_code(&store, "k", "123456"),
            Err(VerificationError::Expired)
        );
        assert!(lock(&store).is_empty());
    }

    #[test]
    fn test_check_code_keeps_matching_code() {
        let store = create_verification_store();
        store_verification_code(&store, "k", "654321", 10);

        assert_eq!(check_code(&store, "k", "654321"), Ok(true));
        assert_eq!(verify_code(&store, "k", "654321"), Ok(true));
    }

    #[test]
    fn test_accepted_check_does_not_spend_an_attempt() {
        let store = create_verification_store();
        store_verification_code(&store, "k", "654321", 10);

        assert_eq!(check_code(&store, "k", "000000"), Ok(false));
        assert_eq!(check_code(&store, "k", "000001"), Ok(false));
        assert_eq!(check_code(&store, "k", "654321"), Ok(true));
        assert_eq!(verify_code(&store, "k", "654321"), Ok(true));
    }

    #[test]
    fn test_purge_expired_codes() {
        let store = create_verification_store();
        store_verification_code(&store, "old", "1", -5);
        store_verification_code(&store, "fresh", "2", 5);

        assert_eq!(purge_expired_codes(&store), 1);
        assert!(lock(&store).contains_key("fresh"));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        assert_eq!(
            email_verification_key(" Jane@Example.com "),
            email_verification_key("jane@example.com")
        );
        assert_ne!(
            email_verification_key("jane@example.com"),
            password_reset_key("jane@example.com")
        );
    }
}
