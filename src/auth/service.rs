use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::{hash_password, verify_password},
        token::{TokenKeys, TokenPurpose},
    },
    error::ApiError,
    store::{UserRecord, UserStore},
};

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new user. The plaintext password is hashed here, at the only
/// point where it enters the system, and is never persisted or returned.
pub async fn create_user(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<UserRecord, ApiError> {
    let email = normalize_email(email);

    if !is_valid_email(&email) {
        warn!(email = %email, "register rejected: invalid email");
        return Err(ApiError::Validation("invalid email"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        warn!("register rejected: password too short");
        return Err(ApiError::Validation("password too short"));
    }
    if store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "register rejected: email already registered");
        return Err(ApiError::DuplicateEmail);
    }

    let hash = hash_password(password)?;
    let user = store.insert_user(&email, &hash).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Look up a user by email and verify the password. Unknown email and wrong
/// password are deliberately indistinguishable to the caller.
pub async fn find_by_credentials(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<UserRecord, ApiError> {
    let email = normalize_email(email);

    let Some(user) = store.find_by_email(&email).await? else {
        warn!(email = %email, "login failed: unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login failed: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    info!(user_id = %user.id, "credentials verified");
    Ok(user)
}

/// Issue an auth token for `user`, reusing the one already on file if the
/// user holds an active session. The store-side conditional append makes
/// concurrent first logins converge on a single token.
pub async fn issue_token(
    store: &dyn UserStore,
    keys: &TokenKeys,
    user: &UserRecord,
) -> Result<String, ApiError> {
    let fresh = keys.sign(user.id, TokenPurpose::Auth)?;
    let active = store
        .append_token_if_absent(user.id, TokenPurpose::Auth.as_str(), &fresh)
        .await?;
    Ok(active)
}

/// Resolve a presented token to its user.
///
/// A token must pass both checks: the signature verifies against the
/// process secret, and the exact string still appears in the resolved
/// user's active token list. A revoked token keeps a valid signature but
/// fails the second check.
pub async fn find_by_token(
    store: &dyn UserStore,
    keys: &TokenKeys,
    token: &str,
) -> Result<UserRecord, ApiError> {
    let claims = keys.verify(token).map_err(|_| ApiError::InvalidToken)?;

    let Some(user) = store
        .find_by_token(claims.purpose.as_str(), token)
        .await?
    else {
        warn!(user_id = %claims.sub, "token not in active list");
        return Err(ApiError::InvalidToken);
    };

    if user.id != claims.sub {
        warn!(claimed = %claims.sub, holder = %user.id, "token subject mismatch");
        return Err(ApiError::InvalidToken);
    }

    Ok(user)
}

/// Revoke a single token. Idempotent: revoking a token that is already
/// gone is not an error.
pub async fn remove_token(
    store: &dyn UserStore,
    user_id: Uuid,
    token: &str,
) -> Result<(), ApiError> {
    store.remove_token(user_id, token).await?;
    info!(user_id = %user_id, "token revoked");
    Ok(())
}

/// Delete the account and everything hanging off it.
pub async fn delete_account(store: &dyn UserStore, user_id: Uuid) -> Result<(), ApiError> {
    store.delete_user(user_id).await?;
    info!(user_id = %user_id, "account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn keys() -> TokenKeys {
        TokenKeys::new("test-secret")
    }

    #[tokio::test]
    async fn create_then_login_roundtrip() {
        let store = MemoryStore::new();
        let created = create_user(&store, "A@X.com ", "secret1").await.unwrap();
        assert_eq!(created.email, "a@x.com");

        let found = find_by_credentials(&store, "a@x.com", "secret1")
            .await
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.email, created.email);
    }

    #[tokio::test]
    async fn persisted_password_is_never_plaintext() {
        let store = MemoryStore::new();
        let user = create_user(&store, "a@x.com", "secret1").await.unwrap();
        assert_ne!(user.password_hash, "secret1");
    }

    #[tokio::test]
    async fn rejects_bad_email_and_short_password() {
        let store = MemoryStore::new();
        assert!(matches!(
            create_user(&store, "not-an-email", "secret1").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            create_user(&store, "a@x.com", "min").await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_distinct_kind() {
        let store = MemoryStore::new();
        create_user(&store, "a@x.com", "secret1").await.unwrap();
        assert!(matches!(
            create_user(&store, "a@x.com", "other-password").await,
            Err(ApiError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_the_same_way() {
        let store = MemoryStore::new();
        create_user(&store, "a@x.com", "secret1").await.unwrap();

        let wrong_password = find_by_credentials(&store, "a@x.com", "wrong!!").await;
        let unknown_email = find_by_credentials(&store, "b@x.com", "secret1").await;

        assert!(matches!(wrong_password, Err(ApiError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(ApiError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn issue_token_is_idempotent_until_revoked() {
        let store = MemoryStore::new();
        let keys = keys();
        let user = create_user(&store, "a@x.com", "secret1").await.unwrap();

        let first = issue_token(&store, &keys, &user).await.unwrap();
        let second = issue_token(&store, &keys, &user).await.unwrap();
        assert_eq!(first, second);

        remove_token(&store, user.id, &first).await.unwrap();
        let third = issue_token(&store, &keys, &user).await.unwrap();
        assert_ne!(first, third);
    }

    #[tokio::test]
    async fn revoked_token_fails_despite_valid_signature() {
        let store = MemoryStore::new();
        let keys = keys();
        let user = create_user(&store, "a@x.com", "secret1").await.unwrap();
        let token = issue_token(&store, &keys, &user).await.unwrap();

        remove_token(&store, user.id, &token).await.unwrap();

        // Signature still verifies, the allow-list check is what fails.
        assert!(keys.verify(&token).is_ok());
        assert!(matches!(
            find_by_token(&store, &keys, &token).await,
            Err(ApiError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn forged_token_does_not_resolve() {
        let store = MemoryStore::new();
        let keys = keys();
        let user = create_user(&store, "a@x.com", "secret1").await.unwrap();
        issue_token(&store, &keys, &user).await.unwrap();

        let forged = TokenKeys::new("other-secret")
            .sign(user.id, TokenPurpose::Auth)
            .unwrap();
        assert!(matches!(
            find_by_token(&store, &keys, &forged).await,
            Err(ApiError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn resolves_user_for_a_live_token() {
        let store = MemoryStore::new();
        let keys = keys();
        let user = create_user(&store, "a@x.com", "secret1").await.unwrap();
        let token = issue_token(&store, &keys, &user).await.unwrap();

        let resolved = find_by_token(&store, &keys, &token).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }
}
