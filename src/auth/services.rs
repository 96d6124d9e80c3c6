use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{
    claims::Claims,
    error::AuthError,
    jwt::JwtKeys,
    password::{HashError, PasswordHasher},
    repo::{StoreError, UserStore},
    repo_types::User,
};

pub const MIN_PASSWORD_CHARS: usize = 8;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn checked_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AuthError::Validation("invalid email".into()));
    }
    Ok(email)
}

/// Signup, login and session issuance over an injected store, hasher and key set.
pub struct CredentialService {
    store: Arc<dyn UserStore>,
    hasher: Arc<PasswordHasher>,
    keys: JwtKeys,
}

impl CredentialService {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        Self {
            store,
            hasher: Arc::new(hasher),
            keys,
        }
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = checked_email(email)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        let hash = self.hash(password).await?;

        let user = self.store.create(&email, &hash).await.map_err(|e| match e {
            StoreError::Duplicate => {
                warn!("signup with registered email");
                AuthError::DuplicateUser
            }
            other => AuthError::Storage(other),
        })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Malformed input is a `Validation` error; otherwise every failure to
    /// match a stored credential is the same `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = checked_email(email)?;
        if password.is_empty() {
            return Err(AuthError::Validation("password is required".into()));
        }

        let user = match self.store.get_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.burn_verification(password).await;
                warn!("login unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(AuthError::Storage(e)),
        };

        if !self.verify(password, &user.password_hash).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    pub fn issue_session(&self, user: &User) -> Result<String, AuthError> {
        Ok(self.keys.issue(user.id, &user.email)?)
    }

    pub fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.keys.verify(token)?)
    }

    // Argon2 is CPU-bound; keep it off the async workers.
    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| HashError::Primitive(e.to_string()))??;
        Ok(hash)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_owned();
        let hash = hash.to_owned();
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| HashError::Primitive(e.to_string()))??;
        Ok(ok)
    }

    async fn burn_verification(&self, password: &str) {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_owned();
        if let Err(e) = tokio::task::spawn_blocking(move || hasher.verify_dummy(&password)).await {
            debug!(error = %e, "dummy verification task failed");
        }
    }
}
