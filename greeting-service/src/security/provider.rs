//! Username/password authentication against stored account credentials.

use async_trait::async_trait;
use secrecy::Secret;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::hasher::CredentialHasher;
use crate::context::RequestContext;
use crate::services::metrics::AUTHENTICATION_ATTEMPTS;
use crate::services::ServiceError;

/// Snapshot of an account as the authentication check needs it.
#[derive(Debug, Clone)]
pub struct UserDetails {
    pub username: String,
    pub password_hash: Option<String>,
    pub enabled: bool,
    pub locked: bool,
    pub expired: bool,
    pub credentials_expired: bool,
    pub authorities: Vec<String>,
}

#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn load_user(&self, username: &str) -> Result<Option<UserDetails>, ServiceError>;
}

#[derive(Error, Debug)]
pub enum AuthError {
    /// Covers unknown users as well as bad or missing passwords.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User account is locked")]
    AccountLocked,

    #[error("User account is disabled")]
    AccountDisabled,

    #[error("User account has expired")]
    AccountExpired,

    #[error("User credentials have expired")]
    CredentialsExpired,

    #[error(transparent)]
    Lookup(#[from] ServiceError),
}

impl AuthError {
    fn outcome(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountLocked => "locked",
            AuthError::AccountDisabled => "disabled",
            AuthError::AccountExpired => "expired",
            AuthError::CredentialsExpired => "credentials_expired",
            AuthError::Lookup(_) => "error",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Lookup(e) => e.into(),
            e => AppError::Unauthorized(anyhow::anyhow!(e.to_string())),
        }
    }
}

/// An authenticated caller and the authorities effective at login.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub username: String,
    pub authorities: Vec<String>,
}

impl AuthenticatedPrincipal {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|granted| granted == authority)
    }
}

pub struct AccountAuthenticationProvider {
    lookup: Arc<dyn UserLookup>,
    hasher: Arc<dyn CredentialHasher>,
}

impl AccountAuthenticationProvider {
    pub fn new(lookup: Arc<dyn UserLookup>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { lookup, hasher }
    }

    /// Check `credentials` for `username` and, on success, publish the username into
    /// the current [`RequestContext`].
    #[instrument(skip(self, credentials))]
    pub async fn authenticate(
        &self,
        username: &str,
        credentials: Option<&Secret<String>>,
    ) -> Result<AuthenticatedPrincipal, AuthError> {
        let result = self.check(username, credentials).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        metrics::counter!(AUTHENTICATION_ATTEMPTS, "outcome" => outcome).increment(1);

        match &result {
            Ok(principal) => {
                RequestContext::set_username(principal.username.clone());
                info!(username, "Authenticated");
            }
            Err(AuthError::Lookup(e)) => warn!(username, error = %e, "User lookup failed"),
            Err(e) => info!(username, reason = outcome, "Authentication rejected: {}", e),
        }

        result
    }

    async fn check(
        &self,
        username: &str,
        credentials: Option<&Secret<String>>,
    ) -> Result<AuthenticatedPrincipal, AuthError> {
        let user = self
            .lookup
            .load_user(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Status is only reported to callers who proved the password.
        let (Some(raw), Some(hash)) = (credentials, user.password_hash.as_deref()) else {
            return Err(AuthError::InvalidCredentials);
        };
        if !self.hasher.verify(raw, hash) {
            return Err(AuthError::InvalidCredentials);
        }

        if user.locked {
            return Err(AuthError::AccountLocked);
        }
        if !user.enabled {
            return Err(AuthError::AccountDisabled);
        }
        if user.expired {
            return Err(AuthError::AccountExpired);
        }
        if user.credentials_expired {
            return Err(AuthError::CredentialsExpired);
        }

        Ok(AuthenticatedPrincipal {
            username: user.username,
            authorities: user.authorities,
        })
    }
}
