use async_trait::async_trait;
use chrono::Utc;
use secrecy::Secret;
use std::sync::Arc;
use tracing::{info, instrument};

use super::repository::AccountRepository;
use super::ServiceError;
use crate::models::Account;
use crate::security::{CredentialHasher, UserDetails, UserLookup};

#[derive(Clone)]
pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
    hasher: Arc<dyn CredentialHasher>,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepository>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { repository, hasher }
    }

    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServiceError> {
        self.repository.find_by_username(username).await
    }

    /// Create an account holding the given role codes. The clear-text password is
    /// hashed before it reaches storage. Must run inside a request context with a
    /// principal.
    #[instrument(skip(self, password))]
    pub async fn create(
        &self,
        username: &str,
        password: &Secret<String>,
        role_codes: &[&str],
    ) -> Result<Account, ServiceError> {
        let hash = self.hasher.hash(password)?;
        let mut account = Account::new(username, hash);

        for code in role_codes {
            let role = self
                .repository
                .find_role_by_code(code)
                .await?
                .ok_or_else(|| anyhow::anyhow!("role {} is not defined", code))?;
            account.roles.push(role);
        }

        let created = self.repository.insert(account).await?;
        info!(username, roles = ?role_codes, "Account created");
        Ok(created)
    }
}

#[async_trait]
impl UserLookup for AccountService {
    async fn load_user(&self, username: &str) -> Result<Option<UserDetails>, ServiceError> {
        let account = self.find_by_username(username).await?;
        let now = Utc::now();

        Ok(account.map(|account| UserDetails {
            authorities: account.authorities_at(now),
            username: account.username,
            password_hash: Some(account.password).filter(|hash| !hash.is_empty()),
            enabled: account.enabled,
            locked: account.locked,
            expired: account.expired,
            credentials_expired: account.credentials_expired,
        }))
    }
}
