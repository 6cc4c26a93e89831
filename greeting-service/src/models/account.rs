use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::{Role, Transactional, TransactionalEntity};

/// A login identity. `password` holds the stored credential hash, never clear text.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    #[sqlx(flatten)]
    pub entity: TransactionalEntity,
    pub username: String,
    pub password: String,
    pub enabled: bool,
    pub credentials_expired: bool,
    pub expired: bool,
    pub locked: bool,
    #[sqlx(skip)]
    pub roles: Vec<Role>,
}

impl Account {
    /// An enabled, unlocked account with no roles.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            entity: TransactionalEntity::new(),
            username: username.into(),
            password: password_hash.into(),
            enabled: true,
            credentials_expired: false,
            expired: false,
            locked: false,
            roles: Vec::new(),
        }
    }

    /// Codes of the roles whose validity window contains `at`, in role order.
    pub fn authorities_at(&self, at: DateTime<Utc>) -> Vec<String> {
        self.roles
            .iter()
            .filter(|role| role.reference.is_effective_at(at))
            .map(|role| role.authority().to_string())
            .collect()
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl Transactional for Account {
    const ENTITY_NAME: &'static str = "Account";

    fn entity(&self) -> &TransactionalEntity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut TransactionalEntity {
        &mut self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceEntity;
    use chrono::Duration;

    fn role(code: &str, expires_at: Option<DateTime<Utc>>) -> Role {
        let now = Utc::now();
        Role {
            reference: ReferenceEntity {
                id: 1,
                code: code.to_string(),
                label: code.to_string(),
                ordinal: 0,
                effective_at: now - Duration::days(1),
                expires_at,
                created_at: now - Duration::days(1),
            },
        }
    }

    #[test]
    fn expired_roles_grant_nothing() {
        let mut account = Account::new("alice", "hash");
        account.roles = vec![
            role("ROLE_USER", None),
            role("ROLE_SYSOPS", Some(Utc::now() - Duration::hours(1))),
        ];

        assert_eq!(account.authorities_at(Utc::now()), vec!["ROLE_USER"]);
    }
}
