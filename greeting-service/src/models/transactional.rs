//! Audit and optimistic-locking fields shared by all mutable business records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::context::RequestContext;

/// Raised when a write is attempted with no principal in the request context.
///
/// This is a wiring fault (a write path that skipped authentication or forgot to open a
/// system scope), not something a client can fix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("cannot {0} a transactional entity without a username in the request context")]
    MissingPrincipal(&'static str),
}

/// Identity, version and audit stamps embedded in every transactional record.
///
/// `id` is assigned by storage on first insert. `version` starts at 0 and is bumped by
/// storage on every successful update. `created_*` are written once by
/// [`TransactionalEntity::before_persist`]. `updated_*` stay empty until the first
/// update.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionalEntity {
    pub id: Option<i64>,
    pub reference_id: String,
    pub version: i32,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for TransactionalEntity {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionalEntity {
    /// A transient entity with a fresh external reference id.
    pub fn new() -> Self {
        Self {
            id: None,
            reference_id: Uuid::new_v4().to_string(),
            version: 0,
            created_by: None,
            created_at: None,
            updated_by: None,
            updated_at: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Pre-insert hook. Storage must call this immediately before writing a new row.
    pub fn before_persist(&mut self) -> Result<(), AuditError> {
        let username =
            RequestContext::username().ok_or(AuditError::MissingPrincipal("persist"))?;

        self.created_by = Some(username);
        self.created_at = Some(Utc::now());
        if self.reference_id.is_empty() {
            self.reference_id = Uuid::new_v4().to_string();
        }
        Ok(())
    }

    /// Pre-update hook. Storage must call this immediately before writing changes.
    pub fn before_update(&mut self) -> Result<(), AuditError> {
        let username =
            RequestContext::username().ok_or(AuditError::MissingPrincipal("update"))?;

        self.updated_by = Some(username);
        self.updated_at = Some(Utc::now());
        Ok(())
    }
}

/// Two entities are equal only when both have been persisted under the same id.
/// Transient entities compare unequal to everything, themselves included, so this type
/// is deliberately `PartialEq` without `Eq`.
impl PartialEq for TransactionalEntity {
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Records that embed a [`TransactionalEntity`].
pub trait Transactional {
    /// Short type name used in logs and error messages.
    const ENTITY_NAME: &'static str;

    fn entity(&self) -> &TransactionalEntity;

    fn entity_mut(&mut self) -> &mut TransactionalEntity;

    fn id(&self) -> Option<i64> {
        self.entity().id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(id: i64) -> TransactionalEntity {
        TransactionalEntity {
            id: Some(id),
            ..TransactionalEntity::new()
        }
    }

    #[test]
    fn new_entity_has_reference_id_and_no_audit() {
        let entity = TransactionalEntity::new();

        assert!(entity.is_new());
        assert!(Uuid::parse_str(&entity.reference_id).is_ok());
        assert_eq!(entity.version, 0);
        assert!(entity.created_by.is_none());
        assert!(entity.updated_by.is_none());
    }

    #[test]
    fn reference_ids_are_unique() {
        assert_ne!(
            TransactionalEntity::new().reference_id,
            TransactionalEntity::new().reference_id
        );
    }

    #[test]
    fn before_persist_without_principal_fails_and_leaves_entity_untouched() {
        let mut entity = TransactionalEntity::new();
        let err = entity.before_persist().unwrap_err();

        assert_eq!(err, AuditError::MissingPrincipal("persist"));
        assert!(entity.created_by.is_none());
        assert!(entity.created_at.is_none());
    }

    #[tokio::test]
    async fn before_persist_stamps_creator() {
        let entity = RequestContext::scope_as("alice", async {
            let mut entity = TransactionalEntity::new();
            entity.before_persist().unwrap();
            entity
        })
        .await;

        assert_eq!(entity.created_by.as_deref(), Some("alice"));
        assert!(entity.created_at.is_some());
        assert!(entity.updated_by.is_none());
        assert!(entity.updated_at.is_none());
    }

    #[tokio::test]
    async fn before_persist_fills_missing_reference_id() {
        let entity = RequestContext::scope_as("alice", async {
            let mut entity = TransactionalEntity {
                reference_id: String::new(),
                ..TransactionalEntity::new()
            };
            entity.before_persist().unwrap();
            entity
        })
        .await;

        assert!(!entity.reference_id.is_empty());
    }

    #[tokio::test]
    async fn before_update_stamps_updater_only() {
        let mut entity = RequestContext::scope_as("alice", async {
            let mut entity = TransactionalEntity::new();
            entity.before_persist().unwrap();
            entity
        })
        .await;
        let created_at = entity.created_at;

        RequestContext::scope_as("bob", async {
            entity.before_update().unwrap();
        })
        .await;

        assert_eq!(entity.created_by.as_deref(), Some("alice"));
        assert_eq!(entity.created_at, created_at);
        assert_eq!(entity.updated_by.as_deref(), Some("bob"));
        assert!(entity.updated_at.is_some());
    }

    #[tokio::test]
    async fn before_update_in_empty_scope_fails() {
        let result = RequestContext::scope(async {
            let mut entity = persisted(1);
            entity.before_update()
        })
        .await;

        assert_eq!(result, Err(AuditError::MissingPrincipal("update")));
    }

    #[test]
    fn equality_requires_matching_ids() {
        assert_eq!(persisted(7), persisted(7));
        assert_ne!(persisted(7), persisted(8));
    }

    #[test]
    #[allow(clippy::eq_op)]
    fn transient_entities_are_never_equal() {
        let transient = TransactionalEntity::new();

        assert_ne!(transient, transient.clone());
        assert!(transient != transient);
        assert_ne!(transient, persisted(1));
        assert_ne!(persisted(1), transient);
    }
}
