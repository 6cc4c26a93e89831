//! In-memory storage backend.
//!
//! Same contract as the PostgreSQL repositories: storage-assigned ids, audit hooks
//! before every write, and version-checked updates. Used when `STORAGE_BACKEND=memory`
//! and by the test suites.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use super::repository::{AccountRepository, GreetingRepository};
use super::ServiceError;
use crate::models::role::{ROLE_SYSOPS, ROLE_USER};
use crate::models::{Account, Greeting, ReferenceEntity, Role, Transactional};

/// Id-ordered row map with a monotonically increasing id sequence.
pub struct MemoryStore<T> {
    rows: RwLock<BTreeMap<i64, T>>,
    sequence: AtomicI64,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            sequence: AtomicI64::new(0),
        }
    }
}

fn poisoned(e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("memory store lock poisoned: {}", e))
}

impl<T: Transactional + Clone> MemoryStore<T> {
    pub fn find_all(&self) -> Result<Vec<T>, ServiceError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.values().cloned().collect())
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Result<Option<T>, ServiceError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.values().find(|row| predicate(row)).cloned())
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<T>, ServiceError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    pub fn insert(&self, record: T) -> Result<T, ServiceError> {
        self.insert_unless(record, |_, _| false)?.ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("unconditional insert was refused"))
        })
    }

    /// Insert unless `clashes(existing, new)` holds for some stored row. The check and
    /// the write happen under one lock. Returns `None` when a clash blocked the insert.
    pub fn insert_unless(
        &self,
        mut record: T,
        clashes: impl Fn(&T, &T) -> bool,
    ) -> Result<Option<T>, ServiceError> {
        record.entity_mut().before_persist()?;

        let mut rows = self.rows.write().map_err(poisoned)?;
        if rows.values().any(|existing| clashes(existing, &record)) {
            return Ok(None);
        }

        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let entity = record.entity_mut();
        entity.id = Some(id);
        entity.version = 0;
        entity.updated_by = None;
        entity.updated_at = None;

        rows.insert(id, record.clone());
        Ok(Some(record))
    }

    /// Replace the stored row, keeping its creation stamps and reference id.
    pub fn update(&self, mut record: T) -> Result<T, ServiceError> {
        let id = record.id().ok_or(ServiceError::MissingId(T::ENTITY_NAME))?;
        record.entity_mut().before_update()?;

        let mut rows = self.rows.write().map_err(poisoned)?;
        let stored = rows.get(&id).ok_or(ServiceError::NotFound {
            entity: T::ENTITY_NAME,
            id,
        })?;

        let expected = record.entity().version;
        if stored.entity().version != expected {
            return Err(ServiceError::Conflict {
                entity: T::ENTITY_NAME,
                id,
                expected,
            });
        }

        let stored = stored.entity();
        let reference_id = stored.reference_id.clone();
        let created_by = stored.created_by.clone();
        let created_at = stored.created_at;
        let version = stored.version + 1;

        let entity = record.entity_mut();
        entity.reference_id = reference_id;
        entity.created_by = created_by;
        entity.created_at = created_at;
        entity.version = version;

        rows.insert(id, record.clone());
        Ok(record)
    }

    pub fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.remove(&id)
            .map(|_| ())
            .ok_or(ServiceError::NotFound {
                entity: T::ENTITY_NAME,
                id,
            })
    }

    pub fn count(&self) -> Result<i64, ServiceError> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.len() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryGreetingRepository {
    store: MemoryStore<Greeting>,
}

impl InMemoryGreetingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GreetingRepository for InMemoryGreetingRepository {
    async fn find_all(&self) -> Result<Vec<Greeting>, ServiceError> {
        self.store.find_all()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Greeting>, ServiceError> {
        self.store.find_by_id(id)
    }

    async fn insert(&self, greeting: Greeting) -> Result<Greeting, ServiceError> {
        self.store.insert(greeting)
    }

    async fn update(&self, greeting: Greeting) -> Result<Greeting, ServiceError> {
        self.store.update(greeting)
    }

    async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        self.store.delete(id)
    }

    async fn count(&self) -> Result<i64, ServiceError> {
        self.store.count()
    }
}

/// Accounts plus the role reference data the initial migration seeds.
pub struct InMemoryAccountRepository {
    store: MemoryStore<Account>,
    roles: Vec<Role>,
}

impl Default for InMemoryAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::default(),
            roles: seed_roles(),
        }
    }
}

fn seed_roles() -> Vec<Role> {
    // Same effective date as the migration seed: 2015-01-01T00:00:00Z.
    let epoch: DateTime<Utc> = Utc
        .timestamp_opt(1_420_070_400, 0)
        .single()
        .unwrap_or_else(Utc::now);
    [(1, ROLE_USER, "User"), (2, ROLE_SYSOPS, "System Operations")]
        .into_iter()
        .enumerate()
        .map(|(ordinal, (id, code, label))| Role {
            reference: ReferenceEntity {
                id,
                code: code.to_string(),
                label: label.to_string(),
                ordinal: ordinal as i32,
                effective_at: epoch,
                expires_at: None,
                created_at: epoch,
            },
        })
        .collect()
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServiceError> {
        self.store.find(|account| account.username == username)
    }

    async fn insert(&self, mut account: Account) -> Result<Account, ServiceError> {
        account.roles.sort_by_key(|role| role.reference.ordinal);
        let username = account.username.clone();

        self.store
            .insert_unless(account, |existing, new| existing.username == new.username)?
            .ok_or(ServiceError::UsernameTaken(username))
    }

    async fn find_role_by_code(&self, code: &str) -> Result<Option<Role>, ServiceError> {
        Ok(self
            .roles
            .iter()
            .find(|role| role.reference.code == code)
            .cloned())
    }
}
