use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::cache::EntityCache;
use super::repository::GreetingRepository;
use super::ServiceError;
use crate::models::{Greeting, Transactional};

pub const GREETINGS_CACHE: &str = "greetings";

/// Greeting CRUD with a read-through cache keyed by id.
#[derive(Clone)]
pub struct GreetingService {
    repository: Arc<dyn GreetingRepository>,
    cache: EntityCache<Greeting>,
}

impl GreetingService {
    pub fn new(repository: Arc<dyn GreetingRepository>) -> Self {
        Self {
            repository,
            cache: EntityCache::new(GREETINGS_CACHE),
        }
    }

    pub fn cache(&self) -> &EntityCache<Greeting> {
        &self.cache
    }

    #[instrument(skip(self))]
    pub async fn find_all(&self) -> Result<Vec<Greeting>, ServiceError> {
        self.repository.find_all().await
    }

    #[instrument(skip(self))]
    pub async fn find_one(&self, id: i64) -> Result<Option<Greeting>, ServiceError> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(Some(cached));
        }

        let found = self.repository.find_by_id(id).await?;
        if let Some(greeting) = &found {
            self.cache.put(id, greeting.clone());
        }
        Ok(found)
    }

    /// Persist a new greeting. A greeting that already carries an id is rejected.
    #[instrument(skip(self, greeting))]
    pub async fn create(&self, greeting: Greeting) -> Result<Greeting, ServiceError> {
        if !greeting.entity.is_new() {
            return Err(ServiceError::EntityExists(Greeting::ENTITY_NAME));
        }

        let saved = self.repository.insert(greeting).await?;
        if let Some(id) = saved.id() {
            self.cache.put(id, saved.clone());
        }
        Ok(saved)
    }

    /// Write a modified greeting. `greeting.entity.version` must match storage.
    #[instrument(skip(self, greeting), fields(greeting_id = ?greeting.entity.id))]
    pub async fn update(&self, greeting: Greeting) -> Result<Greeting, ServiceError> {
        let id = greeting
            .id()
            .ok_or(ServiceError::MissingId(Greeting::ENTITY_NAME))?;

        match self.repository.update(greeting).await {
            Ok(saved) => {
                self.cache.put(id, saved.clone());
                Ok(saved)
            }
            Err(e) => {
                if matches!(e, ServiceError::Conflict { .. } | ServiceError::NotFound { .. }) {
                    warn!(greeting_id = id, error = %e, "Greeting update rejected");
                    self.cache.evict(id);
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        self.repository.delete(id).await?;
        self.cache.evict(id);
        info!(greeting_id = id, "Greeting deleted");
        Ok(())
    }

    pub fn evict_cache(&self) {
        self.cache.evict_all();
    }

    pub async fn count(&self) -> Result<i64, ServiceError> {
        self.repository.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::services::memory::InMemoryGreetingRepository;

    fn service() -> GreetingService {
        GreetingService::new(Arc::new(InMemoryGreetingRepository::new()))
    }

    #[tokio::test]
    async fn create_rejects_supplied_id() {
        let service = service();
        let mut greeting = Greeting::new("Hello");
        greeting.entity.id = Some(7);

        let result = RequestContext::scope_as("alice", service.create(greeting)).await;

        assert!(matches!(result, Err(ServiceError::EntityExists("Greeting"))));
        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_populates_cache() {
        let service = service();
        let saved = RequestContext::scope_as("alice", service.create(Greeting::new("Hello")))
            .await
            .unwrap();

        let cached = service.cache().get(1).unwrap();
        assert_eq!(cached, saved);
        assert_eq!(cached.text, "Hello");
    }

    #[tokio::test]
    async fn find_one_reads_through_cache() {
        let service = service();
        RequestContext::scope_as("alice", service.create(Greeting::new("Hello")))
            .await
            .unwrap();
        service.evict_cache();
        assert!(service.cache().is_empty());

        let found = service.find_one(1).await.unwrap().unwrap();
        assert_eq!(found.text, "Hello");
        assert_eq!(service.cache().len(), 1);

        assert!(service.find_one(99).await.unwrap().is_none());
        assert_eq!(service.cache().len(), 1);
    }

    #[tokio::test]
    async fn update_without_id_is_rejected() {
        let service = service();
        let result =
            RequestContext::scope_as("alice", service.update(Greeting::new("orphan"))).await;

        assert!(matches!(result, Err(ServiceError::MissingId("Greeting"))));
    }

    #[tokio::test]
    async fn stale_update_evicts_cached_entry() {
        let service = service();
        let created = RequestContext::scope_as("alice", service.create(Greeting::new("v0")))
            .await
            .unwrap();

        let mut first = created.clone();
        first.text = "v1".to_string();
        RequestContext::scope_as("alice", service.update(first))
            .await
            .unwrap();

        let mut stale = created;
        stale.text = "stale".to_string();
        let result = RequestContext::scope_as("bob", service.update(stale)).await;

        assert!(matches!(result, Err(ServiceError::Conflict { .. })));
        assert!(service.cache().get(1).is_none());

        let current = service.find_one(1).await.unwrap().unwrap();
        assert_eq!(current.text, "v1");
        assert_eq!(current.entity.version, 1);
    }

    #[tokio::test]
    async fn delete_evicts_and_reports_missing() {
        let service = service();
        RequestContext::scope_as("alice", service.create(Greeting::new("Hello")))
            .await
            .unwrap();

        service.delete(1).await.unwrap();
        assert!(service.cache().get(1).is_none());
        assert!(service.find_one(1).await.unwrap().is_none());

        let again = service.delete(1).await;
        assert!(matches!(again, Err(ServiceError::NotFound { id: 1, .. })));
    }
}
