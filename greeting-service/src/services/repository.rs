//! Storage collaborators.
//!
//! Implementations own id assignment and the optimistic version check, and must call
//! the entity's audit hooks synchronously before every write. A hook failure means
//! nothing is written.

use async_trait::async_trait;

use super::ServiceError;
use crate::models::{Account, Greeting, Role};

#[async_trait]
pub trait GreetingRepository: Send + Sync {
    /// All greetings in storage order.
    async fn find_all(&self) -> Result<Vec<Greeting>, ServiceError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Greeting>, ServiceError>;

    /// Insert as a new row. Any `id` on the input is ignored; storage assigns one and
    /// sets `version` to 0.
    async fn insert(&self, greeting: Greeting) -> Result<Greeting, ServiceError>;

    /// Write `text` if the stored version still equals `greeting.entity.version`.
    ///
    /// Returns the stored record with `version` incremented. A version mismatch yields
    /// [`ServiceError::Conflict`] and leaves the row untouched.
    async fn update(&self, greeting: Greeting) -> Result<Greeting, ServiceError>;

    /// Remove the row. A missing id yields [`ServiceError::NotFound`].
    async fn delete(&self, id: i64) -> Result<(), ServiceError>;

    async fn count(&self) -> Result<i64, ServiceError>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// The account with its roles loaded, ordered by role ordinal.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServiceError>;

    /// Insert the account and link the roles it carries.
    async fn insert(&self, account: Account) -> Result<Account, ServiceError>;

    async fn find_role_by_code(&self, code: &str) -> Result<Option<Role>, ServiceError>;
}
