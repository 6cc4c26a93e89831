//! Business services and their storage collaborators.

pub mod account;
pub mod cache;
mod database;
pub mod error;
pub mod greeting;
pub mod health;
pub mod memory;
pub mod metrics;
pub mod repository;

pub use account::AccountService;
pub use cache::EntityCache;
pub use database::{Database, PgAccountRepository, PgGreetingRepository};
pub use error::ServiceError;
pub use greeting::GreetingService;
pub use health::{GreetingHealthIndicator, HealthReport, HealthStatus};
pub use memory::{InMemoryAccountRepository, InMemoryGreetingRepository};
pub use metrics::{get_metrics, init_metrics};
pub use repository::{AccountRepository, GreetingRepository};
