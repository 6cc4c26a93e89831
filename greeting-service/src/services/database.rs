//! PostgreSQL storage backend.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use super::repository::{AccountRepository, GreetingRepository};
use super::ServiceError;
use crate::models::{Account, Greeting, Role, Transactional};

const GREETING_COLUMNS: &str =
    "id, reference_id, version, created_by, created_at, updated_by, updated_at, text";

const ACCOUNT_COLUMNS: &str = "id, reference_id, version, created_by, created_at, updated_by, \
     updated_at, username, password, enabled, credentials_expired, expired, locked";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "greeting-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

/// Distinguish a missing row from a stale version after an update matched nothing.
async fn update_miss(
    pool: &PgPool,
    table: &str,
    entity: &'static str,
    id: i64,
    expected: i32,
) -> ServiceError {
    let exists = sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
        table
    ))
    .bind(id)
    .fetch_one(pool)
    .await;

    match exists {
        Ok(true) => ServiceError::Conflict {
            entity,
            id,
            expected,
        },
        Ok(false) => ServiceError::NotFound { entity, id },
        Err(e) => ServiceError::Database(e),
    }
}

pub struct PgGreetingRepository {
    pool: PgPool,
}

impl PgGreetingRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }
}

#[async_trait]
impl GreetingRepository for PgGreetingRepository {
    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Greeting>, ServiceError> {
        let greetings = sqlx::query_as::<_, Greeting>(&format!(
            "SELECT {} FROM greetings ORDER BY id",
            GREETING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(greetings)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Greeting>, ServiceError> {
        let greeting = sqlx::query_as::<_, Greeting>(&format!(
            "SELECT {} FROM greetings WHERE id = $1",
            GREETING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(greeting)
    }

    #[instrument(skip(self, greeting))]
    async fn insert(&self, mut greeting: Greeting) -> Result<Greeting, ServiceError> {
        greeting.entity.before_persist()?;

        let created = sqlx::query_as::<_, Greeting>(&format!(
            r#"
            INSERT INTO greetings (reference_id, version, created_by, created_at, text)
            VALUES ($1, 0, $2, $3, $4)
            RETURNING {}
            "#,
            GREETING_COLUMNS
        ))
        .bind(&greeting.entity.reference_id)
        .bind(&greeting.entity.created_by)
        .bind(greeting.entity.created_at)
        .bind(&greeting.text)
        .fetch_one(&self.pool)
        .await?;

        info!(greeting_id = ?created.entity.id, "Greeting created");
        Ok(created)
    }

    #[instrument(skip(self, greeting), fields(greeting_id = ?greeting.entity.id))]
    async fn update(&self, mut greeting: Greeting) -> Result<Greeting, ServiceError> {
        let id = greeting
            .id()
            .ok_or(ServiceError::MissingId(Greeting::ENTITY_NAME))?;
        greeting.entity.before_update()?;

        let expected = greeting.entity.version;
        let updated = sqlx::query_as::<_, Greeting>(&format!(
            r#"
            UPDATE greetings
            SET text = $1, updated_by = $2, updated_at = $3, version = version + 1
            WHERE id = $4 AND version = $5
            RETURNING {}
            "#,
            GREETING_COLUMNS
        ))
        .bind(&greeting.text)
        .bind(&greeting.entity.updated_by)
        .bind(greeting.entity.updated_at)
        .bind(id)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(updated) => Ok(updated),
            None => Err(update_miss(&self.pool, "greetings", Greeting::ENTITY_NAME, id, expected).await),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM greetings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound {
                entity: Greeting::ENTITY_NAME,
                id,
            });
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64, ServiceError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM greetings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    async fn load_roles(&self, account_id: i64) -> Result<Vec<Role>, ServiceError> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.code, r.label, r.ordinal, r.effective_at, r.expires_at, r.created_at
            FROM roles r
            JOIN account_roles ar ON ar.role_id = r.id
            WHERE ar.account_id = $1
            ORDER BY r.ordinal
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, ServiceError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE username = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut account) = account else {
            return Ok(None);
        };
        if let Some(id) = account.entity.id {
            account.roles = self.load_roles(id).await?;
        }
        Ok(Some(account))
    }

    #[instrument(skip(self, account), fields(username = %account.username))]
    async fn insert(&self, mut account: Account) -> Result<Account, ServiceError> {
        account.entity.before_persist()?;

        let mut tx = self.pool.begin().await?;

        let mut created = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (reference_id, version, created_by, created_at, username,
                                  password, enabled, credentials_expired, expired, locked)
            VALUES ($1, 0, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&account.entity.reference_id)
        .bind(&account.entity.created_by)
        .bind(account.entity.created_at)
        .bind(&account.username)
        .bind(&account.password)
        .bind(account.enabled)
        .bind(account.credentials_expired)
        .bind(account.expired)
        .bind(account.locked)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ServiceError::UsernameTaken(account.username.clone())
            }
            _ => ServiceError::Database(e),
        })?;

        let account_id = created
            .entity
            .id
            .ok_or_else(|| anyhow::anyhow!("inserted account returned no id"))?;

        for role in &account.roles {
            sqlx::query("INSERT INTO account_roles (account_id, role_id) VALUES ($1, $2)")
                .bind(account_id)
                .bind(role.reference.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        account.roles.sort_by_key(|role| role.reference.ordinal);
        created.roles = account.roles;

        info!(account_id, "Account created");
        Ok(created)
    }

    async fn find_role_by_code(&self, code: &str) -> Result<Option<Role>, ServiceError> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, code, label, ordinal, effective_at, expires_at, created_at
            FROM roles
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }
}
