//! Application startup and lifecycle management.

use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::batch::GreetingBatch;
use crate::config::{GreetingConfig, StorageBackend};
use crate::context::{RequestContext, SYSTEM_USERNAME};
use crate::models::role::{ROLE_SYSOPS, ROLE_USER};
use crate::security::{AccountAuthenticationProvider, Argon2Hasher, CredentialHasher};
use crate::services::{
    AccountRepository, AccountService, Database, GreetingHealthIndicator, GreetingRepository,
    GreetingService, InMemoryAccountRepository, InMemoryGreetingRepository,
    PgAccountRepository, PgGreetingRepository,
};
use crate::{build_router, AppState};

impl AppState {
    /// Wire services over the given storage and credential hasher.
    pub fn new(
        config: GreetingConfig,
        greeting_repository: Arc<dyn GreetingRepository>,
        account_repository: Arc<dyn AccountRepository>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        let greetings = GreetingService::new(greeting_repository.clone());
        let accounts = AccountService::new(account_repository, hasher.clone());
        let authenticator = Arc::new(AccountAuthenticationProvider::new(
            Arc::new(accounts.clone()),
            hasher,
        ));
        let health = Arc::new(GreetingHealthIndicator::new(greeting_repository));

        Self {
            config,
            greetings,
            accounts,
            authenticator,
            health,
        }
    }
}

/// Create the configured bootstrap account unless it already exists.
pub async fn bootstrap_account(
    accounts: &AccountService,
    username: &str,
    password: &Secret<String>,
) -> Result<(), AppError> {
    if accounts.find_by_username(username).await?.is_some() {
        tracing::info!(username, "Bootstrap account already present");
        return Ok(());
    }

    RequestContext::scope_as(
        SYSTEM_USERNAME,
        accounts.create(username, password, &[ROLE_USER, ROLE_SYSOPS]),
    )
    .await?;

    tracing::info!(username, "Bootstrap account created");
    Ok(())
}

async fn storage(
    config: &GreetingConfig,
) -> Result<(Arc<dyn GreetingRepository>, Arc<dyn AccountRepository>), AppError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Ok((
                Arc::new(InMemoryGreetingRepository::new()),
                Arc::new(InMemoryAccountRepository::new()),
            ))
        }
        StorageBackend::Postgres => {
            let url = config.storage.database_url.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required for postgres"))
            })?;

            let database = Database::new(
                url.expose_secret(),
                config.storage.max_connections,
                config.storage.min_connections,
            )
            .await?;
            database.run_migrations().await?;
            database.health_check().await?;

            Ok((
                Arc::new(PgGreetingRepository::new(&database)),
                Arc::new(PgAccountRepository::new(&database)),
            ))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: GreetingConfig) -> Result<Self, AppError> {
        let (greeting_repository, account_repository) = storage(&config).await?;
        let state = AppState::new(
            config.clone(),
            greeting_repository,
            account_repository,
            Arc::new(Argon2Hasher),
        );

        if let (Some(username), Some(password)) =
            (&config.bootstrap.username, &config.bootstrap.password)
        {
            bootstrap_account(&state.accounts, username, password).await?;
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT/SIGTERM, then stop the batch jobs.
    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        let shutdown = CancellationToken::new();
        let batch = GreetingBatch::new(self.state.greetings.clone(), self.state.config.batch.clone());
        let jobs = batch.start(shutdown.clone());

        let router = build_router(self.state);
        tracing::info!(port = self.port, "Listening");

        let served = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        shutdown.cancel();
        for job in jobs {
            if let Err(e) = job.await {
                tracing::error!(error = %e, "Batch job task failed");
            }
        }

        served?;
        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
