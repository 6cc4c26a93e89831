//! Test helpers for greeting-service integration tests.
//!
//! Every test app runs over in-memory storage with a plain-text credential hasher, so
//! no database is needed and authentication stays fast.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use greeting_service::{
    build_router,
    config::{BatchConfig, BootstrapConfig, GreetingConfig, StorageBackend, StorageConfig},
    context::RequestContext,
    models::{role::ROLE_SYSOPS, role::ROLE_USER, Account},
    security::CredentialHasher,
    services::{AccountRepository, InMemoryAccountRepository, InMemoryGreetingRepository},
    AppState,
};
use http_body_util::BodyExt;
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use tower::ServiceExt;

/// Stores the raw credential as its own hash.
pub struct PlainTextHasher;

impl CredentialHasher for PlainTextHasher {
    fn hash(&self, raw: &Secret<String>) -> anyhow::Result<String> {
        Ok(raw.expose_secret().clone())
    }

    fn verify(&self, raw: &Secret<String>, hash: &str) -> bool {
        raw.expose_secret() == hash
    }
}

pub fn test_config() -> GreetingConfig {
    GreetingConfig {
        common: service_core::config::Config::default(),
        environment: "test".to_string(),
        service_name: "greeting-service".to_string(),
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
            min_connections: 1,
        },
        batch: BatchConfig::default(),
        bootstrap: BootstrapConfig::default(),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub accounts: Arc<InMemoryAccountRepository>,
}

impl TestApp {
    /// App with accounts `alice`, `bob` (ROLE_USER), `operations` (ROLE_USER and
    /// ROLE_SYSOPS), `guest` (no roles) and a locked account `mallory`.
    pub async fn spawn() -> Self {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let state = AppState::new(
            test_config(),
            Arc::new(InMemoryGreetingRepository::new()),
            accounts.clone(),
            Arc::new(PlainTextHasher),
        );

        let app = Self {
            router: build_router(state.clone()),
            state,
            accounts,
        };

        app.add_account("alice", "wonderland", &[ROLE_USER], |_| {}).await;
        app.add_account("bob", "builder", &[ROLE_USER], |_| {}).await;
        app.add_account("operations", "operations", &[ROLE_USER, ROLE_SYSOPS], |_| {})
            .await;
        app.add_account("guest", "guest", &[], |_| {}).await;
        app.add_account("mallory", "password", &[ROLE_USER], |account| {
            account.locked = true
        })
        .await;

        app
    }

    pub async fn add_account(
        &self,
        username: &str,
        password: &str,
        roles: &[&str],
        customize: impl FnOnce(&mut Account),
    ) -> Account {
        let mut account = Account::new(username, password);
        for code in roles {
            let role = self
                .accounts
                .find_role_by_code(code)
                .await
                .unwrap()
                .unwrap();
            account.roles.push(role);
        }
        customize(&mut account);

        RequestContext::scope_as("system", self.accounts.insert(account))
            .await
            .unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        credentials: Option<(&str, &str)>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((username, password)) = credentials {
            builder = builder.header(header::AUTHORIZATION, basic_auth(username, password));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, credentials: Option<(&str, &str)>) -> Response {
        self.request(Method::GET, uri, credentials, None).await
    }
}

pub fn basic_auth(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", username, password))
    )
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub const ALICE: Option<(&str, &str)> = Some(("alice", "wonderland"));
pub const BOB: Option<(&str, &str)> = Some(("bob", "builder"));
