use serde::Serialize;
use std::sync::Arc;

use super::repository::GreetingRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub details: serde_json::Value,
}

impl HealthReport {
    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }
}

/// Reports DOWN until at least one greeting is stored.
pub struct GreetingHealthIndicator {
    repository: Arc<dyn GreetingRepository>,
}

impl GreetingHealthIndicator {
    pub fn new(repository: Arc<dyn GreetingRepository>) -> Self {
        Self { repository }
    }

    pub async fn health(&self) -> HealthReport {
        match self.repository.count().await {
            Ok(count) if count > 0 => HealthReport {
                status: HealthStatus::Up,
                details: serde_json::json!({ "count": count }),
            },
            Ok(count) => HealthReport {
                status: HealthStatus::Down,
                details: serde_json::json!({ "count": count }),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Greeting health check failed");
                HealthReport {
                    status: HealthStatus::Down,
                    details: serde_json::json!({ "error": e.to_string() }),
                }
            }
        }
    }
}
