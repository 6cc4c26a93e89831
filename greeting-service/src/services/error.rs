use service_core::error::AppError;
use thiserror::Error;

use crate::models::AuditError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} {id} was modified concurrently; version {expected} is stale")]
    Conflict {
        entity: &'static str,
        id: i64,
        expected: i32,
    },

    #[error("Cannot create a new {0} with a supplied id")]
    EntityExists(&'static str),

    #[error("Cannot update a {0} without an id")]
    MissingId(&'static str),

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Audit(e) => AppError::InternalError(anyhow::Error::new(e)),
            e @ ServiceError::NotFound { .. } => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            e @ ServiceError::Conflict { .. } => AppError::Conflict(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::EntityExists(_) | ServiceError::MissingId(_)) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            e @ ServiceError::UsernameTaken(_) => AppError::Conflict(anyhow::anyhow!(e.to_string())),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
