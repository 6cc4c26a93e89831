use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{CreateGreetingRequest, UpdateGreetingRequest};
use crate::models::Greeting;
use crate::AppState;

fn not_found(id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Greeting {} not found", id))
}

pub async fn list_greetings(
    State(state): State<AppState>,
) -> Result<Json<Vec<Greeting>>, AppError> {
    Ok(Json(state.greetings.find_all().await?))
}

pub async fn get_greeting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Greeting>, AppError> {
    let greeting = state.greetings.find_one(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(greeting))
}

pub async fn create_greeting(
    State(state): State<AppState>,
    Json(payload): Json<CreateGreetingRequest>,
) -> Result<(StatusCode, Json<Greeting>), AppError> {
    payload.validate()?;

    let created = state.greetings.create(Greeting::new(payload.text)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Apply the client's edit on top of the stored record. The client's `version` is kept
/// so a stale edit is detected by storage.
pub async fn update_greeting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateGreetingRequest>,
) -> Result<Json<Greeting>, AppError> {
    payload.validate()?;

    let mut greeting = state.greetings.find_one(id).await?.ok_or_else(|| not_found(id))?;
    greeting.text = payload.text;
    greeting.entity.version = payload.version;

    Ok(Json(state.greetings.update(greeting).await?))
}

pub async fn delete_greeting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.greetings.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn evict_greeting_cache(State(state): State<AppState>) -> StatusCode {
    state.greetings.evict_cache();
    StatusCode::NO_CONTENT
}
