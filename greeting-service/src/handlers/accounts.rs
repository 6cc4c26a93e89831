use axum::extract::{Json, State};
use service_core::error::AppError;

use crate::dtos::AccountResponse;
use crate::middleware::AuthUser;
use crate::AppState;

pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state
        .accounts
        .find_by_username(&principal.username)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Account {} not found", principal.username))
        })?;

    Ok(Json(account.into()))
}
