use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AuthError,
    models::AccountSummary,
    session::SessionUser,
    state::{AppState, accounts::DEFAULT_DESCRIPTION},
};

#[derive(Deserialize, Default)]
pub struct CreateAccountRequest {
    pub description: Option<String>,
    /// Fixed username; generated when absent.
    pub username: Option<String>,
}

pub async fn list_accounts(
    State(st): State<Arc<AppState>>,
) -> Result<Json<Vec<AccountSummary>>, AuthError> {
    Ok(Json(st.store.list_accounts().await?))
}

pub async fn create_account(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<Response, AuthError> {
    let description = body
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DESCRIPTION);

    let account = match body.username.as_deref().map(str::trim) {
        Some(username) if !username.is_empty() => {
            st.store.create_account_named(username, description).await?
        }
        _ => st.store.create_account(description).await?,
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "username": account.username,
            "password": account.password,
            "description": account.description,
            "createdAt": account.created_at,
        })),
    )
        .into_response())
}

pub async fn deactivate_account(
    State(st): State<Arc<AppState>>,
    user: SessionUser,
    Path(username): Path<String>,
) -> Result<Response, AuthError> {
    if username == user.username() {
        return Err(AuthError::SelfDeactivation);
    }
    if !st.store.deactivate_account(&username).await? {
        return Err(AuthError::AccountNotFound);
    }
    let revoked = st.sessions.revoke_user(&username);
    tracing::info!(%username, by = %user.username(), revoked, "account deactivated");
    Ok(Json(json!({ "ok": true })).into_response())
}

pub async fn reactivate_account(
    State(st): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Response, AuthError> {
    if !st.store.reactivate_account(&username).await? {
        return Err(AuthError::AccountNotFound);
    }
    Ok(Json(json!({ "ok": true })).into_response())
}
