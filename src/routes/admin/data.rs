use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{error::AuthError, models::Statistics, session::SessionUser, state::AppState};

pub async fn statistics(State(st): State<Arc<AppState>>) -> Result<Json<Statistics>, AuthError> {
    Ok(Json(st.store.statistics().await?))
}

/// Redacted JSON snapshot served as a file download.
pub async fn export_data(State(st): State<Arc<AppState>>) -> Result<Response, AuthError> {
    let document = st.store.export_data().await?;
    let body = serde_json::to_vec_pretty(&document).map_err(anyhow::Error::from)?;

    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", document.file_name()))
    {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}

pub async fn clear_data(
    State(st): State<Arc<AppState>>,
    user: SessionUser,
) -> Result<Response, AuthError> {
    st.store.clear_all_data().await?;
    tracing::warn!(by = %user.username(), "account data cleared");
    Ok(Json(json!({ "ok": true })).into_response())
}
