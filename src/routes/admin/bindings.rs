use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    error::AuthError,
    models::BindingRecord,
    session::SessionUser,
    state::AppState,
    totp::{base32, uri},
};

/// Binds a fresh secret to the signed-in account and returns what the
/// authenticator app needs to enroll it.
pub async fn bind_self(
    State(st): State<Arc<AppState>>,
    user: SessionUser,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let username = user.username();
    let secret = base32::generate_secret();
    let device_info = json!({
        "userAgent": headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown"),
        "boundFrom": "admin",
    });

    let binding = st.store.bind_totp(username, &secret, device_info).await?;
    let otpauth_url = st.verifier.enrollment_uri(&secret, Some(username));

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "username": binding.username,
            "boundAt": binding.bound_at,
            "secret": secret,
            "formattedSecret": base32::format_secret(&secret),
            "qrUrl": uri::qr_service_url(&st.config.qr_service_url, &otpauth_url),
            "otpauthUrl": otpauth_url,
        })),
    )
        .into_response())
}

pub async fn unbind_account(
    State(st): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Response, AuthError> {
    if !st.store.unbind_totp(&username).await? {
        return Err(AuthError::NotBound);
    }
    Ok(Json(json!({ "ok": true })).into_response())
}

pub async fn bindings_index(
    State(st): State<Arc<AppState>>,
) -> Result<Json<Vec<BindingRecord>>, AuthError> {
    Ok(Json(st.store.binding_records().await?))
}
