// routes/setup.rs
// Factory authenticator setup (protected):
//   GET  /setup           -> enrollment data for the factory secret
//   POST /setup/verify    -> { "code": "123456" } tests a code
//   POST /setup/complete  -> marks setup done, only after a passing test
//   POST /setup/reset     -> regenerates the secret
// POST /setup/first-account (public) creates the administrator account while
// the store is still empty.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::{
    error::{AuthError, AuthResult},
    state::AppState,
    totp::{base32, format_code, normalize_code, uri},
};

#[derive(Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

/// What an operator needs to enroll an authenticator app.
#[derive(Serialize)]
pub struct Enrollment {
    pub secret: String,
    pub formatted_secret: String,
    pub otpauth_url: String,
    pub qr_url: String,
    pub current_code: String,
    pub formatted_code: String,
    pub remaining_seconds: u64,
    pub is_setup: bool,
    pub verified: bool,
}

async fn enrollment(st: &AppState, secret: String) -> AuthResult<Enrollment> {
    let now = st.clock.unix_seconds();
    let otpauth_url = st.verifier.enrollment_uri(&secret, None);
    let current_code = st.verifier.current_code(&secret, now)?;
    Ok(Enrollment {
        formatted_secret: base32::format_secret(&secret),
        qr_url: uri::qr_service_url(&st.config.qr_service_url, &otpauth_url),
        formatted_code: format_code(&current_code),
        remaining_seconds: st.verifier.remaining_seconds(now),
        is_setup: st.factory.is_setup().await?,
        verified: st.setup_verified(),
        current_code,
        otpauth_url,
        secret,
    })
}

pub async fn setup(State(st): State<Arc<AppState>>) -> Result<Json<Enrollment>, AuthError> {
    let secret = st.factory.secret().await?;
    Ok(Json(enrollment(&st, secret).await?))
}

pub async fn setup_verify(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CodeRequest>,
) -> Result<Response, AuthError> {
    let code = normalize_code(&body.code)?;
    let valid = st
        .verifier
        .verify_with(&st.factory, &code, st.clock.unix_seconds())
        .await?;
    if valid {
        st.set_setup_verified(true);
        tracing::info!("factory authenticator test passed");
    } else {
        tracing::warn!("factory authenticator test failed");
    }
    Ok(Json(json!({ "valid": valid, "code": format_code(&code) })).into_response())
}

pub async fn setup_complete(State(st): State<Arc<AppState>>) -> Result<Response, AuthError> {
    if !st.setup_verified() {
        return Err(AuthError::SetupNotVerified);
    }
    st.factory.mark_as_setup().await?;
    Ok(Json(json!({ "ok": true })).into_response())
}

pub async fn setup_reset(State(st): State<Arc<AppState>>) -> Result<Json<Enrollment>, AuthError> {
    let secret = st.factory.reset().await?;
    st.set_setup_verified(false);
    Ok(Json(enrollment(&st, secret).await?))
}

pub async fn first_account(State(st): State<Arc<AppState>>) -> Result<Response, AuthError> {
    let account = st.store.create_first_admin_account().await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "username": account.username,
            "password": account.password,
            "description": account.description,
        })),
    )
        .into_response())
}
