// routes/home.rs
// GET / -> login page. Posts JSON to /login and, when an authenticator is
// bound, to /login/totp.

use askama::Template;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use crate::{
    session::{SESSION_COOKIE_NAME, extract_cookies},
    state::AppState,
};

use super::render;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    issuer: String,
    max_attempts: u32,
}

pub async fn home(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let now = st.clock.now();
    let signed_in = extract_cookies(&headers, SESSION_COOKIE_NAME)
        .iter()
        .any(|token| st.sessions.get(token, now).is_some());
    if signed_in {
        return Redirect::to("/dashboard").into_response();
    }

    render(LoginTemplate {
        issuer: st.verifier.settings().issuer.clone(),
        max_attempts: st.config.policy.max_attempts,
    })
    .into_response()
}
