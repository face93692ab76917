// routes/dashboard.rs
// GET /dashboard (protected) -> monitoring landing page.
// GET /session               -> { authenticated, session?, remaining_seconds? }

use askama::Template;
use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    session::{SESSION_COOKIE_NAME, SessionUser, extract_cookies},
    state::AppState,
};

use super::render;

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    username: String,
    login_time: String,
    expires: String,
    remaining_minutes: i64,
    factory_setup: bool,
}

pub async fn dashboard(State(st): State<Arc<AppState>>, user: SessionUser) -> Response {
    let factory_setup = match st.factory.is_setup().await {
        Ok(flag) => flag,
        Err(err) => return err.into_response(),
    };
    let session = user.session();
    render(DashboardTemplate {
        username: session.username.clone(),
        login_time: session.issued_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        expires: session.expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        remaining_minutes: session.remaining_seconds(st.clock.now()) / 60,
        factory_setup,
    })
    .into_response()
}

pub async fn session_status(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let now = st.clock.now();
    let live = extract_cookies(&headers, SESSION_COOKIE_NAME)
        .iter()
        .find_map(|token| st.sessions.get(token, now));

    match live {
        Some(session) => Json(json!({
            "authenticated": true,
            "remaining_seconds": session.remaining_seconds(now),
            "session": session,
        }))
        .into_response(),
        None => Json(json!({ "authenticated": false })).into_response(),
    }
}
