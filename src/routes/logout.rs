// routes/logout.rs
// POST /logout -> drops the session entry and any pending login flow, then
// clears both cookies. Repeating it is harmless.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::{
    session::{FLOW_COOKIE_NAME, SESSION_COOKIE_NAME, clear_cookie, extract_cookies},
    state::AppState,
};

pub async fn logout(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    for token in extract_cookies(&headers, SESSION_COOKIE_NAME) {
        if let Some(session) = st.sessions.remove(&token) {
            tracing::info!(username = %session.username, "session closed");
        }
    }
    for flow_id in extract_cookies(&headers, FLOW_COOKIE_NAME) {
        st.flows.remove(&flow_id);
    }

    let mut response = (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response();
    clear_cookie(&mut response, SESSION_COOKIE_NAME);
    clear_cookie(&mut response, FLOW_COOKIE_NAME);
    response
}
