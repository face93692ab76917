// routes/login.rs
// POST /login      { "username": "...", "password": "..." }
// POST /login/totp { "code": "123 456" }
//
// Failed attempts are pooled per username in `AppState::attempts`, so a new
// flow or a dropped cookie starts with the same counter. A flow is only kept
// while its authenticator challenge is pending.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    auth::{AuthMachine, AuthPhase, LoginOutcome},
    error::AuthError,
    models::Session,
    session::{FLOW_COOKIE_NAME, SESSION_COOKIE_NAME, clear_cookie, extract_cookies, set_cookie},
    state::AppState,
};

#[derive(Deserialize)]
pub struct PasswordRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

fn new_machine(st: &AppState) -> AuthMachine {
    AuthMachine::with_ledger(
        st.store.clone(),
        st.verifier.clone(),
        st.clock.clone(),
        st.config.policy.clone(),
        st.attempts.clone(),
    )
}

fn flow_cookie(headers: &HeaderMap) -> Option<String> {
    extract_cookies(headers, FLOW_COOKIE_NAME).into_iter().next()
}

fn housekeeping(st: &AppState) {
    let now = st.clock.now();
    st.flows.purge_expired(now);
    st.attempts.purge_idle(now);
}

/// Registers the session and hands its token to the browser.
fn signed_in(st: &AppState, session: Session) -> Response {
    st.sessions.purge_expired(st.clock.now());
    let token = st.sessions.insert(session.clone());
    let mut response = Json(json!({
        "ok": true,
        "step": "done",
        "redirect_url": "/dashboard",
        "session": session,
    }))
    .into_response();
    set_cookie(&mut response, SESSION_COOKIE_NAME, &token);
    clear_cookie(&mut response, FLOW_COOKIE_NAME);
    response
}

pub async fn login(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PasswordRequest>,
) -> Response {
    housekeeping(&st);
    // A fresh password submission abandons whatever challenge was pending.
    let stale = flow_cookie(&headers);
    if let Some(flow_id) = &stale {
        st.flows.remove(flow_id);
    }

    let mut machine = new_machine(&st);
    let outcome = machine
        .submit_password(body.username.trim(), &body.password)
        .await;

    match outcome {
        Ok(LoginOutcome::Authenticated(session)) => signed_in(&st, session),
        Ok(LoginOutcome::TotpRequired { username }) => {
            let flow_id = st
                .flows
                .insert(Arc::new(Mutex::new(machine)), st.clock.now());
            let mut response = Json(json!({
                "ok": true,
                "step": "totp",
                "username": username,
            }))
            .into_response();
            set_cookie(&mut response, FLOW_COOKIE_NAME, &flow_id);
            response
        }
        Err(err) => {
            let mut response = err.into_response();
            if stale.is_some() {
                clear_cookie(&mut response, FLOW_COOKIE_NAME);
            }
            response
        }
    }
}

pub async fn login_totp(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CodeRequest>,
) -> Response {
    housekeeping(&st);
    let now = st.clock.now();
    let Some((flow_id, machine)) =
        flow_cookie(&headers).and_then(|id| st.flows.get(&id, now).map(|m| (id, m)))
    else {
        return AuthError::NoPendingChallenge.into_response();
    };

    let (outcome, pending) = {
        let mut machine = machine.lock().await;
        let outcome = machine.submit_totp(&body.code).await;
        let pending = matches!(machine.phase(), AuthPhase::TotpPending { .. });
        (outcome, pending)
    };
    if !pending {
        st.flows.remove(&flow_id);
    }

    match outcome {
        Ok(session) => signed_in(&st, session),
        Err(err) => {
            let mut response = err.into_response();
            if !pending {
                clear_cookie(&mut response, FLOW_COOKIE_NAME);
            }
            response
        }
    }
}
