// session.rs
// Issued-session registry, per-browser login flows, the middleware that
// gates protected routes and the extractor handlers use to read the session.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::COOKIE, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use futures::future::BoxFuture;
use rand::RngCore;

use crate::{
    auth::{AuthMachine, is_authenticated},
    error::AuthError,
    models::Session,
    state::AppState,
};

pub const SESSION_COOKIE_NAME: &str = "session";
pub const FLOW_COOKIE_NAME: &str = "login_flow";

fn new_token() -> String {
    let mut token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut token_bytes);
    BASE32_NOPAD.encode(&token_bytes)
}

/// Sessions handed out after a completed login, keyed by cookie token.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn insert(&self, session: Session) -> String {
        let token = new_token();
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.clone(), session);
        token
    }

    /// Live session for `token`; expired entries are removed on sight.
    pub fn get(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(token) {
            Some(session) if is_authenticated(session, now) => Some(session.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)
    }

    /// Drops every session of `username`, e.g. after deactivation.
    pub fn revoke_user(&self, username: &str) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, s| s.username != username);
        before - sessions.len()
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, s| is_authenticated(s, now));
        before - sessions.len()
    }
}

pub type SharedMachine = Arc<tokio::sync::Mutex<AuthMachine>>;

/// How long a pending authenticator challenge stays claimable.
pub const CHALLENGE_TTL_SECONDS: i64 = 5 * 60;

struct PendingFlow {
    machine: SharedMachine,
    created_at: DateTime<Utc>,
}

/// Login flows waiting for their authenticator code, addressed by the flow
/// cookie. Only `TotpPending` machines are kept, and only until the TTL runs
/// out.
pub struct LoginFlows {
    ttl: Duration,
    flows: Mutex<HashMap<String, PendingFlow>>,
}

impl LoginFlows {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Stores a machine and returns the id for the flow cookie.
    pub fn insert(&self, machine: SharedMachine, now: DateTime<Utc>) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.flows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                id.clone(),
                PendingFlow {
                    machine,
                    created_at: now,
                },
            );
        id
    }

    /// Live flow for `flow_id`; an expired one is removed.
    pub fn get(&self, flow_id: &str, now: DateTime<Utc>) -> Option<SharedMachine> {
        let mut flows = self.flows.lock().unwrap_or_else(|e| e.into_inner());
        match flows.get(flow_id) {
            Some(flow) if now - flow.created_at < self.ttl => Some(flow.machine.clone()),
            Some(_) => {
                flows.remove(flow_id);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, flow_id: &str) -> bool {
        self.flows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(flow_id)
            .is_some()
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut flows = self.flows.lock().unwrap_or_else(|e| e.into_inner());
        let before = flows.len();
        flows.retain(|_, flow| now - flow.created_at < self.ttl);
        before - flows.len()
    }

    pub fn len(&self) -> usize {
        self.flows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LoginFlows {
    fn default() -> Self {
        Self::new(Duration::seconds(CHALLENGE_TTL_SECONDS))
    }
}

#[derive(Clone)]
pub struct SessionData {
    pub session: Session,
    pub token: String,
}

pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let now = state.clock.now();
    let found = extract_cookies(request.headers(), SESSION_COOKIE_NAME)
        .into_iter()
        .find_map(|token| state.sessions.get(&token, now).map(|s| (s, token)));

    let Some((session, token)) = found else {
        return Err(unauthorized_response());
    };

    match state.store.is_account_active(&session.username).await {
        Ok(true) => {}
        Ok(false) => {
            state.sessions.remove(&token);
            return Err(AuthError::AccountInactive.into_response());
        }
        Err(err) => return Err(err.into_response()),
    }

    request
        .extensions_mut()
        .insert(SessionData { session, token });
    Ok(next.run(request).await)
}

pub struct SessionUser(pub SessionData);

impl SessionUser {
    pub fn session(&self) -> &Session {
        &self.0.session
    }

    pub fn username(&self) -> &str {
        &self.0.session.username
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[allow(refining_impl_trait)]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> BoxFuture<'static, Result<Self, Self::Rejection>> {
        let data = parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .ok_or_else(unauthorized_response);

        Box::pin(async move { data.map(SessionUser) })
    }
}

fn unauthorized_response() -> Response {
    (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

pub fn extract_cookies(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let mut split = pair.trim().splitn(2, '=');
            let key = split.next()?.trim();
            let value = split.next()?.trim();
            if key == name {
                Some(value.to_owned())
            } else {
                None
            }
        })
        .collect()
}

/// Browser-session cookie: no `Max-Age`, so it ends with the browsing context.
pub fn set_cookie(response: &mut Response, name: &str, value: &str) {
    if let Ok(header_value) = HeaderValue::from_str(&format!(
        "{name}={value}; Path=/; HttpOnly; SameSite=Lax"
    )) {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
}

pub fn clear_cookie(response: &mut Response, name: &str) {
    if let Ok(header_value) = HeaderValue::from_str(&format!(
        "{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
    )) {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(username: &str, issued: DateTime<Utc>) -> Session {
        Session {
            authenticated: true,
            username: username.into(),
            issued_at: issued,
            expires_at: issued + Duration::hours(8),
        }
    }

    #[test]
    fn registry_drops_expired_sessions() {
        let registry = SessionRegistry::default();
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = registry.insert(session("YS123456A", t0));
        assert_eq!(token.len(), 52);
        assert!(registry.get(&token, t0 + Duration::hours(1)).is_some());
        assert!(registry.get(&token, t0 + Duration::hours(8)).is_none());
        assert!(registry.remove(&token).is_none());
    }

    #[test]
    fn revoking_a_user_removes_all_their_sessions() {
        let registry = SessionRegistry::default();
        let t0 = DateTime::from_timestamp(0, 0).unwrap();
        registry.insert(session("a", t0));
        registry.insert(session("a", t0));
        let keep = registry.insert(session("b", t0));
        assert_eq!(registry.revoke_user("a"), 2);
        assert!(registry.get(&keep, t0).is_some());
        assert_eq!(registry.purge_expired(t0 + Duration::days(1)), 1);
    }

    #[test]
    fn reads_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session=abc; login_flow=f1"),
        );
        assert_eq!(extract_cookies(&headers, SESSION_COOKIE_NAME), vec!["abc"]);
        assert_eq!(extract_cookies(&headers, FLOW_COOKIE_NAME), vec!["f1"]);
        assert!(extract_cookies(&headers, "missing").is_empty());
    }
}
