// lib.rs
// Login gate for the factory monitoring dashboard: TOTP engine, credential
// store, login state machine and the axum router that serves them.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod totp;

use state::AppState;

pub fn build_app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(routes::dashboard))
        .route("/setup", get(routes::setup))
        .route("/setup/verify", post(routes::setup_verify))
        .route("/setup/complete", post(routes::setup_complete))
        .route("/setup/reset", post(routes::setup_reset))
        .route("/qrcode", get(routes::qrcode))
        .route("/admin", get(routes::admin_page))
        .route(
            "/admin/accounts",
            get(routes::list_accounts).post(routes::create_account),
        )
        .route(
            "/admin/accounts/{username}/deactivate",
            post(routes::deactivate_account),
        )
        .route(
            "/admin/accounts/{username}/reactivate",
            post(routes::reactivate_account),
        )
        .route(
            "/admin/accounts/{username}/unbind",
            post(routes::unbind_account),
        )
        .route("/admin/bind", post(routes::bind_self))
        .route("/admin/bindings", get(routes::bindings_index))
        .route("/admin/stats", get(routes::statistics))
        .route("/admin/export", get(routes::export_data))
        .route("/admin/clear", post(routes::clear_data))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/", get(routes::home))
        .route("/login", post(routes::login))
        .route("/login/totp", post(routes::login_totp))
        .route("/logout", post(routes::logout))
        .route("/session", get(routes::session_status))
        .route("/setup/first-account", post(routes::first_account))
        .merge(protected)
        .with_state(state)
}
