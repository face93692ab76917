// main.rs
// Loads `.env`, builds the state from the environment and serves the login
// gate.
//
// Endpoints:
// - GET  /                      -> login page
// - POST /login, /login/totp    -> password step, authenticator step
// - POST /logout                -> ends the session
// - GET  /session               -> session status
// - POST /setup/first-account   -> first administrator (empty store only)
// - GET  /dashboard, /setup, /qrcode, /admin/...  -> require a session

use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use factorydash::{build_app, config::Config, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("factorydash=info")),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.bind_addr;
    let state = Arc::new(
        state::init_state(config)
            .await
            .context("failed to initialize state")?,
    );

    let app = build_app(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
