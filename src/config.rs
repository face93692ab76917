// config.rs
// Runtime configuration from the environment (after dotenvy loads `.env`).

use anyhow::{Context, Result, bail};
use chrono::Duration;
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use crate::{
    auth::AuthPolicy,
    auth::machine::{LOCKOUT_SECONDS, SESSION_TTL_SECONDS},
    auth::lockout::DEFAULT_MAX_ATTEMPTS,
    totp::TotpSettings,
};

pub const DEFAULT_QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File(PathBuf),
    Mongo { uri: String, db: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
    pub totp: TotpSettings,
    pub policy: AuthPolicy,
    /// Shared password assigned to generated accounts.
    pub account_password: String,
    pub seed_account: bool,
    pub qr_service_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend: StoreBackend::File(PathBuf::from("./data/store.json")),
            totp: TotpSettings::default(),
            policy: AuthPolicy::default(),
            account_password: "change-me".to_string(),
            seed_account: true,
            qr_service_url: DEFAULT_QR_SERVICE_URL.to_string(),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = TotpSettings::default();

        let backend = match var_or("STORE_BACKEND", "file").to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "file" => StoreBackend::File(PathBuf::from(var_or("STORE_PATH", "./data/store.json"))),
            "mongo" | "mongodb" => StoreBackend::Mongo {
                uri: var_or("MONGODB_URI", "mongodb://localhost:27017"),
                db: var_or("MONGODB_DB", "factorydash"),
            },
            other => bail!("unknown STORE_BACKEND {other:?} (expected file, mongo or memory)"),
        };

        let account_password = var_or("ACCOUNT_PASSWORD", "change-me");
        if account_password.trim().is_empty() {
            bail!("ACCOUNT_PASSWORD must not be empty");
        }

        let policy = AuthPolicy {
            max_attempts: parse_var("MAX_LOGIN_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            lockout: Duration::seconds(parse_var("LOCKOUT_SECONDS", LOCKOUT_SECONDS)?),
            session_ttl: Duration::seconds(parse_var("SESSION_TTL_SECONDS", SESSION_TTL_SECONDS)?),
        };

        Ok(Self {
            bind_addr: parse_var("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            backend,
            totp: TotpSettings {
                issuer: var_or("TOTP_ISSUER", &defaults.issuer),
                account_name: var_or("TOTP_ACCOUNT_NAME", &defaults.account_name),
                skew: parse_var("TOTP_SKEW", defaults.skew)?,
            },
            policy,
            account_password,
            seed_account: parse_var("SEED_ACCOUNT", true)?,
            qr_service_url: var_or("QR_SERVICE_URL", DEFAULT_QR_SERVICE_URL),
        })
    }

    /// In-memory configuration for tests and demos.
    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            seed_account: false,
            ..Self::default()
        }
    }
}
