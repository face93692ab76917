// state module: AppState, initialization, and re-exports of submodules.

use anyhow::Result;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    auth::AttemptLedger,
    clock::{Clock, SystemClock},
    config::{Config, StoreBackend},
    session::{LoginFlows, SessionRegistry},
    totp::{FactorySecret, TotpVerifier},
};

pub mod accounts;
pub mod kv;

pub use accounts::CredentialStore;
pub use kv::{FileStore, KvStore, MemoryStore, MongoStore};

pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<CredentialStore>,
    pub factory: FactorySecret,
    pub verifier: TotpVerifier,
    pub sessions: SessionRegistry,
    pub flows: LoginFlows,
    /// Failed-attempt counters for every login flow, keyed by username.
    pub attempts: Arc<AttemptLedger>,
    pub http: reqwest::Client,
    setup_verified: AtomicBool,
}

impl AppState {
    pub fn new(config: Config, kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(CredentialStore::new(
            kv.clone(),
            clock.clone(),
            config.account_password.clone(),
        ));
        Self {
            verifier: TotpVerifier::new(config.totp.clone()),
            factory: FactorySecret::new(kv),
            sessions: SessionRegistry::default(),
            flows: LoginFlows::default(),
            attempts: Arc::new(AttemptLedger::new(
                config.policy.max_attempts,
                config.policy.lockout,
            )),
            http: reqwest::Client::new(),
            setup_verified: AtomicBool::new(false),
            store,
            clock,
            config,
        }
    }

    /// Whether a code was verified against the current factory secret since
    /// it was last generated.
    pub fn setup_verified(&self) -> bool {
        self.setup_verified.load(Ordering::SeqCst)
    }

    pub fn set_setup_verified(&self, verified: bool) {
        self.setup_verified.store(verified, Ordering::SeqCst);
    }
}

pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn KvStore>> {
    Ok(match backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File(path) => Arc::new(FileStore::new(path.clone())),
        StoreBackend::Mongo { uri, db } => Arc::new(MongoStore::connect(uri, db).await?),
    })
}

pub async fn init_state(config: Config) -> Result<AppState> {
    let kv = open_store(&config.backend).await?;
    let state = AppState::new(config, kv, Arc::new(SystemClock));

    if state.config.seed_account {
        if let Some(account) = state.store.ensure_seed_account().await? {
            tracing::info!(username = %account.username, "store was empty, seeded a test account");
        }
    }
    Ok(state)
}
