#![allow(dead_code)]

use std::{
    env,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::SET_COOKIE},
};
use mongodb::Client;
use serde_json::Value;
use tower::ServiceExt; // for oneshot

use factorydash::{
    build_app,
    clock::ManualClock,
    config::Config,
    state::{AppState, KvStore, MemoryStore, MongoStore},
};

pub const PASSWORD: &str = "shared-pass";
pub const T0: i64 = 1_700_000_000;
pub const KNOWN_SECRET: &str = "JBSWY3DPEHPK3PXP";

pub struct TestContext {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
}

impl TestContext {
    pub fn app(&self) -> Router {
        build_app(self.state.clone())
    }
}

/// In-memory state with a manual clock parked at `T0`.
pub fn setup_state() -> TestContext {
    let clock = Arc::new(ManualClock::at_unix(T0));
    let config = Config {
        account_password: PASSWORD.to_string(),
        qr_service_url: "http://127.0.0.1:9/qr".to_string(),
        ..Config::in_memory()
    };
    let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let state = AppState::new(config, kv, clock.clone());
    TestContext {
        state: Arc::new(state),
        clock,
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub cookies: Vec<String>,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response is not json")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Value of a cookie set by the response, e.g. `session`.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.iter().find_map(|c| {
            let pair = c.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
    }
}

pub async fn send(
    app: Router,
    method: &str,
    path: &str,
    cookies: &[(&str, &str)],
    json: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(path);
    if !cookies.is_empty() {
        let header = cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.header("cookie", header);
    }
    let body = match json {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let req = builder.body(body).unwrap();

    let res = app.oneshot(req).await.expect("request failed");
    let status = res.status();
    let headers = res.headers().clone();
    let cookies = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    let body = to_bytes(res.into_body(), 1024 * 1024)
        .await
        .expect("body read failed")
        .to_vec();
    Reply {
        status,
        cookies,
        headers,
        body,
    }
}

/// Global lock so tests that touch MongoDB run one at a time.
static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct MongoContext {
    pub store: MongoStore,
    pub uri: String,
    pub db_name: String,
    _guard: MutexGuard<'static, ()>,
}

/// `None` (and a note on stderr) when no MongoDB server is reachable.
pub async fn setup_mongo() -> Option<MongoContext> {
    let guard = TEST_DB_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());

    let uri = env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let db_name = format!("factorydashtest_{}", uuid::Uuid::new_v4().simple());

    let client = match Client::with_uri_str(&uri).await {
        Ok(c) => c,
        Err(err) => {
            eprintln!("Skipping test; cannot connect to MongoDB: {err:?}");
            return None;
        }
    };
    if let Err(err) = client.database(&db_name).drop().await {
        eprintln!("Skipping test; cannot drop test DB: {err:?}");
        return None;
    }

    match MongoStore::connect(&uri, &db_name).await {
        Ok(store) => Some(MongoContext {
            store,
            uri,
            db_name,
            _guard: guard,
        }),
        Err(err) => {
            eprintln!("Skipping test; MongoStore::connect failed: {err:?}");
            None
        }
    }
}

pub async fn teardown_mongo(ctx: Option<MongoContext>) {
    if let Some(ctx) = ctx {
        if let Ok(client) = Client::with_uri_str(&ctx.uri).await {
            let _ = client.database(&ctx.db_name).drop().await;
        }
    }
}
