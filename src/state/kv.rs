// state/kv.rs
// Durable key-value entries behind the credential store: in-memory, JSON
// file and MongoDB backends share one trait.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use mongodb::{Collection, bson::doc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Mutex,
};

pub const ACCOUNTS_KEY: &str = "accounts";
pub const BINDINGS_KEY: &str = "bindings";
pub const TOTP_SECRET_KEY: &str = "totp_secret";
pub const TOTP_SETUP_KEY: &str = "totp_setup_flag";

/// String-valued store with local-storage semantics: whole values are read
/// and replaced, there are no partial updates.
pub trait KvStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>>;
    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .with_context(|| format!("corrupt value under `{key}`")),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw).await
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        let value = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Box::pin(async { Ok(()) })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Box::pin(async { Ok(()) })
    }
}

/// All entries in one JSON object on disk. Writes go to a sibling temp file
/// and are renamed into place.
pub struct FileStore {
    path: PathBuf,
    io: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let _guard = self.io.lock().await;
            Ok(self.load().await?.remove(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let _guard = self.io.lock().await;
            let mut entries = self.load().await?;
            entries.insert(key.to_string(), value);
            self.persist(&entries).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let _guard = self.io.lock().await;
            let mut entries = self.load().await?;
            if entries.remove(key).is_some() {
                self.persist(&entries).await?;
            }
            Ok(())
        })
    }
}

/// Entry document in the `kv` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    #[serde(rename = "_id")]
    pub key: String,
    pub value: String,
}

pub struct MongoStore {
    entries: Collection<KvEntry>,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = mongodb::Client::with_uri_str(uri)
            .await
            .with_context(|| format!("connecting to {uri}"))?;
        let db = client.database(db_name);
        let existing = db.list_collection_names().await?;
        if !existing.iter().any(|name| name == "kv") {
            db.create_collection("kv").await?;
        }
        Ok(Self {
            entries: db.collection::<KvEntry>("kv"),
        })
    }
}

impl KvStore for MongoStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let entry = self.entries.find_one(doc! { "_id": key }).await?;
            Ok(entry.map(|e| e.value))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.entries
                .replace_one(
                    doc! { "_id": key },
                    KvEntry {
                        key: key.to_string(),
                        value,
                    },
                )
                .upsert(true)
                .await?;
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.entries.delete_one(doc! { "_id": key }).await?;
            Ok(())
        })
    }
}
