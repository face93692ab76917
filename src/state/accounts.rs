// state/accounts.rs
// CredentialStore: sole writer of the `accounts` and `bindings` entries.
// Every mutation is a read-modify-write under one store-wide lock.

use chrono::Duration;
use futures::future::BoxFuture;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    error::{AuthError, AuthResult},
    models::{
        Account, AccountSummary, BindingRecord, ExportDocument, REDACTED, Statistics, TotpBinding,
    },
    totp::SecretProvider,
};

use super::kv::{ACCOUNTS_KEY, BINDINGS_KEY, KvStore, get_json, set_json};

const USERNAME_PREFIXES: [&str; 8] = ["YS", "FC", "AD", "OP", "MG", "SU", "TK", "WK"];
const MAX_USERNAME_TRIES: usize = 64;

pub const SEED_DESCRIPTION: &str = "Auto-created test account";
pub const ADMIN_DESCRIPTION: &str = "System administrator account";
pub const DEFAULT_DESCRIPTION: &str = "Generated by the system";

/// `<prefix><6 digits><A-Z>`, e.g. `YS482913K`.
fn random_username() -> String {
    let mut rng = rand::rng();
    let prefix = USERNAME_PREFIXES[rng.random_range(0..USERNAME_PREFIXES.len())];
    let number: u32 = rng.random_range(100_000..=999_999);
    let suffix = (b'A' + rng.random_range(0..26u8)) as char;
    format!("{prefix}{number}{suffix}")
}

pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    password: String,
    write: tokio::sync::Mutex<()>,
}

impl CredentialStore {
    /// `password` is the shared credential assigned to every generated account.
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, password: impl Into<String>) -> Self {
        Self {
            kv,
            clock,
            password: password.into(),
            write: tokio::sync::Mutex::new(()),
        }
    }

    pub fn shared_password(&self) -> &str {
        &self.password
    }

    async fn load_accounts(&self) -> AuthResult<Vec<Account>> {
        Ok(get_json(self.kv.as_ref(), ACCOUNTS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_accounts(&self, accounts: &[Account]) -> AuthResult<()> {
        Ok(set_json(self.kv.as_ref(), ACCOUNTS_KEY, accounts).await?)
    }

    async fn load_bindings(&self) -> AuthResult<Vec<TotpBinding>> {
        Ok(get_json(self.kv.as_ref(), BINDINGS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_bindings(&self, bindings: &[TotpBinding]) -> AuthResult<()> {
        Ok(set_json(self.kv.as_ref(), BINDINGS_KEY, bindings).await?)
    }

    fn new_account(&self, username: String, description: &str) -> Account {
        let description = if description.trim().is_empty() {
            DEFAULT_DESCRIPTION.to_string()
        } else {
            description.trim().to_string()
        };
        Account {
            username,
            password: self.password.clone(),
            created_at: self.clock.now(),
            description,
            is_active: true,
            last_login_at: None,
            login_count: 0,
        }
    }

    /// Appends an account with a generated username, retrying on collision.
    fn push_generated(&self, accounts: &mut Vec<Account>, description: &str) -> AuthResult<Account> {
        let username = (0..MAX_USERNAME_TRIES)
            .map(|_| random_username())
            .find(|candidate| !accounts.iter().any(|a| &a.username == candidate))
            .ok_or_else(|| anyhow::anyhow!("no free username after {MAX_USERNAME_TRIES} tries"))?;
        let account = self.new_account(username, description);
        accounts.push(account.clone());
        Ok(account)
    }

    pub async fn create_account(&self, description: &str) -> AuthResult<Account> {
        let _guard = self.write.lock().await;
        let mut accounts = self.load_accounts().await?;
        let account = self.push_generated(&mut accounts, description)?;
        self.save_accounts(&accounts).await?;
        info!(username = %account.username, "account created");
        Ok(account)
    }

    /// Creates an account under a caller-chosen username.
    pub async fn create_account_named(
        &self,
        username: &str,
        description: &str,
    ) -> AuthResult<Account> {
        let _guard = self.write.lock().await;
        let mut accounts = self.load_accounts().await?;
        if accounts.iter().any(|a| a.username == username) {
            return Err(AuthError::AccountExists);
        }
        let account = self.new_account(username.to_string(), description);
        accounts.push(account.clone());
        self.save_accounts(&accounts).await?;
        info!(username = %account.username, "account created");
        Ok(account)
    }

    /// Only allowed while the store holds no accounts at all.
    pub async fn create_first_admin_account(&self) -> AuthResult<Account> {
        let _guard = self.write.lock().await;
        let mut accounts = self.load_accounts().await?;
        if !accounts.is_empty() {
            return Err(AuthError::SetupExists);
        }
        let account = self.push_generated(&mut accounts, ADMIN_DESCRIPTION)?;
        self.save_accounts(&accounts).await?;
        info!(username = %account.username, "first administrator account created");
        Ok(account)
    }

    /// Creates one test account when the store is empty.
    pub async fn ensure_seed_account(&self) -> AuthResult<Option<Account>> {
        let _guard = self.write.lock().await;
        let mut accounts = self.load_accounts().await?;
        if !accounts.is_empty() {
            return Ok(None);
        }
        let account = self.push_generated(&mut accounts, SEED_DESCRIPTION)?;
        self.save_accounts(&accounts).await?;
        info!(username = %account.username, "seed account created");
        Ok(Some(account))
    }

    /// True iff an active account matches both fields. Success stamps
    /// `lastLoginAt` and bumps `loginCount`.
    pub async fn validate_account(&self, username: &str, password: &str) -> AuthResult<bool> {
        let _guard = self.write.lock().await;
        let mut accounts = self.load_accounts().await?;
        let Some(account) = accounts
            .iter_mut()
            .find(|a| a.username == username && a.password == password && a.is_active)
        else {
            debug!(%username, "account validation failed");
            return Ok(false);
        };
        account.last_login_at = Some(self.clock.now());
        account.login_count += 1;
        self.save_accounts(&accounts).await?;
        debug!(%username, "account validated");
        Ok(true)
    }

    pub async fn find_account(&self, username: &str) -> AuthResult<Option<Account>> {
        Ok(self
            .load_accounts()
            .await?
            .into_iter()
            .find(|a| a.username == username))
    }

    pub async fn is_account_active(&self, username: &str) -> AuthResult<bool> {
        Ok(self
            .find_account(username)
            .await?
            .map(|a| a.is_active)
            .unwrap_or(false))
    }

    /// Marks the account inactive and purges every binding it owns.
    pub async fn deactivate_account(&self, username: &str) -> AuthResult<bool> {
        let _guard = self.write.lock().await;
        let mut accounts = self.load_accounts().await?;
        let Some(account) = accounts.iter_mut().find(|a| a.username == username) else {
            return Ok(false);
        };
        account.is_active = false;
        self.save_accounts(&accounts).await?;

        let purged = match self.purge_bindings_of(username).await {
            Ok(purged) => purged,
            Err(err) => {
                // Leave the account as it was rather than inactive but bound.
                warn!(%username, error = %err, "binding purge failed, restoring account");
                if let Some(account) = accounts.iter_mut().find(|a| a.username == username) {
                    account.is_active = true;
                }
                self.save_accounts(&accounts).await?;
                return Err(err);
            }
        };
        info!(%username, purged, "account deactivated");
        Ok(true)
    }

    async fn purge_bindings_of(&self, username: &str) -> AuthResult<usize> {
        let mut bindings = self.load_bindings().await?;
        let before = bindings.len();
        bindings.retain(|b| b.username != username);
        if bindings.len() != before {
            self.save_bindings(&bindings).await?;
        }
        Ok(before - bindings.len())
    }

    pub async fn reactivate_account(&self, username: &str) -> AuthResult<bool> {
        let _guard = self.write.lock().await;
        let mut accounts = self.load_accounts().await?;
        let Some(account) = accounts.iter_mut().find(|a| a.username == username) else {
            return Ok(false);
        };
        account.is_active = true;
        self.save_accounts(&accounts).await?;
        info!(%username, "account reactivated");
        Ok(true)
    }

    pub async fn list_accounts(&self) -> AuthResult<Vec<AccountSummary>> {
        let accounts = self.load_accounts().await?;
        let bindings = self.load_bindings().await?;
        Ok(accounts
            .into_iter()
            .map(|a| {
                let is_bound = bindings
                    .iter()
                    .any(|b| b.username == a.username && b.is_active);
                AccountSummary {
                    username: a.username,
                    description: a.description,
                    created_at: a.created_at,
                    last_login_at: a.last_login_at,
                    login_count: a.login_count,
                    is_active: a.is_active,
                    is_bound,
                }
            })
            .collect())
    }

    pub async fn is_account_bound(&self, username: &str) -> AuthResult<bool> {
        Ok(self
            .load_bindings()
            .await?
            .iter()
            .any(|b| b.username == username && b.is_active))
    }

    /// Fails with `AccountNotFound` unless an active account matches, and with
    /// `AlreadyBound` while an active binding exists.
    pub async fn bind_totp(
        &self,
        username: &str,
        secret: &str,
        device_info: serde_json::Value,
    ) -> AuthResult<TotpBinding> {
        let _guard = self.write.lock().await;
        let accounts = self.load_accounts().await?;
        if !accounts.iter().any(|a| a.username == username && a.is_active) {
            return Err(AuthError::AccountNotFound);
        }
        let mut bindings = self.load_bindings().await?;
        if bindings.iter().any(|b| b.username == username && b.is_active) {
            warn!(%username, "bind refused, already bound");
            return Err(AuthError::AlreadyBound);
        }
        let binding = TotpBinding {
            username: username.to_string(),
            totp_secret: secret.to_string(),
            bound_at: self.clock.now(),
            device_info,
            is_active: true,
            last_used_at: None,
            unbound_at: None,
        };
        bindings.push(binding.clone());
        self.save_bindings(&bindings).await?;
        info!(%username, "authenticator bound");
        Ok(binding)
    }

    /// Soft delete: the record stays with `isActive=false` and `unboundAt`.
    pub async fn unbind_totp(&self, username: &str) -> AuthResult<bool> {
        let _guard = self.write.lock().await;
        let mut bindings = self.load_bindings().await?;
        let Some(binding) = bindings
            .iter_mut()
            .find(|b| b.username == username && b.is_active)
        else {
            return Ok(false);
        };
        binding.is_active = false;
        binding.unbound_at = Some(self.clock.now());
        self.save_bindings(&bindings).await?;
        info!(%username, "authenticator unbound");
        Ok(true)
    }

    /// Secret of the active binding; stamps `lastUsedAt`.
    pub async fn get_totp_secret(&self, username: &str) -> AuthResult<Option<String>> {
        let _guard = self.write.lock().await;
        let mut bindings = self.load_bindings().await?;
        let Some(binding) = bindings
            .iter_mut()
            .find(|b| b.username == username && b.is_active)
        else {
            return Ok(None);
        };
        binding.last_used_at = Some(self.clock.now());
        let secret = binding.totp_secret.clone();
        self.save_bindings(&bindings).await?;
        Ok(Some(secret))
    }

    /// Active bindings, newest first, without secrets.
    pub async fn binding_records(&self) -> AuthResult<Vec<BindingRecord>> {
        let mut records: Vec<BindingRecord> = self
            .load_bindings()
            .await?
            .into_iter()
            .filter(|b| b.is_active)
            .map(|b| BindingRecord {
                username: b.username,
                bound_at: b.bound_at,
                last_used_at: b.last_used_at,
                device_info: b.device_info,
            })
            .collect();
        records.sort_by(|a, b| b.bound_at.cmp(&a.bound_at));
        Ok(records)
    }

    pub async fn statistics(&self) -> AuthResult<Statistics> {
        let accounts = self.load_accounts().await?;
        let bindings = self.load_bindings().await?;
        let one_day_ago = self.clock.now() - Duration::hours(24);

        let total_accounts = accounts.len();
        let active_accounts = accounts.iter().filter(|a| a.is_active).count();
        let bound_accounts = bindings.iter().filter(|b| b.is_active).count();
        let recent_logins = accounts
            .iter()
            .filter(|a| a.last_login_at.is_some_and(|t| t > one_day_ago))
            .count();
        let binding_rate = if active_accounts > 0 {
            (bound_accounts as f64 / active_accounts as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Ok(Statistics {
            total_accounts,
            active_accounts,
            bound_accounts,
            recent_logins,
            binding_rate,
        })
    }

    pub async fn export_data(&self) -> AuthResult<ExportDocument> {
        let accounts = self
            .load_accounts()
            .await?
            .into_iter()
            .map(|a| Account {
                password: REDACTED.to_string(),
                ..a
            })
            .collect();
        let bindings = self
            .load_bindings()
            .await?
            .into_iter()
            .map(|b| TotpBinding {
                totp_secret: REDACTED.to_string(),
                ..b
            })
            .collect();
        Ok(ExportDocument {
            accounts,
            bindings,
            exported_at: self.clock.now(),
        })
    }

    /// Drops every account and binding.
    pub async fn clear_all_data(&self) -> AuthResult<()> {
        let _guard = self.write.lock().await;
        self.kv.remove(ACCOUNTS_KEY).await?;
        self.kv.remove(BINDINGS_KEY).await?;
        warn!("all accounts and bindings cleared");
        Ok(())
    }
}

/// Secret provider reading the active binding of one account.
pub struct AccountSecret<'a> {
    store: &'a CredentialStore,
    username: &'a str,
}

impl<'a> AccountSecret<'a> {
    pub fn new(store: &'a CredentialStore, username: &'a str) -> Self {
        Self { store, username }
    }
}

impl SecretProvider for AccountSecret<'_> {
    fn secret(&self) -> BoxFuture<'_, AuthResult<Option<String>>> {
        Box::pin(self.store.get_totp_secret(self.username))
    }
}
