// totp/factory.rs
// Process-wide factory secret: created lazily, persisted, replaced on reset.

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::AuthResult,
    state::kv::{KvStore, TOTP_SECRET_KEY, TOTP_SETUP_KEY},
};

use super::{SecretProvider, base32};

pub struct FactorySecret {
    kv: Arc<dyn KvStore>,
    create: tokio::sync::Mutex<()>,
}

impl FactorySecret {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            create: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the stored secret, generating and persisting one on first use.
    pub async fn secret(&self) -> AuthResult<String> {
        let _guard = self.create.lock().await;
        if let Some(secret) = self.kv.get(TOTP_SECRET_KEY).await? {
            return Ok(secret);
        }
        let secret = base32::generate_secret();
        self.kv.set(TOTP_SECRET_KEY, secret.clone()).await?;
        info!("factory TOTP secret generated");
        Ok(secret)
    }

    /// Replaces the secret and clears the setup flag. Authenticator apps
    /// enrolled with the old secret stop producing valid codes.
    pub async fn reset(&self) -> AuthResult<String> {
        {
            let _guard = self.create.lock().await;
            self.kv.remove(TOTP_SETUP_KEY).await?;
            self.kv.remove(TOTP_SECRET_KEY).await?;
        }
        warn!("factory TOTP secret reset");
        self.secret().await
    }

    pub async fn is_setup(&self) -> AuthResult<bool> {
        Ok(self.kv.get(TOTP_SETUP_KEY).await?.as_deref() == Some("true"))
    }

    pub async fn mark_as_setup(&self) -> AuthResult<()> {
        self.kv.set(TOTP_SETUP_KEY, "true".to_string()).await?;
        info!("factory TOTP setup completed");
        Ok(())
    }
}

impl SecretProvider for FactorySecret {
    fn secret(&self) -> BoxFuture<'_, AuthResult<Option<String>>> {
        Box::pin(async move { FactorySecret::secret(self).await.map(Some) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{state::kv::MemoryStore, totp::TotpVerifier};

    fn factory() -> (FactorySecret, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        (FactorySecret::new(kv.clone()), kv)
    }

    #[tokio::test]
    async fn secret_is_created_once_and_reused() {
        let (factory, kv) = factory();
        assert!(kv.get(TOTP_SECRET_KEY).await.unwrap().is_none());
        let first = factory.secret().await.unwrap();
        assert_eq!(first.len(), 32);
        assert_eq!(factory.secret().await.unwrap(), first);
        assert_eq!(kv.get(TOTP_SECRET_KEY).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn reset_invalidates_old_codes() {
        let (factory, _) = factory();
        let verifier = TotpVerifier::default();
        let now = 1_700_000_000;
        let old = factory.secret().await.unwrap();
        let old_code = verifier.current_code(&old, now).unwrap();

        let fresh = factory.reset().await.unwrap();
        assert_ne!(old, fresh);
        let fresh_code = verifier.current_code(&fresh, now).unwrap();
        assert!(verifier.verify_with(&factory, &fresh_code, now).await.unwrap());
        if old_code != fresh_code {
            assert!(!verifier.verify_with(&factory, &old_code, now).await.unwrap());
        }
    }

    #[tokio::test]
    async fn setup_flag_round_trip() {
        let (factory, _) = factory();
        assert!(!factory.is_setup().await.unwrap());
        factory.mark_as_setup().await.unwrap();
        assert!(factory.is_setup().await.unwrap());
        let before = factory.secret().await.unwrap();
        let after = factory.reset().await.unwrap();
        assert!(!factory.is_setup().await.unwrap());
        assert_ne!(after, before);
        assert_eq!(factory.secret().await.unwrap(), after);
    }
}
