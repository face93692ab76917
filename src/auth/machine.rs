// auth/machine.rs
// Login state machine: password -> (authenticator challenge) -> session -> expiry.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    clock::Clock,
    error::{AuthError, AuthResult},
    models::Session,
    state::CredentialStore,
    state::accounts::AccountSecret,
    totp::{TotpVerifier, normalize_code},
};

use super::lockout::{AttemptGuard, AttemptLedger, DEFAULT_MAX_ATTEMPTS};

pub const SESSION_TTL_SECONDS: i64 = 8 * 60 * 60;
pub const LOCKOUT_SECONDS: i64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub max_attempts: u32,
    pub lockout: Duration,
    pub session_ttl: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout: Duration::seconds(LOCKOUT_SECONDS),
            session_ttl: Duration::seconds(SESSION_TTL_SECONDS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthPhase {
    Anonymous,
    PasswordPending,
    TotpPending { username: String },
    Authenticated(Session),
    Expired,
    LoggedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Password accepted; the account has an authenticator bound.
    TotpRequired { username: String },
    Authenticated(Session),
}

/// True iff the session is authenticated and `now` is before its expiry.
/// Callers drop sessions for which this is false.
pub fn is_authenticated(session: &Session, now: DateTime<Utc>) -> bool {
    session.is_valid_at(now)
}

/// Where failures are counted: inside the machine, or in a ledger shared
/// with other machines and keyed by username.
enum Attempts {
    Local(AttemptGuard),
    Shared(Arc<AttemptLedger>),
}

impl Attempts {
    fn check(&mut self, username: &str, now: DateTime<Utc>) -> AuthResult<()> {
        match self {
            Attempts::Local(guard) => guard.check(now),
            Attempts::Shared(ledger) => ledger.check(username, now),
        }
    }

    fn record_failure(&mut self, username: &str, now: DateTime<Utc>) -> u32 {
        match self {
            Attempts::Local(guard) => guard.record_failure(now),
            Attempts::Shared(ledger) => ledger.record_failure(username, now),
        }
    }
}

pub struct AuthMachine {
    store: Arc<CredentialStore>,
    verifier: TotpVerifier,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    attempts: Attempts,
    /// Username of the latest password submission.
    subject: Option<String>,
    phase: AuthPhase,
}

impl AuthMachine {
    pub fn new(
        store: Arc<CredentialStore>,
        verifier: TotpVerifier,
        clock: Arc<dyn Clock>,
        policy: AuthPolicy,
    ) -> Self {
        let guard = AttemptGuard::new(policy.max_attempts, policy.lockout);
        Self::build(store, verifier, clock, policy, Attempts::Local(guard))
    }

    /// Machine whose failures land in `ledger` under the submitted username.
    /// Every machine sharing the ledger sees the same lockout.
    pub fn with_ledger(
        store: Arc<CredentialStore>,
        verifier: TotpVerifier,
        clock: Arc<dyn Clock>,
        policy: AuthPolicy,
        ledger: Arc<AttemptLedger>,
    ) -> Self {
        Self::build(store, verifier, clock, policy, Attempts::Shared(ledger))
    }

    fn build(
        store: Arc<CredentialStore>,
        verifier: TotpVerifier,
        clock: Arc<dyn Clock>,
        policy: AuthPolicy,
        attempts: Attempts,
    ) -> Self {
        Self {
            store,
            verifier,
            clock,
            session_ttl: policy.session_ttl,
            attempts,
            subject: None,
            phase: AuthPhase::Anonymous,
        }
    }

    pub fn phase(&self) -> &AuthPhase {
        &self.phase
    }

    pub fn remaining_attempts(&self) -> u32 {
        match &self.attempts {
            Attempts::Local(guard) => guard.remaining_attempts(),
            Attempts::Shared(ledger) => {
                ledger.remaining_attempts(self.subject.as_deref().unwrap_or_default())
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        let now = self.clock.now();
        match &self.attempts {
            Attempts::Local(guard) => guard.is_locked(now),
            Attempts::Shared(ledger) => {
                ledger.is_locked(self.subject.as_deref().unwrap_or_default(), now)
            }
        }
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        match &self.attempts {
            Attempts::Local(guard) => guard.locked_until(),
            Attempts::Shared(ledger) => {
                ledger.locked_until(self.subject.as_deref().unwrap_or_default())
            }
        }
    }

    pub async fn submit_password(
        &mut self,
        username: &str,
        password: &str,
    ) -> AuthResult<LoginOutcome> {
        let now = self.clock.now();
        self.subject = Some(username.to_string());
        self.attempts.check(username, now)?;
        self.phase = AuthPhase::PasswordPending;

        let valid = match self.store.validate_account(username, password).await {
            Ok(valid) => valid,
            Err(err) => {
                self.phase = AuthPhase::Anonymous;
                return Err(err);
            }
        };
        if !valid {
            self.phase = AuthPhase::Anonymous;
            let remaining_attempts = self.attempts.record_failure(username, now);
            warn!(%username, remaining_attempts, "password rejected");
            return Err(AuthError::InvalidCredentials { remaining_attempts });
        }

        if self.store.is_account_bound(username).await? {
            info!(%username, "password accepted, authenticator required");
            self.phase = AuthPhase::TotpPending {
                username: username.to_string(),
            };
            return Ok(LoginOutcome::TotpRequired {
                username: username.to_string(),
            });
        }
        Ok(LoginOutcome::Authenticated(self.issue(username, now)))
    }

    pub async fn submit_totp(&mut self, code: &str) -> AuthResult<Session> {
        let AuthPhase::TotpPending { username } = &self.phase else {
            return Err(AuthError::NoPendingChallenge);
        };
        let username = username.clone();
        let now = self.clock.now();
        self.attempts.check(&username, now)?;
        let code = normalize_code(code)?;

        let provider = AccountSecret::new(&self.store, &username);
        let matched = match self
            .verifier
            .verify_with(&provider, &code, now.timestamp().max(0) as u64)
            .await
        {
            Ok(matched) => matched,
            Err(AuthError::NotBound) => {
                self.phase = AuthPhase::Anonymous;
                return Err(AuthError::NotBound);
            }
            Err(err) => return Err(err),
        };

        if !matched {
            let remaining_attempts = self.attempts.record_failure(&username, now);
            warn!(%username, remaining_attempts, "authenticator code rejected");
            return Err(AuthError::InvalidCode { remaining_attempts });
        }
        Ok(self.issue(&username, now))
    }

    fn issue(&mut self, username: &str, now: DateTime<Utc>) -> Session {
        let session = Session {
            authenticated: true,
            username: username.to_string(),
            issued_at: now,
            expires_at: now + self.session_ttl,
        };
        info!(%username, expires_at = %session.expires_at, "session issued");
        self.phase = AuthPhase::Authenticated(session.clone());
        session
    }

    /// The live session, if any. An expired one moves the machine to
    /// `Expired` and is discarded.
    pub fn current_session(&mut self) -> Option<&Session> {
        let now = self.clock.now();
        if let AuthPhase::Authenticated(session) = &self.phase {
            if !is_authenticated(session, now) {
                info!(username = %session.username, "session expired");
                self.phase = AuthPhase::Expired;
            }
        }
        match &self.phase {
            AuthPhase::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Drops any session or pending challenge. Safe to call repeatedly.
    pub fn logout(&mut self) {
        if let AuthPhase::Authenticated(session) = &self.phase {
            info!(username = %session.username, "logged out");
        }
        self.phase = AuthPhase::LoggedOut;
    }
}
