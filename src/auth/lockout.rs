// auth/lockout.rs
// Pooled failed-attempt counter with a deadline-based lockout window.

use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Mutex};
use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct AttemptGuard {
    max_attempts: u32,
    lockout: Duration,
    attempts: u32,
    locked_until: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

impl AttemptGuard {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout,
            attempts: 0,
            locked_until: None,
            last_failure: None,
        }
    }

    /// Rejects while locked. Once `now` reaches the deadline the counter is
    /// cleared and submissions are accepted again.
    pub fn check(&mut self, now: DateTime<Utc>) -> AuthResult<()> {
        match self.locked_until {
            Some(until) if now < until => Err(AuthError::LockedOut {
                remaining_seconds: (until - now).num_seconds().max(1),
            }),
            Some(_) => {
                self.attempts = 0;
                self.locked_until = None;
                info!("lockout window elapsed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Counts one failure and returns the attempts left before lockout.
    pub fn record_failure(&mut self, now: DateTime<Utc>) -> u32 {
        self.attempts += 1;
        self.last_failure = Some(now);
        if self.attempts >= self.max_attempts {
            self.locked_until = Some(now + self.lockout);
            warn!(
                attempts = self.attempts,
                lockout_seconds = self.lockout.num_seconds(),
                "too many failed attempts, locking"
            );
            return 0;
        }
        self.max_attempts - self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        self.locked_until
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Not locked, and no failure within the last lockout window.
    pub fn is_idle(&self, now: DateTime<Utc>) -> bool {
        !self.is_locked(now) && self.last_failure.is_none_or(|at| now - at >= self.lockout)
    }
}

impl Default for AttemptGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::minutes(5))
    }
}

/// Attempt guards keyed by username and shared by every login flow of the
/// process, so a client cannot reset its counter by starting a new flow.
pub struct AttemptLedger {
    max_attempts: u32,
    lockout: Duration,
    guards: Mutex<HashMap<String, AttemptGuard>>,
}

impl AttemptLedger {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            max_attempts,
            lockout,
            guards: Mutex::new(HashMap::new()),
        }
    }

    fn with_guard<T>(&self, key: &str, f: impl FnOnce(&mut AttemptGuard) -> T) -> T {
        let mut guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        let guard = guards
            .entry(key.to_string())
            .or_insert_with(|| AttemptGuard::new(self.max_attempts, self.lockout));
        f(guard)
    }

    fn read<T>(&self, key: &str, f: impl FnOnce(&AttemptGuard) -> T, absent: T) -> T {
        let guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        guards.get(key).map(f).unwrap_or(absent)
    }

    pub fn check(&self, key: &str, now: DateTime<Utc>) -> AuthResult<()> {
        let mut guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        match guards.get_mut(key) {
            Some(guard) => guard.check(now),
            None => Ok(()),
        }
    }

    pub fn record_failure(&self, key: &str, now: DateTime<Utc>) -> u32 {
        self.with_guard(key, |guard| guard.record_failure(now))
    }

    pub fn remaining_attempts(&self, key: &str) -> u32 {
        self.read(key, AttemptGuard::remaining_attempts, self.max_attempts.max(1))
    }

    pub fn locked_until(&self, key: &str) -> Option<DateTime<Utc>> {
        self.read(key, AttemptGuard::locked_until, None)
    }

    pub fn is_locked(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.read(key, |guard| guard.is_locked(now), false)
    }

    /// Drops idle guards. A partial count older than one lockout window is
    /// forgotten with them.
    pub fn purge_idle(&self, now: DateTime<Utc>) -> usize {
        let mut guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        let before = guards.len();
        guards.retain(|_, guard| !guard.is_idle(now));
        before - guards.len()
    }

    pub fn len(&self) -> usize {
        self.guards.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn counts_down_then_locks() {
        let mut guard = AttemptGuard::default();
        for expected in [4, 3, 2, 1] {
            guard.check(at(0)).unwrap();
            assert_eq!(guard.record_failure(at(0)), expected);
        }
        assert_eq!(guard.record_failure(at(0)), 0);
        assert!(guard.is_locked(at(1)));
        let err = guard.check(at(60)).unwrap_err();
        assert!(matches!(err, AuthError::LockedOut { remaining_seconds: 240 }));
    }

    #[test]
    fn lock_releases_at_deadline() {
        let mut guard = AttemptGuard::new(2, Duration::seconds(30));
        guard.record_failure(at(100));
        guard.record_failure(at(100));
        assert!(guard.check(at(129)).is_err());
        guard.check(at(130)).unwrap();
        assert_eq!(guard.attempts(), 0);
        assert_eq!(guard.remaining_attempts(), 2);
        assert!(guard.locked_until().is_none());
    }

    #[test]
    fn ledger_counts_per_username() {
        let ledger = AttemptLedger::new(2, Duration::seconds(60));
        assert_eq!(ledger.record_failure("YS100000A", at(0)), 1);
        assert_eq!(ledger.record_failure("FC200000B", at(0)), 1);
        assert_eq!(ledger.record_failure("YS100000A", at(0)), 0);

        assert!(ledger.check("YS100000A", at(10)).is_err());
        assert!(ledger.is_locked("YS100000A", at(10)));
        ledger.check("FC200000B", at(10)).unwrap();
        ledger.check("unknown", at(10)).unwrap();
        assert_eq!(ledger.remaining_attempts("unknown"), 2);
        assert_eq!(ledger.locked_until("YS100000A"), Some(at(60)));
    }

    #[test]
    fn ledger_forgets_idle_guards_but_keeps_locked_ones() {
        let ledger = AttemptLedger::new(2, Duration::seconds(60));
        ledger.record_failure("locked", at(30));
        ledger.record_failure("locked", at(30));
        ledger.record_failure("partial", at(0));

        assert_eq!(ledger.purge_idle(at(59)), 0);
        assert_eq!(ledger.purge_idle(at(60)), 1);
        assert!(ledger.is_locked("locked", at(60)));
        assert_eq!(ledger.purge_idle(at(90)), 1);
        assert!(ledger.is_empty());
    }
}
