// models.rs
// Persisted records (accounts, TOTP bindings), the session record and the
// read models handed to the management pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login account as stored under the `accounts` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: u64,
}

/// Association of a TOTP secret to an account, stored under `bindings`.
/// Unbinding only flips `is_active`; records are purged when the owning
/// account is deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TotpBinding {
    pub username: String,
    pub totp_secret: String,
    pub bound_at: DateTime<Utc>,
    #[serde(default)]
    pub device_info: serde_json::Value,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbound_at: Option<DateTime<Utc>>,
}

/// Authenticated session. Serializes to the browser-session entry
/// `{authenticated, username, loginTime, expires}` with millisecond stamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub authenticated: bool,
    pub username: String,
    #[serde(rename = "loginTime", with = "chrono::serde::ts_milliseconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "expires", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.authenticated && now < self.expires_at
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Account row for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub username: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: u64,
    pub is_active: bool,
    pub is_bound: bool,
}

/// Active binding without its secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRecord {
    pub username: String,
    pub bound_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub device_info: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_accounts: usize,
    pub active_accounts: usize,
    pub bound_accounts: usize,
    pub recent_logins: usize,
    /// Percentage with one decimal, 0 without active accounts.
    pub binding_rate: f64,
}

/// Downloadable snapshot; secrets and passwords are replaced by
/// [`REDACTED`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub accounts: Vec<Account>,
    pub bindings: Vec<TotpBinding>,
    pub exported_at: DateTime<Utc>,
}

pub const REDACTED: &str = "***hidden***";

impl ExportDocument {
    pub fn file_name(&self) -> String {
        format!(
            "factory_accounts_{}.json",
            self.exported_at.timestamp_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_uses_browser_entry_layout() {
        let issued = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let session = Session {
            authenticated: true,
            username: "YS123456A".into(),
            issued_at: issued,
            expires_at: issued + chrono::Duration::hours(8),
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["authenticated"], true);
        assert_eq!(json["username"], "YS123456A");
        assert_eq!(json["loginTime"], 1_700_000_000_000i64);
        assert_eq!(json["expires"], 1_700_028_800_000i64);
        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn account_fields_are_camel_case() {
        let account = Account {
            username: "FC100000B".into(),
            password: "pw".into(),
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            description: "line 3".into(),
            is_active: true,
            last_login_at: None,
            login_count: 0,
        };
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("isActive").is_some());
        assert!(json["lastLoginAt"].is_null());
        assert_eq!(json["loginCount"], 0);
    }

    #[test]
    fn session_validity_is_strictly_before_expiry() {
        let issued = DateTime::from_timestamp(1_000, 0).unwrap();
        let session = Session {
            authenticated: true,
            username: "u".into(),
            issued_at: issued,
            expires_at: issued + chrono::Duration::seconds(10),
        };
        assert!(session.is_valid_at(issued + chrono::Duration::seconds(9)));
        assert!(!session.is_valid_at(issued + chrono::Duration::seconds(10)));
        assert_eq!(session.remaining_seconds(issued + chrono::Duration::seconds(20)), 0);
    }
}
