// error.rs
// Domain errors raised by the credential store and the session machine,
// plus their HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password ({remaining_attempts} attempts left)")]
    InvalidCredentials { remaining_attempts: u32 },

    #[error("invalid authenticator code ({remaining_attempts} attempts left)")]
    InvalidCode { remaining_attempts: u32 },

    #[error("account not found or inactive")]
    AccountNotFound,

    #[error("account is inactive")]
    AccountInactive,

    #[error("account already exists")]
    AccountExists,

    #[error("accounts already exist; first-account setup is closed")]
    SetupExists,

    #[error("account already has an authenticator bound")]
    AlreadyBound,

    #[error("account has no authenticator bound")]
    NotBound,

    #[error("too many failed attempts, locked for {remaining_seconds}s")]
    LockedOut { remaining_seconds: i64 },

    #[error("code must be exactly 6 digits")]
    MalformedCode,

    #[error("no authenticator challenge is pending")]
    NoPendingChallenge,

    #[error("HMAC-SHA1 primitive unavailable")]
    CryptoUnavailable,

    #[error("the signed-in account cannot deactivate itself")]
    SelfDeactivation,

    #[error("test a code against the current secret before completing setup")]
    SetupNotVerified,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials { .. } => "invalid_credentials",
            AuthError::InvalidCode { .. } => "invalid_code",
            AuthError::AccountNotFound => "account_not_found",
            AuthError::AccountInactive => "account_inactive",
            AuthError::AccountExists => "account_exists",
            AuthError::SetupExists => "setup_exists",
            AuthError::AlreadyBound => "already_bound",
            AuthError::NotBound => "not_bound",
            AuthError::LockedOut { .. } => "locked_out",
            AuthError::MalformedCode => "malformed_code",
            AuthError::NoPendingChallenge => "no_pending_challenge",
            AuthError::CryptoUnavailable => "crypto_unavailable",
            AuthError::SelfDeactivation => "self_deactivation",
            AuthError::SetupNotVerified => "setup_not_verified",
            AuthError::Storage(_) => "storage",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials { .. }
            | AuthError::InvalidCode { .. }
            | AuthError::AccountInactive => StatusCode::UNAUTHORIZED,
            AuthError::AccountNotFound => StatusCode::NOT_FOUND,
            AuthError::AccountExists | AuthError::SetupExists | AuthError::AlreadyBound => {
                StatusCode::CONFLICT
            }
            AuthError::NotBound | AuthError::NoPendingChallenge | AuthError::SetupNotVerified => {
                StatusCode::CONFLICT
            }
            AuthError::SelfDeactivation => StatusCode::FORBIDDEN,
            AuthError::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::MalformedCode => StatusCode::BAD_REQUEST,
            AuthError::CryptoUnavailable | AuthError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let mut body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        match &self {
            AuthError::InvalidCredentials { remaining_attempts }
            | AuthError::InvalidCode { remaining_attempts } => {
                body["remaining_attempts"] = (*remaining_attempts).into();
            }
            AuthError::LockedOut { remaining_seconds } => {
                body["remaining_seconds"] = (*remaining_seconds).into();
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}
