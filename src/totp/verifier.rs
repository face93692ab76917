// totp/verifier.rs
// RFC 6238 on top of HOTP: current code, drift-tolerant verification and
// secret lookup through an injected provider.

use futures::future::BoxFuture;

use crate::error::{AuthError, AuthResult};

use super::{base32, hotp, time_step, uri};

/// Where a verifier gets the secret it checks against: the factory-wide
/// secret, or the secret bound to one account.
pub trait SecretProvider: Send + Sync {
    fn secret(&self) -> BoxFuture<'_, AuthResult<Option<String>>>;
}

/// Factory defaults for enrollment labels and drift tolerance.
#[derive(Debug, Clone)]
pub struct TotpSettings {
    pub issuer: String,
    pub account_name: String,
    /// Windows accepted on each side of the current one.
    pub skew: u8,
}

impl Default for TotpSettings {
    fn default() -> Self {
        Self {
            issuer: "Factory Monitor".to_string(),
            account_name: "Operations Center".to_string(),
            skew: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TotpVerifier {
    settings: TotpSettings,
}

impl TotpVerifier {
    pub fn new(settings: TotpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TotpSettings {
        &self.settings
    }

    pub fn current_code(&self, secret: &str, now_seconds: u64) -> AuthResult<String> {
        hotp::compute(&base32::decode(secret), time_step::time_step(now_seconds))
    }

    /// Accepts the code of the previous, current or next window (with the
    /// default skew of 1). A mismatch is `Ok(false)`; only a failing HMAC
    /// primitive is an error.
    pub fn verify(&self, secret: &str, submitted: &str, now_seconds: u64) -> AuthResult<bool> {
        let key = base32::decode(secret);
        let skew = self.settings.skew as i64;
        for window in -skew..=skew {
            let shifted = now_seconds as i64 + window * time_step::PERIOD_SECONDS as i64;
            if shifted < 0 {
                continue;
            }
            let expected = hotp::compute(&key, time_step::time_step(shifted as u64))?;
            if expected == submitted {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn verify_with<P>(
        &self,
        provider: &P,
        submitted: &str,
        now_seconds: u64,
    ) -> AuthResult<bool>
    where
        P: SecretProvider + ?Sized,
    {
        let secret = provider.secret().await?.ok_or(AuthError::NotBound)?;
        self.verify(&secret, submitted, now_seconds)
    }

    pub fn remaining_seconds(&self, now_seconds: u64) -> u64 {
        time_step::remaining_seconds(now_seconds)
    }

    /// Enrollment URI; `account` defaults to the factory account label.
    pub fn enrollment_uri(&self, secret: &str, account: Option<&str>) -> String {
        uri::otpauth_uri(
            &self.settings.issuer,
            account.unwrap_or(&self.settings.account_name),
            secret,
        )
    }
}

/// Strips whitespace and requires exactly six ASCII digits.
pub fn normalize_code(input: &str) -> AuthResult<String> {
    let code: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if code.len() != hotp::DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::MalformedCode);
    }
    Ok(code)
}

/// `123456` -> `123 456`.
pub fn format_code(code: &str) -> String {
    if code.len() <= 3 || !code.is_ascii() {
        return code.to_string();
    }
    format!("{} {}", &code[..3], &code[3..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "JBSWY3DPEHPK3PXP";
    const T: u64 = 1_700_000_000;

    struct Fixed(Option<&'static str>);

    impl SecretProvider for Fixed {
        fn secret(&self) -> BoxFuture<'_, AuthResult<Option<String>>> {
            let value = self.0.map(str::to_string);
            Box::pin(async move { Ok(value) })
        }
    }

    #[test]
    fn current_code_is_six_digits() {
        let verifier = TotpVerifier::default();
        for offset in (0..600).step_by(17) {
            let code = verifier.current_code(SECRET, T + offset).unwrap();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn accepts_current_and_adjacent_windows() {
        let verifier = TotpVerifier::default();
        let now = verifier.current_code(SECRET, T).unwrap();
        let prev = verifier.current_code(SECRET, T - 30).unwrap();
        let next = verifier.current_code(SECRET, T + 30).unwrap();
        assert!(verifier.verify(SECRET, &now, T).unwrap());
        assert!(verifier.verify(SECRET, &prev, T).unwrap());
        assert!(verifier.verify(SECRET, &next, T).unwrap());
    }

    #[test]
    fn rejects_codes_two_windows_away() {
        let verifier = TotpVerifier::default();
        let stale = verifier.current_code(SECRET, T - 61).unwrap();
        let early = verifier.current_code(SECRET, T + 61).unwrap();
        assert!(!verifier.verify(SECRET, &stale, T).unwrap());
        assert!(!verifier.verify(SECRET, &early, T).unwrap());
    }

    #[test]
    fn zero_skew_only_accepts_current_window() {
        let verifier = TotpVerifier::new(TotpSettings {
            skew: 0,
            ..TotpSettings::default()
        });
        let prev = verifier.current_code(SECRET, T - 30).unwrap();
        assert!(!verifier.verify(SECRET, &prev, T).unwrap());
    }

    #[test]
    fn verification_near_epoch_does_not_underflow() {
        let verifier = TotpVerifier::default();
        let code = verifier.current_code(SECRET, 5).unwrap();
        assert!(verifier.verify(SECRET, &code, 5).unwrap());
    }

    #[tokio::test]
    async fn provider_without_secret_is_not_bound() {
        let verifier = TotpVerifier::default();
        let err = verifier
            .verify_with(&Fixed(None), "123456", T)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotBound));

        let code = verifier.current_code(SECRET, T).unwrap();
        assert!(verifier.verify_with(&Fixed(Some(SECRET)), &code, T).await.unwrap());
    }

    #[test]
    fn normalizes_and_rejects_codes() {
        assert_eq!(normalize_code("123 456").unwrap(), "123456");
        assert_eq!(normalize_code(" 000000 ").unwrap(), "000000");
        assert!(matches!(normalize_code("12345"), Err(AuthError::MalformedCode)));
        assert!(matches!(normalize_code("12a456"), Err(AuthError::MalformedCode)));
        assert!(matches!(normalize_code("1234567"), Err(AuthError::MalformedCode)));
    }

    #[test]
    fn formats_code_in_two_groups() {
        assert_eq!(format_code("123456"), "123 456");
        assert_eq!(format_code("12"), "12");
    }
}
