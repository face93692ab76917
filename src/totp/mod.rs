// totp module: RFC 6238 code engine, enrollment URIs and the factory secret.

pub mod base32;
pub mod factory;
pub mod hotp;
pub mod qr;
pub mod time_step;
pub mod uri;
pub mod verifier;

pub use factory::FactorySecret;
pub use verifier::{SecretProvider, TotpSettings, TotpVerifier, format_code, normalize_code};
