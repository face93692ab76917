// totp/uri.rs
// otpauth:// enrollment URIs and the external QR renderer link.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use super::{hotp, time_step};

/// Characters left alone by JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const QR_SIZE: &str = "200x200";

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// `otpauth://totp/<issuer>:<account>?secret=..&issuer=..&algorithm=SHA1&digits=6&period=30`
pub fn otpauth_uri(issuer: &str, account: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        encode_component(issuer),
        encode_component(account),
        encode_component(secret),
        encode_component(issuer),
        hotp::DIGITS,
        time_step::PERIOD_SECONDS,
    )
}

/// Link to the external QR renderer with the enrollment URI as payload.
pub fn qr_service_url(service_base: &str, otpauth: &str) -> String {
    let separator = if service_base.contains('?') { '&' } else { '?' };
    format!(
        "{service_base}{separator}size={QR_SIZE}&data={}",
        encode_component(otpauth)
    )
}
