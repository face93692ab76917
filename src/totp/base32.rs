// totp/base32.rs
// RFC 4648 Base32 for shared secrets: lenient decoding and secret generation.

use data_encoding::BASE32_NOPAD;
use rand::RngCore;

pub const MIN_SECRET_BYTES: usize = 16; // 128 bits
pub const DEFAULT_SECRET_BYTES: usize = 20; // 160 bits, 32 Base32 chars

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn symbol_value(c: u8) -> Option<u32> {
    let upper = c.to_ascii_uppercase();
    ALPHABET.iter().position(|&a| a == upper).map(|i| i as u32)
}

/// Decodes Base32 case-insensitively. Padding, whitespace and any other
/// character outside the alphabet are skipped; trailing bits that do not
/// fill a byte are dropped.
pub fn decode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for value in text.bytes().filter_map(symbol_value) {
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    out
}

/// Fresh 160-bit secret as 32 Base32 characters.
pub fn generate_secret() -> String {
    generate_secret_n(DEFAULT_SECRET_BYTES)
}

/// Random Base32 (NOPAD) secret of `bytes` length, never below the minimum.
pub fn generate_secret_n(bytes: usize) -> String {
    let n = bytes.max(MIN_SECRET_BYTES);
    let mut buf = vec![0u8; n];
    rand::rng().fill_bytes(&mut buf);
    BASE32_NOPAD.encode(&buf)
}

/// Groups a secret in blocks of four for manual entry: `JBSW Y3DP ...`.
pub fn format_secret(secret: &str) -> String {
    secret
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rfc4648_vectors() {
        assert_eq!(decode("MZXW6YTBOI======"), b"foobar");
        assert_eq!(decode("MZXW6YQ="), b"foob");
        assert_eq!(decode("JBSWY3DPEHPK3PXP"), b"Hello!\xDE\xAD\xBE\xEF");
    }

    #[test]
    fn decoding_is_case_insensitive_and_skips_noise() {
        let strict = decode("JBSWY3DPEHPK3PXP");
        assert_eq!(decode("jbswy3dpehpk3pxp"), strict);
        assert_eq!(decode("JBSW Y3DP-EHPK 3PXP"), strict);
        assert_eq!(decode("JBSW1Y3DP0EHPK83PXP"), strict);
    }

    #[test]
    fn generated_secret_is_32_chars_and_20_bytes() {
        for _ in 0..16 {
            let secret = generate_secret();
            assert_eq!(secret.len(), 32);
            assert!(secret.bytes().all(|c| ALPHABET.contains(&c)));
            assert_eq!(decode(&secret).len(), 20);
        }
    }

    #[test]
    fn generated_secrets_differ() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn short_requests_are_raised_to_minimum() {
        assert_eq!(decode(&generate_secret_n(4)).len(), MIN_SECRET_BYTES);
    }

    #[test]
    fn formats_secret_in_groups_of_four() {
        assert_eq!(format_secret("JBSWY3DPEHPK3PXP"), "JBSW Y3DP EHPK 3PXP");
        assert_eq!(format_secret("ABCDE"), "ABCD E");
    }
}
