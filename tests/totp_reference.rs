// Cross-checks the in-house RFC 6238 engine against the totp-rs crate.

use totp_rs::{Algorithm, TOTP};

use factorydash::totp::{TotpSettings, TotpVerifier, base32, uri};

const TIMES: [u64; 6] = [
    59,
    1_111_111_109,
    1_234_567_890,
    1_700_000_000,
    2_000_000_000,
    20_000_000_000,
];

fn reference(secret: &str) -> TOTP {
    let bytes = data_encoding::BASE32_NOPAD
        .decode(secret.as_bytes())
        .expect("generated secrets are canonical base32");
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        bytes,
        Some("Factory Monitor".to_string()),
        "Operations Center".to_string(),
    )
    .expect("160-bit secret is accepted")
}

#[test]
fn codes_match_totp_rs_for_generated_secrets() {
    let verifier = TotpVerifier::default();
    for _ in 0..8 {
        let secret = base32::generate_secret();
        let totp = reference(&secret);
        for t in TIMES {
            let ours = verifier.current_code(&secret, t).unwrap();
            assert_eq!(ours, totp.generate(t), "secret {secret} at t={t}");
            assert!(totp.check(&ours, t));
        }
    }
}

#[test]
fn drift_window_matches_totp_rs_skew() {
    let verifier = TotpVerifier::new(TotpSettings::default());
    let secret = base32::generate_secret();
    let totp = reference(&secret);
    let t = 1_700_000_015;
    for offset in [-90i64, -61, -30, 0, 30, 60] {
        let code = totp.generate((t as i64 + offset) as u64);
        assert_eq!(
            verifier.verify(&secret, &code, t).unwrap(),
            totp.check(&code, t),
            "offset {offset}"
        );
    }
}

#[test]
fn enrollment_uri_carries_the_same_secret() {
    let secret = base32::generate_secret();
    let ours = uri::otpauth_uri("Factory Monitor", "Operations Center", &secret);
    let parsed = TOTP::from_url(&ours).expect("totp-rs parses our otpauth uri");
    assert_eq!(parsed.get_secret_base32(), secret);
    assert_eq!(parsed.issuer.as_deref(), Some("Factory Monitor"));
    assert_eq!(parsed.account_name, "Operations Center");
}
