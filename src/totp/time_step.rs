// totp/time_step.rs
// Unix time -> RFC 6238 counter, and the counter's 8-byte wire form.

/// Length of one TOTP window in seconds.
pub const PERIOD_SECONDS: u64 = 30;

/// `floor(now / 30)`.
pub fn time_step(now_seconds: u64) -> u64 {
    now_seconds / PERIOD_SECONDS
}

/// Big-endian 64-bit counter, the HOTP moving factor format.
pub fn to_bytes(time_step: u64) -> [u8; 8] {
    time_step.to_be_bytes()
}

/// Seconds until the current window rolls over, in `[1, 30]`.
pub fn remaining_seconds(now_seconds: u64) -> u64 {
    PERIOD_SECONDS - (now_seconds % PERIOD_SECONDS)
}
