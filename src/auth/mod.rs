// auth module: lockout bookkeeping and the login state machine.

pub mod lockout;
pub mod machine;

pub use lockout::{AttemptGuard, AttemptLedger};
pub use machine::{AuthMachine, AuthPhase, AuthPolicy, LoginOutcome, is_authenticated};
