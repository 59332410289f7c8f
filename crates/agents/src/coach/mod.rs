//! Coach agent: trainee-facing pipelines and reports.

mod detect_inactive;
mod digest;
mod on_attempt_scored;
mod on_user_inactive;
mod send_daily_digest;

pub use detect_inactive::{DetectInactiveUsers, CRON_DETECT_INACTIVE};
pub use digest::generate_trainee_digest;
pub use on_attempt_scored::OnAttemptScored;
pub use on_user_inactive::OnUserInactive;
pub use send_daily_digest::{format_digest_message, SendDailyDigest, CRON_DAILY_DIGEST};
