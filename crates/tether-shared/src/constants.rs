/// Application name
pub const APP_NAME: &str = "Tether";

/// Verification code length in characters
pub const CODE_LENGTH: usize = 6;

/// Verification code time-to-live in seconds (5 minutes)
pub const CODE_TTL_SECS: u64 = 5 * 60;

/// Maximum number of live verification codes
pub const CODE_CACHE_MAX: usize = 500;

/// Bounded regenerate attempts when a freshly generated code collides
/// with a live one
pub const CODE_MAX_GENERATION_ATTEMPTS: usize = 8;

/// Link read-through cache time-to-live in seconds (25 minutes)
pub const LINK_CACHE_TTL_SECS: u64 = 25 * 60;

/// Maximum number of cached link records
pub const LINK_CACHE_MAX: usize = 1000;

/// Default deadline before an unlinked session is evicted, in seconds
pub const DEFAULT_KICK_DELAY_SECS: u64 = 10;

/// Default interval between link reminders, in seconds
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 30;
