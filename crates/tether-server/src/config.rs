//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the bridge can start with zero
//! configuration for local development.

use std::path::PathBuf;
use std::time::Duration;

use tether_shared::constants::{DEFAULT_KICK_DELAY_SECS, DEFAULT_REMINDER_INTERVAL_SECS};
use tether_shared::RoleId;

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Whether join-time admission enforcement runs at all.
    /// Env: `ADMISSION_ENABLED` (true/false)
    /// Default: `true`
    pub admission_enabled: bool,

    /// Whether unlinked players are movement-restricted while pending.
    /// Env: `MOVE_RESTRICTION` (true/false)
    /// Default: `false`
    pub movement_restriction: bool,

    /// Whether unlinked players are evicted when the deadline elapses.
    /// Env: `DEADLINE_KICK` (true/false)
    /// Default: `true`
    pub deadline_kick: bool,

    /// Deadline before an unlinked session is evicted.
    /// Env: `KICK_DELAY_SECS`
    /// Default: 10
    pub kick_delay: Duration,

    /// Whether the periodic banner reminder runs for pending players.
    /// Env: `REMINDERS_ENABLED` (true/false)
    /// Default: `true`
    pub reminders_enabled: bool,

    /// Interval between link reminders.
    /// Env: `REMINDER_INTERVAL_SECS`
    /// Default: 30
    pub reminder_interval: Duration,

    /// Name of the chat channel where codes are redeemed.
    /// Env: `LINK_CHANNEL`
    /// Default: `"link-requests"`
    pub link_channel: String,

    /// Guild the bridge operates in (role queries).
    /// Env: `GUILD_ID`
    /// Default: empty
    pub guild: String,

    /// Role required to issue admin commands from the chat side.
    /// Env: `ADMIN_ROLE_ID`
    /// Default: none (chat-side admin commands disabled).
    pub admin_role: Option<RoleId>,

    /// Whether code redemption is accepted at all.
    /// Env: `CODE_BINDING_ENABLED` (true/false)
    /// Default: `true`
    pub code_binding_enabled: bool,

    /// Explicit store path. Env: `STORE_PATH`. Default: platform data dir.
    pub store_path: Option<PathBuf>,

    // -- Message templates. Placeholders: {player}, {code}, {channel}, {seconds}. --
    /// Chat lines sent to an unlinked player on join.
    pub prompt_template: Vec<String>,
    /// Message shown when the deadline kick fires.
    pub kick_template: String,
    /// In-game lines sent after a successful bind.
    pub success_template: Vec<String>,
    /// Text of the rich card replied to a successful redemption.
    pub success_card_template: String,
    /// Banner shown to pending players.
    pub banner_title: String,
    pub banner_subtitle: String,
    pub banner_fade_in: u32,
    pub banner_stay: u32,
    pub banner_fade_out: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            admission_enabled: true,
            movement_restriction: false,
            deadline_kick: true,
            kick_delay: Duration::from_secs(DEFAULT_KICK_DELAY_SECS),
            reminders_enabled: true,
            reminder_interval: Duration::from_secs(DEFAULT_REMINDER_INTERVAL_SECS),
            link_channel: "link-requests".to_string(),
            guild: String::new(),
            admin_role: None,
            code_binding_enabled: true,
            store_path: None,
            prompt_template: vec![
                "Your account is not linked yet.".to_string(),
                "Post the code {code} in the {channel} channel within {seconds} seconds."
                    .to_string(),
            ],
            kick_template:
                "You were removed because your account is not linked. Your code: {code}. \
                 Post it in the {channel} channel and rejoin."
                    .to_string(),
            success_template: vec!["Your account is now linked. Welcome, {player}!".to_string()],
            success_card_template: "Account {player} linked successfully.".to_string(),
            banner_title: "Link your account!".to_string(),
            banner_subtitle: "Your code: {code}".to_string(),
            banner_fade_in: 20,
            banner_stay: 100,
            banner_fade_out: 20,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ADMISSION_ENABLED") {
            config.admission_enabled = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("MOVE_RESTRICTION") {
            config.movement_restriction = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("DEADLINE_KICK") {
            config.deadline_kick = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("KICK_DELAY_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.kick_delay = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %val, "Invalid KICK_DELAY_SECS, using default"),
            }
        }

        if let Ok(val) = std::env::var("REMINDERS_ENABLED") {
            config.reminders_enabled = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("REMINDER_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.reminder_interval = Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %val, "Invalid REMINDER_INTERVAL_SECS, using default")
                }
            }
        }

        if let Ok(name) = std::env::var("LINK_CHANNEL") {
            if !name.is_empty() {
                config.link_channel = name;
            }
        }

        if let Ok(guild) = std::env::var("GUILD_ID") {
            config.guild = guild;
        }

        if let Ok(val) = std::env::var("ADMIN_ROLE_ID") {
            match val.parse::<u64>() {
                Ok(id) => config.admin_role = Some(RoleId(id)),
                Err(_) => tracing::warn!(value = %val, "Invalid ADMIN_ROLE_ID, using default"),
            }
        }

        if let Ok(val) = std::env::var("CODE_BINDING_ENABLED") {
            config.code_binding_enabled = parse_bool(&val);
        }

        if let Ok(path) = std::env::var("STORE_PATH") {
            if !path.is_empty() {
                config.store_path = Some(PathBuf::from(path));
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_bool(val: &str) -> bool {
    val != "false" && val != "0"
}
