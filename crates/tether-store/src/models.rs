//! Domain model structs persisted in the local SQLite database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tether_shared::{ChatProfile, ChatUserId, StableId};

/// One completed bind between a game account and a chat-platform account.
///
/// At most one record exists per `stable_id` and at most one per
/// `chat_user_id`; both checks happen in the repository's bind critical
/// section, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkRecord {
    /// Rename-independent key of the game account.
    pub stable_id: StableId,
    /// The linked chat-platform account.
    pub chat_user_id: ChatUserId,
    /// Current game display name; repaired when a rename is detected.
    pub player_name: String,
    /// Chat-side display name at bind time (descriptive only).
    pub display_name: Option<String>,
    /// Chat-side avatar URL (descriptive only).
    pub avatar_url: Option<String>,
    /// Whether the chat account was platform-verified at bind time.
    pub verified: bool,
    /// When the bind was completed.
    pub joined_at: DateTime<Utc>,
    /// Chat-side nickname at bind time (descriptive only).
    pub nickname: Option<String>,
}

impl LinkRecord {
    /// Build a fresh record from a resolved game identity and the chat
    /// profile that redeemed the code.
    pub fn from_bind(
        stable_id: StableId,
        player_name: &str,
        profile: &ChatProfile,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stable_id,
            chat_user_id: profile.id.clone(),
            player_name: player_name.to_string(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            verified: profile.verified,
            joined_at,
            nickname: profile.display_name.clone(),
        }
    }
}
