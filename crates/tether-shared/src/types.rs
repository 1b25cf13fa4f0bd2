use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Stable game identity = rename-independent UUID resolved by the identity
// service. Display names are mutable and never used as a key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StableId(pub Uuid);

impl StableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for StableId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque account identifier on the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChatUserId(pub String);

impl ChatUserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChatUserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Platform channel reference, as resolved from a configured channel name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoleId(pub u64);

/// Descriptive chat-side profile fields carried by inbound events and
/// copied into a link record on bind. None of these are authoritative;
/// the only key on the chat side is [`ChatUserId`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatProfile {
    pub id: ChatUserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub verified: bool,
}

impl ChatProfile {
    /// Bare profile with nothing but the platform id, for callers that
    /// only know the id (admin-driven binds).
    pub fn bare(id: ChatUserId) -> Self {
        Self {
            id,
            display_name: None,
            avatar_url: None,
            verified: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_round_trip() {
        let id = StableId::new();
        let parsed = StableId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn stable_id_rejects_garbage() {
        assert!(StableId::parse("not-a-uuid").is_err());
    }
}
