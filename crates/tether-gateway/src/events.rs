//! Inbound events delivered by the chat platform.

use tether_shared::{ChannelId, ChatProfile};

#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A message posted in a channel the bot can read.
    ChannelMessage {
        message_id: String,
        channel: ChannelId,
        sender: ChatProfile,
        content: String,
    },

    /// A direct message to the bot. Carried so listeners see the full
    /// inbound surface; the redemption flow deliberately ignores it --
    /// channel-based redemption is the supported path.
    PrivateMessage {
        message_id: String,
        sender: ChatProfile,
        content: String,
    },
}

impl InboundEvent {
    pub fn sender(&self) -> &ChatProfile {
        match self {
            InboundEvent::ChannelMessage { sender, .. } => sender,
            InboundEvent::PrivateMessage { sender, .. } => sender,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            InboundEvent::ChannelMessage { content, .. } => content,
            InboundEvent::PrivateMessage { content, .. } => content,
        }
    }
}
