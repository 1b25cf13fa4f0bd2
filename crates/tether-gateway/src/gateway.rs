//! The gateway contract.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use tether_shared::{ChannelId, ChatUserId, RoleId};

use crate::events::InboundEvent;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway is not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

/// Façade over the chat-platform SDK.
///
/// Lifecycle: construct, `connect`, then use. A failed connect (or a
/// `shutdown`) flips [`ChatGateway::is_invalid`]; callers are expected to
/// check it and degrade rather than treat sends as reliable. All sends
/// are fire-and-forget: delivery failures are logged per channel and do
/// not abort delivery to the other channels in the same call.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Establish the platform connection.
    async fn connect(&self) -> Result<(), GatewayError>;

    /// True once connect failed or after shutdown.
    fn is_invalid(&self) -> bool;

    /// Resolve a configured channel name to a platform channel reference.
    async fn resolve_channel(&self, name: &str) -> Option<ChannelId>;

    /// Send plain text to each of the given channels.
    async fn send_text(&self, channels: &[ChannelId], text: &str);

    /// Send a rich card component to each of the given channels.
    async fn send_rich(&self, channels: &[ChannelId], card: &serde_json::Value);

    /// Reply to a received message in its channel.
    async fn reply(&self, message_id: &str, channel: &ChannelId, card: &serde_json::Value);

    /// Register a sink for inbound events. Multiple sinks may be live.
    async fn register_inbound(&self, tx: mpsc::Sender<InboundEvent>);

    /// Drop every registered inbound sink.
    async fn unregister_all(&self);

    /// Role ids the user holds in the given guild. Empty on unknown user.
    async fn roles_of(&self, user: &ChatUserId, guild: &str) -> HashSet<RoleId>;

    /// Tear the connection down; the gateway is invalid afterwards.
    async fn shutdown(&self);
}
