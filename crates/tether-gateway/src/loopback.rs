//! In-process gateway implementation.
//!
//! Implements the full [`ChatGateway`] contract against in-memory state:
//! a configured name→channel map, recorded outbound traffic, and an
//! injection handle for inbound events. The server wires this in when no
//! platform SDK binding is present, and every gateway-facing test runs
//! against it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use tether_shared::{ChannelId, ChatUserId, RoleId};

use crate::events::InboundEvent;
use crate::gateway::{ChatGateway, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPayload {
    Text(String),
    Rich(serde_json::Value),
}

/// One delivered outbound message, as recorded by the loopback.
#[derive(Debug, Clone)]
pub struct OutboundRecord {
    pub channel: ChannelId,
    pub payload: OutboundPayload,
    pub reply_to: Option<String>,
}

#[derive(Default)]
pub struct LoopbackGateway {
    channels: Mutex<HashMap<String, ChannelId>>,
    connected: AtomicBool,
    invalid: AtomicBool,
    refuse_connect: AtomicBool,
    failing: Mutex<HashSet<ChannelId>>,
    sent: Mutex<Vec<OutboundRecord>>,
    listeners: Mutex<Vec<mpsc::Sender<InboundEvent>>>,
    roles: Mutex<HashMap<(ChatUserId, String), HashSet<RoleId>>>,
}

impl LoopbackGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loopback with a preconfigured channel-name map.
    pub async fn with_channels<I>(channels: I) -> Self
    where
        I: IntoIterator<Item = (String, ChannelId)>,
    {
        let gw = Self::new();
        *gw.channels.lock().await = channels.into_iter().collect();
        gw
    }

    /// Make the next `connect` fail (and the gateway invalid).
    pub fn refuse_connect(&self) {
        self.refuse_connect.store(true, Ordering::SeqCst);
    }

    /// Simulate per-channel delivery failure.
    pub async fn fail_channel(&self, channel: ChannelId) {
        self.failing.lock().await.insert(channel);
    }

    pub async fn grant_roles(&self, user: ChatUserId, guild: &str, roles: HashSet<RoleId>) {
        self.roles.lock().await.insert((user, guild.to_string()), roles);
    }

    /// Deliver an inbound event to every registered sink.
    pub async fn inject(&self, event: InboundEvent) {
        let listeners = self.listeners.lock().await.clone();
        for tx in listeners {
            if tx.send(event.clone()).await.is_err() {
                debug!("inbound sink dropped, skipping");
            }
        }
    }

    /// Snapshot of everything sent so far.
    pub async fn sent(&self) -> Vec<OutboundRecord> {
        self.sent.lock().await.clone()
    }

    async fn deliver(&self, channel: &ChannelId, payload: OutboundPayload, reply_to: Option<String>) {
        if self.is_invalid() {
            warn!(channel = %channel, "gateway invalid, dropping outbound message");
            return;
        }
        if self.failing.lock().await.contains(channel) {
            // Per-channel failure must not abort the rest of the fan-out.
            warn!(channel = %channel, "delivery failed");
            return;
        }
        self.sent.lock().await.push(OutboundRecord {
            channel: channel.clone(),
            payload,
            reply_to,
        });
    }
}

#[async_trait]
impl ChatGateway for LoopbackGateway {
    async fn connect(&self) -> Result<(), GatewayError> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            self.invalid.store(true, Ordering::SeqCst);
            return Err(GatewayError::ConnectFailed(
                "loopback configured to refuse".to_string(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.invalid.store(false, Ordering::SeqCst);
        debug!("loopback gateway connected");
        Ok(())
    }

    fn is_invalid(&self) -> bool {
        self.invalid.load(Ordering::SeqCst)
    }

    async fn resolve_channel(&self, name: &str) -> Option<ChannelId> {
        self.channels.lock().await.get(name).cloned()
    }

    async fn send_text(&self, channels: &[ChannelId], text: &str) {
        for channel in channels {
            self.deliver(channel, OutboundPayload::Text(text.to_string()), None)
                .await;
        }
    }

    async fn send_rich(&self, channels: &[ChannelId], card: &serde_json::Value) {
        for channel in channels {
            self.deliver(channel, OutboundPayload::Rich(card.clone()), None)
                .await;
        }
    }

    async fn reply(&self, message_id: &str, channel: &ChannelId, card: &serde_json::Value) {
        self.deliver(
            channel,
            OutboundPayload::Rich(card.clone()),
            Some(message_id.to_string()),
        )
        .await;
    }

    async fn register_inbound(&self, tx: mpsc::Sender<InboundEvent>) {
        self.listeners.lock().await.push(tx);
    }

    async fn unregister_all(&self) {
        self.listeners.lock().await.clear();
    }

    async fn roles_of(&self, user: &ChatUserId, guild: &str) -> HashSet<RoleId> {
        self.roles
            .lock()
            .await
            .get(&(user.clone(), guild.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    async fn shutdown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.invalid.store(true, Ordering::SeqCst);
        self.unregister_all().await;
    }
}
