//! Channel-based verification-code redemption.
//!
//! Consumes inbound gateway events: a message in the configured link
//! channel is treated as a code attempt. Unknown and expired codes get the
//! same reply, so the channel cannot be used to probe which codes exist.
//! Private messages are part of the inbound surface but deliberately inert
//! here; channel redemption is the supported path.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tether_gateway::{ChatGateway, InboundEvent};
use tether_link::LinkService;
use tether_shared::{ChannelId, ChatProfile};

use crate::session::SessionRegistry;

const INVALID_CODE_TEXT: &str = "That is not a valid verification code.";
const ALREADY_LINKED_TEXT: &str = "This chat account is already linked to a player.";
const DISABLED_TEXT: &str = "Code binding is not enabled on this server.";
const INTERNAL_ERROR_TEXT: &str = "Something went wrong, please contact an admin.";

#[derive(Debug, Clone)]
pub struct RedemptionConfig {
    pub enabled: bool,
    pub channel_name: String,
    pub success_card_template: String,
    pub success_template: Vec<String>,
}

impl From<&crate::config::ServerConfig> for RedemptionConfig {
    fn from(cfg: &crate::config::ServerConfig) -> Self {
        Self {
            enabled: cfg.code_binding_enabled,
            channel_name: cfg.link_channel.clone(),
            success_card_template: cfg.success_card_template.clone(),
            success_template: cfg.success_template.clone(),
        }
    }
}

pub struct RedemptionHandler {
    cfg: RedemptionConfig,
    service: Arc<LinkService>,
    gateway: Arc<dyn ChatGateway>,
    sessions: Arc<SessionRegistry>,
    /// Resolved once at startup; `None` when the gateway never connected,
    /// in which case redemption is simply unavailable while the rest of
    /// the admission machinery keeps running.
    link_channel: Option<ChannelId>,
}

impl RedemptionHandler {
    pub async fn new(
        cfg: RedemptionConfig,
        service: Arc<LinkService>,
        gateway: Arc<dyn ChatGateway>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        let link_channel = if gateway.is_invalid() {
            warn!("chat gateway unavailable, channel redemption disabled");
            None
        } else {
            let resolved = gateway.resolve_channel(&cfg.channel_name).await;
            if resolved.is_none() {
                warn!(channel = %cfg.channel_name, "link channel not found on the platform");
            }
            resolved
        };

        Self {
            cfg,
            service,
            gateway,
            sessions,
            link_channel,
        }
    }

    /// Drain inbound events until the gateway side closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundEvent>) {
        info!("redemption handler started");
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!("redemption handler stopped, inbound channel closed");
    }

    pub async fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::PrivateMessage { sender, .. } => {
                // Reserved path: redemption is channel-only.
                debug!(sender = %sender.id, "ignoring private message");
            }
            InboundEvent::ChannelMessage {
                message_id,
                channel,
                sender,
                content,
            } => {
                let Some(link_channel) = &self.link_channel else {
                    return;
                };
                if &channel != link_channel {
                    return;
                }
                self.redeem(&message_id, link_channel, &sender, content.trim())
                    .await;
            }
        }
    }

    async fn redeem(
        &self,
        message_id: &str,
        channel: &ChannelId,
        sender: &ChatProfile,
        code: &str,
    ) {
        if !self.cfg.enabled {
            self.gateway
                .send_text(std::slice::from_ref(channel), DISABLED_TEXT)
                .await;
            return;
        }

        let Some(player) = self.service.lookup_code(code).await else {
            debug!(sender = %sender.id, "unknown or expired code");
            self.gateway
                .send_text(std::slice::from_ref(channel), INVALID_CODE_TEXT)
                .await;
            return;
        };

        if self.service.is_linked(&player).await {
            debug!(player = %player, "code target already linked, ignoring");
            return;
        }

        if self.service.chat_user_is_linked(&sender.id).await {
            info!(sender = %sender.id, "chat account already linked, refusing");
            self.gateway
                .send_text(std::slice::from_ref(channel), ALREADY_LINKED_TEXT)
                .await;
            return;
        }

        match self.service.link(&player, sender).await {
            Ok(record) => {
                info!(player = %player, chat_user = %sender.id, "code redeemed");

                let card = self.success_card(&player);
                self.gateway.reply(message_id, channel, &card).await;

                if let Some(session) = self.sessions.get(&player).await {
                    let lines: Vec<String> = self
                        .cfg
                        .success_template
                        .iter()
                        .map(|t| {
                            t.replace("{player}", &player).replace(
                                "{nickname}",
                                record.nickname.as_deref().unwrap_or(&player),
                            )
                        })
                        .collect();
                    session.send_message(&lines).await;
                } else {
                    debug!(player = %player, "player offline, skipping in-game notice");
                }
            }
            Err(e) if e.is_conflict() => {
                // A concurrent bind won; from here it looks the same as an
                // up-front conflict.
                info!(player = %player, error = %e, "bind lost to a concurrent link");
                self.gateway
                    .send_text(std::slice::from_ref(channel), ALREADY_LINKED_TEXT)
                    .await;
            }
            Err(e) => {
                warn!(player = %player, error = %e, "bind failed");
                self.gateway
                    .send_text(std::slice::from_ref(channel), INTERNAL_ERROR_TEXT)
                    .await;
            }
        }
    }

    fn success_card(&self, player: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "card",
            "theme": "success",
            "text": self.cfg.success_card_template.replace("{player}", player),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::FakeSession;
    use std::sync::Mutex as StdMutex;
    use tether_gateway::{LoopbackGateway, OutboundPayload};
    use tether_link::{IdentityResolver, LinkRepository};
    use tether_shared::{ChatUserId, StableId};
    use tether_store::Database;

    struct Fixture {
        handler: Arc<RedemptionHandler>,
        gateway: Arc<LoopbackGateway>,
        service: Arc<LinkService>,
        sessions: Arc<SessionRegistry>,
    }

    async fn fixture(enabled: bool) -> Fixture {
        let db = Arc::new(StdMutex::new(Database::open_in_memory().unwrap()));
        let sessions = Arc::new(SessionRegistry::new());
        let repo = Arc::new(LinkRepository::new(
            db,
            sessions.resolver() as Arc<dyn IdentityResolver>,
        ));
        let service = Arc::new(LinkService::new(repo));

        let gateway = Arc::new(
            LoopbackGateway::with_channels(vec![(
                "link-requests".to_string(),
                ChannelId("chan-1".to_string()),
            )])
            .await,
        );
        gateway.connect().await.unwrap();

        let cfg = RedemptionConfig {
            enabled,
            channel_name: "link-requests".to_string(),
            success_card_template: "Account {player} linked successfully.".to_string(),
            success_template: vec!["Linked! Welcome, {player}.".to_string()],
        };

        let handler = Arc::new(
            RedemptionHandler::new(
                cfg,
                Arc::clone(&service),
                gateway.clone() as Arc<dyn ChatGateway>,
                Arc::clone(&sessions),
            )
            .await,
        );

        Fixture {
            handler,
            gateway,
            service,
            sessions,
        }
    }

    fn channel_message(code: &str, sender: &str) -> InboundEvent {
        InboundEvent::ChannelMessage {
            message_id: "m1".to_string(),
            channel: ChannelId("chan-1".to_string()),
            sender: ChatProfile::bare(ChatUserId::from(sender)),
            content: code.to_string(),
        }
    }

    #[tokio::test]
    async fn valid_code_links_and_replies() {
        let fx = fixture(true).await;
        let session = FakeSession::new("Alice");
        fx.sessions
            .register(session.clone() as Arc<dyn crate::session::SessionHandle>, StableId::new())
            .await;

        let code = fx.service.build_verify_code("Alice").await.unwrap();
        fx.handler.handle(channel_message(&code, "chat-1")).await;

        assert!(fx.service.is_linked("Alice").await);

        // Card reply attached to the source message.
        let sent = fx.gateway.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_to.as_deref(), Some("m1"));
        assert!(matches!(sent[0].payload, OutboundPayload::Rich(_)));

        // In-game notice reached the online session.
        let messages = session.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0][0].contains("Alice"));
    }

    #[tokio::test]
    async fn unknown_code_never_creates_a_link() {
        let fx = fixture(true).await;
        let session = FakeSession::new("Alice");
        fx.sessions
            .register(session as Arc<dyn crate::session::SessionHandle>, StableId::new())
            .await;

        fx.handler.handle(channel_message("AAAAAA", "chat-1")).await;

        assert!(!fx.service.is_linked("Alice").await);
        let sent = fx.gateway.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].payload,
            OutboundPayload::Text(INVALID_CODE_TEXT.to_string())
        );
    }

    #[tokio::test]
    async fn other_channels_are_ignored() {
        let fx = fixture(true).await;
        let session = FakeSession::new("Alice");
        fx.sessions
            .register(session as Arc<dyn crate::session::SessionHandle>, StableId::new())
            .await;
        let code = fx.service.build_verify_code("Alice").await.unwrap();

        fx.handler
            .handle(InboundEvent::ChannelMessage {
                message_id: "m1".to_string(),
                channel: ChannelId("elsewhere".to_string()),
                sender: ChatProfile::bare(ChatUserId::from("chat-1")),
                content: code,
            })
            .await;

        assert!(!fx.service.is_linked("Alice").await);
        assert!(fx.gateway.sent().await.is_empty());
    }

    #[tokio::test]
    async fn private_messages_are_inert() {
        let fx = fixture(true).await;
        let session = FakeSession::new("Alice");
        fx.sessions
            .register(session as Arc<dyn crate::session::SessionHandle>, StableId::new())
            .await;
        let code = fx.service.build_verify_code("Alice").await.unwrap();

        fx.handler
            .handle(InboundEvent::PrivateMessage {
                message_id: "m1".to_string(),
                sender: ChatProfile::bare(ChatUserId::from("chat-1")),
                content: code,
            })
            .await;

        assert!(!fx.service.is_linked("Alice").await);
        assert!(fx.gateway.sent().await.is_empty());
    }

    #[tokio::test]
    async fn linked_chat_account_is_refused() {
        let fx = fixture(true).await;
        let alice = FakeSession::new("Alice");
        let bob = FakeSession::new("Bob");
        fx.sessions
            .register(alice as Arc<dyn crate::session::SessionHandle>, StableId::new())
            .await;
        fx.sessions
            .register(bob as Arc<dyn crate::session::SessionHandle>, StableId::new())
            .await;

        let code = fx.service.build_verify_code("Alice").await.unwrap();
        fx.handler.handle(channel_message(&code, "chat-1")).await;
        assert!(fx.service.is_linked("Alice").await);

        // The same chat account tries to claim a second player.
        let code = fx.service.build_verify_code("Bob").await.unwrap();
        fx.handler.handle(channel_message(&code, "chat-1")).await;

        assert!(!fx.service.is_linked("Bob").await);
        let sent = fx.gateway.sent().await;
        assert_eq!(
            sent.last().unwrap().payload,
            OutboundPayload::Text(ALREADY_LINKED_TEXT.to_string())
        );
    }

    #[tokio::test]
    async fn disabled_binding_reports_and_refuses() {
        let fx = fixture(false).await;
        let session = FakeSession::new("Alice");
        fx.sessions
            .register(session as Arc<dyn crate::session::SessionHandle>, StableId::new())
            .await;
        let code = fx.service.build_verify_code("Alice").await.unwrap();

        fx.handler.handle(channel_message(&code, "chat-1")).await;

        assert!(!fx.service.is_linked("Alice").await);
        let sent = fx.gateway.sent().await;
        assert_eq!(
            sent[0].payload,
            OutboundPayload::Text(DISABLED_TEXT.to_string())
        );
    }

    #[tokio::test]
    async fn run_loop_processes_injected_events() {
        let fx = fixture(true).await;
        let session = FakeSession::new("Alice");
        fx.sessions
            .register(session as Arc<dyn crate::session::SessionHandle>, StableId::new())
            .await;
        let code = fx.service.build_verify_code("Alice").await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        fx.gateway.register_inbound(tx).await;
        let loop_handle = tokio::spawn(Arc::clone(&fx.handler).run(rx));

        fx.gateway.inject(channel_message(&code, "chat-1")).await;

        // The loop runs concurrently; wait for the bind to land.
        for _ in 0..100 {
            if fx.service.is_linked("Alice").await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(fx.service.is_linked("Alice").await);

        fx.gateway.unregister_all().await;
        loop_handle.abort();
    }
}
