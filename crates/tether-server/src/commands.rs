//! Admin command surface.
//!
//! One parser and dispatcher serves both the server console and the chat
//! side; chat-side issuers must hold the configured admin role. Every
//! outcome class gets its own user-facing text: success, conflict (naming
//! the occupying side), not-found, unresolvable identity and internal
//! error all read differently.

use std::sync::Arc;

use tracing::warn;

use tether_gateway::ChatGateway;
use tether_link::{LinkError, LinkService};
use tether_shared::{ChatProfile, ChatUserId, RoleId};

const USAGE: &str = "commands: bind <player> <chat-id> | unbind player <name> | \
                     unbind chat <id> | whois player <name> | whois chat <id> | status <player>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bind { player: String, chat_user: ChatUserId },
    UnbindPlayer(String),
    UnbindChat(ChatUserId),
    WhoisPlayer(String),
    WhoisChat(ChatUserId),
    Status(String),
}

/// Parse a command line. The error is ready-to-display usage text.
pub fn parse(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["bind", player, chat_id] => Ok(Command::Bind {
            player: (*player).to_string(),
            chat_user: ChatUserId::from(*chat_id),
        }),
        ["unbind", "player", name] => Ok(Command::UnbindPlayer((*name).to_string())),
        ["unbind", "chat", id] => Ok(Command::UnbindChat(ChatUserId::from(*id))),
        ["whois", "player", name] => Ok(Command::WhoisPlayer((*name).to_string())),
        ["whois", "chat", id] => Ok(Command::WhoisChat(ChatUserId::from(*id))),
        ["status", player] => Ok(Command::Status((*player).to_string())),
        [] => Err(USAGE.to_string()),
        _ => Err(format!("unrecognized command. {USAGE}")),
    }
}

pub struct CommandContext {
    service: Arc<LinkService>,
    gateway: Arc<dyn ChatGateway>,
    guild: String,
    admin_role: Option<RoleId>,
}

impl CommandContext {
    pub fn new(
        service: Arc<LinkService>,
        gateway: Arc<dyn ChatGateway>,
        guild: String,
        admin_role: Option<RoleId>,
    ) -> Self {
        Self {
            service,
            gateway,
            guild,
            admin_role,
        }
    }

    /// Console entry point: parse and run, no role gate.
    pub async fn dispatch_line(&self, line: &str) -> String {
        match parse(line) {
            Ok(cmd) => self.dispatch(cmd).await,
            Err(usage) => usage,
        }
    }

    /// Chat-side entry point: the issuer must hold the admin role.
    pub async fn dispatch_chat(&self, issuer: &ChatUserId, line: &str) -> String {
        let Some(required) = self.admin_role else {
            return "admin commands are not enabled from chat".to_string();
        };
        let roles = self.gateway.roles_of(issuer, &self.guild).await;
        if !roles.contains(&required) {
            warn!(issuer = %issuer, "chat admin command refused, missing role");
            return "you do not have permission to do that".to_string();
        }
        self.dispatch_line(line).await
    }

    pub async fn dispatch(&self, cmd: Command) -> String {
        match cmd {
            Command::Bind { player, chat_user } => {
                let profile = ChatProfile::bare(chat_user.clone());
                match self.service.link(&player, &profile).await {
                    Ok(record) => format!(
                        "linked {} ({}) to chat account {}",
                        record.player_name, record.stable_id, record.chat_user_id
                    ),
                    Err(e) => describe_error(e),
                }
            }
            Command::UnbindPlayer(player) => {
                match self.service.unbind_by_player_name(&player).await {
                    Ok(record) => format!(
                        "unlinked {} from chat account {}",
                        record.player_name, record.chat_user_id
                    ),
                    Err(e) => describe_error(e),
                }
            }
            Command::UnbindChat(chat_user) => {
                match self.service.unbind_by_chat_user(&chat_user).await {
                    Ok(record) => format!(
                        "unlinked chat account {} from {}",
                        record.chat_user_id, record.player_name
                    ),
                    Err(e) => describe_error(e),
                }
            }
            Command::WhoisPlayer(player) => {
                match self.service.find_chat_user_by_player_name(&player).await {
                    Ok(Some(chat_user)) => {
                        format!("{player} is linked to chat account {chat_user}")
                    }
                    Ok(None) => format!("{player} is not linked"),
                    Err(e) => describe_error(e),
                }
            }
            Command::WhoisChat(chat_user) => {
                match self.service.find_player_name_by_chat_user(&chat_user).await {
                    Ok(Some(player)) => {
                        format!("chat account {chat_user} is linked to {player}")
                    }
                    Ok(None) => format!("chat account {chat_user} is not linked"),
                    Err(e) => describe_error(e),
                }
            }
            Command::Status(player) => {
                if self.service.is_linked(&player).await {
                    format!("{player} is linked")
                } else {
                    format!("{player} is not linked")
                }
            }
        }
    }
}

fn describe_error(e: LinkError) -> String {
    match e {
        LinkError::NotFound => "not linked".to_string(),
        LinkError::UnresolvedIdentity(name) => {
            format!("unknown player '{name}' (never seen on this server)")
        }
        LinkError::PlayerAlreadyLinked { player, chat_user_id } => {
            format!("conflict: {player} is already linked to chat account {chat_user_id}")
        }
        LinkError::ChatAccountAlreadyLinked { chat_user_id, player } => {
            format!("conflict: chat account {chat_user_id} is already linked to {player}")
        }
        LinkError::InvalidArgument(what) => format!("invalid argument: {what}. {USAGE}"),
        LinkError::Unavailable(reason) => format!("service unavailable: {reason}"),
        LinkError::Internal(detail) => {
            warn!(detail = %detail, "admin command hit an internal error");
            "internal error, check the server log".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use tether_gateway::LoopbackGateway;
    use tether_link::{IdentityResolver, LinkRepository, MemoryResolver};
    use tether_shared::StableId;
    use tether_store::Database;

    async fn context(players: &[(&str, StableId)]) -> (CommandContext, Arc<LoopbackGateway>) {
        let db = Arc::new(StdMutex::new(Database::open_in_memory().unwrap()));
        let resolver = MemoryResolver::new();
        for (name, id) in players {
            resolver.register(name, *id).await;
        }
        let repo = Arc::new(LinkRepository::new(db, resolver as Arc<dyn IdentityResolver>));
        let service = Arc::new(LinkService::new(repo));
        let gateway = Arc::new(LoopbackGateway::new());
        gateway.connect().await.unwrap();
        let ctx = CommandContext::new(
            service,
            gateway.clone() as Arc<dyn ChatGateway>,
            "guild-1".to_string(),
            Some(RoleId(7)),
        );
        (ctx, gateway)
    }

    #[test]
    fn parse_recognizes_the_grammar() {
        assert_eq!(
            parse("bind Alice chat-1").unwrap(),
            Command::Bind {
                player: "Alice".to_string(),
                chat_user: ChatUserId::from("chat-1"),
            }
        );
        assert_eq!(
            parse("unbind player Alice").unwrap(),
            Command::UnbindPlayer("Alice".to_string())
        );
        assert_eq!(
            parse("whois chat chat-1").unwrap(),
            Command::WhoisChat(ChatUserId::from("chat-1"))
        );
        assert!(parse("").unwrap_err().contains("commands:"));
        assert!(parse("frobnicate").unwrap_err().contains("unrecognized"));
    }

    #[tokio::test]
    async fn outcomes_read_distinctly() {
        let alice = StableId::new();
        let bob = StableId::new();
        let (ctx, _gw) = context(&[("Alice", alice), ("Bob", bob)]).await;

        let out = ctx.dispatch_line("bind Alice chat-1").await;
        assert!(out.contains("linked Alice"));

        // Conflict, game side.
        let out = ctx.dispatch_line("bind Alice chat-2").await;
        assert!(out.contains("conflict"));
        assert!(out.contains("chat-1"));

        // Conflict, chat side.
        let out = ctx.dispatch_line("bind Bob chat-1").await;
        assert!(out.contains("conflict"));
        assert!(out.contains("Alice"));

        // Not-found.
        let out = ctx.dispatch_line("unbind chat chat-9").await;
        assert_eq!(out, "not linked");

        // Unresolvable identity.
        let out = ctx.dispatch_line("bind Ghost chat-3").await;
        assert!(out.contains("unknown player 'Ghost'"));
    }

    #[tokio::test]
    async fn whois_and_status_round_trip() {
        let alice = StableId::new();
        let (ctx, _gw) = context(&[("Alice", alice)]).await;

        assert_eq!(ctx.dispatch_line("status Alice").await, "Alice is not linked");
        ctx.dispatch_line("bind Alice chat-1").await;

        assert!(ctx
            .dispatch_line("whois player Alice")
            .await
            .contains("chat-1"));
        assert!(ctx
            .dispatch_line("whois chat chat-1")
            .await
            .contains("Alice"));
        assert_eq!(ctx.dispatch_line("status Alice").await, "Alice is linked");

        let out = ctx.dispatch_line("unbind player Alice").await;
        assert!(out.contains("unlinked Alice"));
        assert_eq!(ctx.dispatch_line("status Alice").await, "Alice is not linked");
    }

    #[tokio::test]
    async fn chat_issuers_need_the_admin_role() {
        let alice = StableId::new();
        let (ctx, gateway) = context(&[("Alice", alice)]).await;
        let admin = ChatUserId::from("admin-user");
        let pleb = ChatUserId::from("pleb-user");

        let mut roles = HashSet::new();
        roles.insert(RoleId(7));
        gateway.grant_roles(admin.clone(), "guild-1", roles).await;

        let out = ctx.dispatch_chat(&pleb, "bind Alice chat-1").await;
        assert!(out.contains("permission"));

        let out = ctx.dispatch_chat(&admin, "bind Alice chat-1").await;
        assert!(out.contains("linked Alice"));
    }
}
