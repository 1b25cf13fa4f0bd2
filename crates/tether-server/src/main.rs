//! # tether-server
//!
//! Host binary for the game↔chat account-link bridge.
//!
//! This binary provides:
//! - **Link repository** over an embedded SQLite store (bind/unbind/query,
//!   read-through cache, rename reconciliation)
//! - **Verification-code protocol** (issue on join, redeem in a chat
//!   channel)
//! - **Admission enforcement** for unlinked sessions: prompt, periodic
//!   reminders, optional movement restriction and a deadline kick
//! - **Admin commands** from the server console and (role-gated) from chat
//!
//! The game server feeds [`session::SessionEvent`]s through a channel; the
//! chat platform is reached through the [`tether_gateway::ChatGateway`]
//! contract.

mod admission;
mod commands;
mod config;
mod redemption;
mod session;

use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tether_gateway::{ChatGateway, LoopbackGateway};
use tether_link::{IdentityResolver, LinkRepository, LinkService};
use tether_shared::ChannelId;
use tether_store::Database;

use crate::admission::{AdmissionConfig, AdmissionController, LinkProbe};
use crate::commands::CommandContext;
use crate::config::ServerConfig;
use crate::redemption::{RedemptionConfig, RedemptionHandler};
use crate::session::{SessionEvent, SessionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tether_server=debug")),
        )
        .init();

    info!("Starting Tether bridge v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        admission = config.admission_enabled,
        movement_restriction = config.movement_restriction,
        deadline_kick = config.deadline_kick,
        kick_delay_secs = config.kick_delay.as_secs(),
        reminder_interval_secs = config.reminder_interval.as_secs(),
        link_channel = %config.link_channel,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Open the store (blocking, so off the async context)
    // -----------------------------------------------------------------------
    let store_path = config.store_path.clone();
    let db = tokio::task::spawn_blocking(move || match store_path {
        Some(path) => Database::open_at(&path),
        None => Database::new(),
    })
    .await??;
    let db = Arc::new(StdMutex::new(db));

    // -----------------------------------------------------------------------
    // 4. Linking core
    // -----------------------------------------------------------------------
    let registry = Arc::new(SessionRegistry::new());
    let repository = Arc::new(LinkRepository::new(
        Arc::clone(&db),
        registry.resolver() as Arc<dyn IdentityResolver>,
    ));
    let service = Arc::new(LinkService::new(repository));

    // -----------------------------------------------------------------------
    // 5. Chat gateway
    // -----------------------------------------------------------------------
    // The loopback stands in for the platform SDK binding; a failed connect
    // leaves the bridge running with channel redemption disabled.
    let loopback = Arc::new(
        LoopbackGateway::with_channels(vec![(
            config.link_channel.clone(),
            ChannelId(config.link_channel.clone()),
        )])
        .await,
    );
    let gateway: Arc<dyn ChatGateway> = loopback;
    if let Err(e) = gateway.connect().await {
        warn!(error = %e, "chat gateway connect failed, continuing without channel redemption");
    }

    // -----------------------------------------------------------------------
    // 6. Admission + redemption
    // -----------------------------------------------------------------------
    let admission = AdmissionController::new(
        AdmissionConfig::from(&config),
        Arc::clone(&service) as Arc<dyn LinkProbe>,
    );

    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    gateway.register_inbound(inbound_tx).await;
    let handler = Arc::new(
        RedemptionHandler::new(
            RedemptionConfig::from(&config),
            Arc::clone(&service),
            Arc::clone(&gateway),
            Arc::clone(&registry),
        )
        .await,
    );
    tokio::spawn(Arc::clone(&handler).run(inbound_rx));

    // -----------------------------------------------------------------------
    // 7. Session event loop
    // -----------------------------------------------------------------------
    // `game_tx` is the handle the embedding game-server layer clones to
    // deliver join/quit/move events; it stays alive for the process
    // lifetime so the loop never sees a closed channel.
    let (game_tx, game_rx) = mpsc::channel::<SessionEvent>(256);
    tokio::spawn(session_loop(
        game_rx,
        Arc::clone(&registry),
        Arc::clone(&admission),
    ));
    info!("session event loop ready");

    // -----------------------------------------------------------------------
    // 8. Console admin commands
    // -----------------------------------------------------------------------
    let command_context = Arc::new(CommandContext::new(
        Arc::clone(&service),
        Arc::clone(&gateway),
        config.guild.clone(),
        config.admin_role,
    ));
    tokio::spawn(console_loop(Arc::clone(&command_context)));

    // -----------------------------------------------------------------------
    // 9. Run until shutdown
    // -----------------------------------------------------------------------
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    drop(game_tx);
    gateway.unregister_all().await;
    gateway.shutdown().await;
    service.shutdown().await;

    Ok(())
}

/// Dispatch game-session events: joins feed the registry and the admission
/// machine, quits tear per-player state down, movement attempts get an
/// allow/deny answer.
async fn session_loop(
    mut rx: mpsc::Receiver<SessionEvent>,
    registry: Arc<SessionRegistry>,
    admission: Arc<AdmissionController>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Join { session, stable_id } => {
                registry.register(Arc::clone(&session), stable_id).await;
                Arc::clone(&admission).handle_join(session).await;
            }
            SessionEvent::Quit { player } => {
                admission.handle_quit(&player).await;
                registry.unregister(&player).await;
            }
            SessionEvent::Move {
                player,
                from,
                to,
                cancel,
            } => {
                let deny = admission.handle_move(&player, &from, &to).await;
                if cancel.send(deny).is_err() {
                    warn!(player = %player, "movement verdict dropped, session gone");
                }
            }
        }
    }
    info!("session event loop stopped");
}

/// Read admin commands from stdin, one per line.
async fn console_loop(commands: Arc<CommandContext>) {
    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let output = commands.dispatch_line(line).await;
        println!("{output}");
    }
}
