//! Join-time admission enforcement.
//!
//! A player is *pending* while an entry exists in the controller's map:
//! they joined unlinked, hold a live verification code, and have a
//! reminder loop and (optionally) a deadline kick running against them.
//! The entry, both timers included, dies on quit or the moment a link is
//! observed -- whichever comes first. Nothing here is persisted.
//!
//! The two timers are independently cancellable; they are only ever
//! cancelled together, on quit or on confirmed link. The deadline kick
//! re-verifies link status immediately before evicting so a bind that
//! landed in the last instant never gets a player kicked.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tether_link::LinkService;

use crate::session::{Banner, Position, SessionHandle};

/// What the admission machine needs from the linking core.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn is_linked(&self, player: &str) -> bool;
    /// Issue -- or reuse -- the verification code for an unlinked player.
    async fn verify_code(&self, player: &str) -> Option<String>;
}

#[async_trait]
impl LinkProbe for LinkService {
    async fn is_linked(&self, player: &str) -> bool {
        LinkService::is_linked(self, player).await
    }

    async fn verify_code(&self, player: &str) -> Option<String> {
        match self.build_verify_code(player).await {
            Ok(code) => Some(code),
            Err(e) => {
                warn!(player = %player, error = %e, "could not issue verification code");
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub enabled: bool,
    pub movement_restriction: bool,
    pub deadline_kick: bool,
    pub kick_delay: Duration,
    pub reminders_enabled: bool,
    pub reminder_interval: Duration,
    pub link_channel: String,
    pub prompt_template: Vec<String>,
    pub kick_template: String,
    pub banner_title: String,
    pub banner_subtitle: String,
    pub banner_fade_in: u32,
    pub banner_stay: u32,
    pub banner_fade_out: u32,
}

impl From<&crate::config::ServerConfig> for AdmissionConfig {
    fn from(cfg: &crate::config::ServerConfig) -> Self {
        Self {
            enabled: cfg.admission_enabled,
            movement_restriction: cfg.movement_restriction,
            deadline_kick: cfg.deadline_kick,
            kick_delay: cfg.kick_delay,
            reminders_enabled: cfg.reminders_enabled,
            reminder_interval: cfg.reminder_interval,
            link_channel: cfg.link_channel.clone(),
            prompt_template: cfg.prompt_template.clone(),
            kick_template: cfg.kick_template.clone(),
            banner_title: cfg.banner_title.clone(),
            banner_subtitle: cfg.banner_subtitle.clone(),
            banner_fade_in: cfg.banner_fade_in,
            banner_stay: cfg.banner_stay,
            banner_fade_out: cfg.banner_fade_out,
        }
    }
}

/// Transient per-player state. Never persisted.
struct Entry {
    restricted: bool,
    reminder: Option<JoinHandle<()>>,
    deadline: Option<JoinHandle<()>>,
}

impl Entry {
    fn cancel(&mut self) {
        if let Some(handle) = self.reminder.take() {
            handle.abort();
        }
        if let Some(handle) = self.deadline.take() {
            handle.abort();
        }
    }
}

pub struct AdmissionController {
    cfg: AdmissionConfig,
    links: Arc<dyn LinkProbe>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl AdmissionController {
    pub fn new(cfg: AdmissionConfig, links: Arc<dyn LinkProbe>) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            links,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// React to a join: check link status and, if unlinked, start the
    /// prompt/remind/restrict/kick sequence.
    pub async fn handle_join(self: Arc<Self>, session: Arc<dyn SessionHandle>) {
        if !self.cfg.enabled {
            return;
        }

        let player = session.name().to_string();

        if self.links.is_linked(&player).await {
            debug!(player = %player, "already linked, admission passed");
            // A stale entry from a previous unlinked visit must not
            // restrict a now-linked player.
            self.clear(&player).await;
            return;
        }

        let Some(code) = self.links.verify_code(&player).await else {
            warn!(player = %player, "no verification code available, skipping enforcement");
            return;
        };

        info!(player = %player, "unlinked player joined, admission pending");

        // Restart cleanly on rejoin: any timers from a previous visit die
        // here; the still-live code was reused above.
        self.clear(&player).await;

        session.send_message(&self.render_lines(&self.cfg.prompt_template, &player, &code)).await;
        session.show_banner(&self.banner(&player, &code)).await;

        let mut entry = Entry {
            restricted: self.cfg.movement_restriction,
            reminder: None,
            deadline: None,
        };

        if self.cfg.reminders_enabled {
            let ctrl = Arc::clone(&self);
            let session = Arc::clone(&session);
            let code = code.clone();
            entry.reminder = Some(tokio::spawn(async move {
                ctrl.reminder_loop(session, code).await;
            }));
        }

        if self.cfg.deadline_kick {
            let ctrl = Arc::clone(&self);
            let session = Arc::clone(&session);
            entry.deadline = Some(tokio::spawn(async move {
                ctrl.deadline_task(session, code).await;
            }));
        }

        self.entries.lock().await.insert(player, entry);
    }

    /// Mandatory cleanup on quit, regardless of state: both timers die and
    /// the entry is dropped, so nothing leaks across a reconnect.
    pub async fn handle_quit(&self, player: &str) {
        if self.clear(player).await {
            debug!(player = %player, "admission entry cleared on quit");
        }
    }

    /// Whether a movement attempt must be rejected. Only an actual
    /// block-to-block change is restricted; orientation-only and sub-block
    /// motion always passes.
    pub async fn handle_move(&self, player: &str, from: &Position, to: &Position) -> bool {
        if !self.cfg.enabled || !self.cfg.movement_restriction {
            return false;
        }
        if from.same_block(to) {
            return false;
        }
        let entries = self.entries.lock().await;
        entries.get(player).map(|e| e.restricted).unwrap_or(false)
    }

    /// Whether the player currently sits in the pending state.
    pub async fn is_pending(&self, player: &str) -> bool {
        self.entries.lock().await.contains_key(player)
    }

    /// Drop the player's entry and cancel both timers. Returns whether an
    /// entry existed.
    async fn clear(&self, player: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(player) {
            Some(mut entry) => {
                entry.cancel();
                true
            }
            None => false,
        }
    }

    async fn reminder_loop(self: Arc<Self>, session: Arc<dyn SessionHandle>, code: String) {
        let period = self.cfg.reminder_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            interval.tick().await;

            if !session.is_online() {
                break;
            }

            if self.links.is_linked(session.name()).await {
                info!(player = %session.name(), "link confirmed, cancelling admission timers");
                self.clear(session.name()).await;
                break;
            }

            session.show_banner(&self.banner(session.name(), &code)).await;
        }
    }

    async fn deadline_task(self: Arc<Self>, session: Arc<dyn SessionHandle>, code: String) {
        tokio::time::sleep(self.cfg.kick_delay).await;

        let player = session.name().to_string();

        if !session.is_online() {
            self.clear(&player).await;
            return;
        }

        // Re-verify right before evicting: a bind in the window since the
        // last check must not get the player kicked.
        if self.links.is_linked(&player).await {
            info!(player = %player, "linked before the deadline, no kick");
            self.clear(&player).await;
            return;
        }

        let message = self.render(&self.cfg.kick_template, &player, &code);
        info!(
            player = %player,
            deadline_secs = self.cfg.kick_delay.as_secs(),
            "deadline elapsed while unlinked, evicting"
        );
        session.kick(&message).await;
        self.clear(&player).await;
    }

    fn banner(&self, player: &str, code: &str) -> Banner {
        Banner {
            title: self.render(&self.cfg.banner_title, player, code),
            subtitle: self.render(&self.cfg.banner_subtitle, player, code),
            fade_in: self.cfg.banner_fade_in,
            stay: self.cfg.banner_stay,
            fade_out: self.cfg.banner_fade_out,
        }
    }

    fn render(&self, template: &str, player: &str, code: &str) -> String {
        template
            .replace("{player}", player)
            .replace("{code}", code)
            .replace("{channel}", &self.cfg.link_channel)
            .replace("{seconds}", &self.cfg.kick_delay.as_secs().to_string())
    }

    fn render_lines(&self, templates: &[String], player: &str, code: &str) -> Vec<String> {
        templates
            .iter()
            .map(|t| self.render(t, player, code))
            .collect()
    }
}
