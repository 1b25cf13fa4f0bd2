//! The game-session surface the bridge consumes.
//!
//! The game server delivers [`SessionEvent`]s over a channel and hands out
//! [`SessionHandle`]s for the session-mutating operations (messages, kicks,
//! banners). Everything here runs on the main/session context from the
//! game's point of view; the bridge never blocks inside these calls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};

use tether_link::MemoryResolver;
use tether_shared::StableId;

/// World position. Restriction decisions are made at block granularity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn block(&self) -> (i64, i64, i64) {
        (
            self.x.floor() as i64,
            self.y.floor() as i64,
            self.z.floor() as i64,
        )
    }

    /// Whether `other` is inside the same block. An orientation-only or
    /// sub-block change keeps the block identical.
    pub fn same_block(&self, other: &Position) -> bool {
        self.block() == other.block()
    }
}

/// Transient on-screen banner parameters (ticks).
#[derive(Debug, Clone)]
pub struct Banner {
    pub title: String,
    pub subtitle: String,
    pub fade_in: u32,
    pub stay: u32,
    pub fade_out: u32,
}

/// Events delivered by the game server.
pub enum SessionEvent {
    Join {
        session: Arc<dyn SessionHandle>,
        stable_id: StableId,
    },
    Quit {
        player: String,
    },
    /// A movement attempt. The bridge answers on `cancel`: `true` means
    /// the game must reject the position change.
    Move {
        player: String,
        from: Position,
        to: Position,
        cancel: oneshot::Sender<bool>,
    },
}

/// Handle to one online game session.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    fn name(&self) -> &str;
    fn is_online(&self) -> bool;
    async fn send_message(&self, lines: &[String]);
    async fn show_banner(&self, banner: &Banner);
    async fn kick(&self, message: &str);
}

/// Tracks online sessions and feeds the identity resolver.
///
/// A name stays resolvable after quit (the identity service knows players
/// who have connected before); only the session handle is dropped. A
/// re-register under a new name displaces the old one, which is what makes
/// rename reconciliation observable.
pub struct SessionRegistry {
    resolver: Arc<MemoryResolver>,
    sessions: Mutex<HashMap<String, Arc<dyn SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            resolver: MemoryResolver::new(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolver(&self) -> Arc<MemoryResolver> {
        Arc::clone(&self.resolver)
    }

    pub async fn register(&self, session: Arc<dyn SessionHandle>, stable_id: StableId) {
        let name = session.name().to_string();
        self.resolver.register(&name, stable_id).await;
        self.sessions.lock().await.insert(name, session);
    }

    pub async fn unregister(&self, player: &str) {
        self.sessions.lock().await.remove(player);
    }

    pub async fn get(&self, player: &str) -> Option<Arc<dyn SessionHandle>> {
        self.sessions.lock().await.get(player).cloned()
    }

    pub async fn online_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory session double used by the admission and redemption tests.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::{Banner, SessionHandle};

    #[derive(Default)]
    pub struct FakeSession {
        pub name: String,
        online: AtomicBool,
        pub messages: Mutex<Vec<Vec<String>>>,
        pub banners: Mutex<Vec<Banner>>,
        pub kicked_with: Mutex<Option<String>>,
    }

    impl FakeSession {
        pub fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                online: AtomicBool::new(true),
                ..Default::default()
            })
        }

        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        pub async fn was_kicked(&self) -> Option<String> {
            self.kicked_with.lock().await.clone()
        }

        pub async fn banner_count(&self) -> usize {
            self.banners.lock().await.len()
        }
    }

    #[async_trait::async_trait]
    impl SessionHandle for FakeSession {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_online(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        async fn send_message(&self, lines: &[String]) {
            self.messages.lock().await.push(lines.to_vec());
        }

        async fn show_banner(&self, banner: &Banner) {
            self.banners.lock().await.push(banner.clone());
        }

        async fn kick(&self, message: &str) {
            self.set_online(false);
            *self.kicked_with.lock().await = Some(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_granularity() {
        let a = Position::new(1.2, 64.0, -3.9);
        let look_only = Position::new(1.8, 64.0, -3.1);
        let stepped = Position::new(2.01, 64.0, -3.9);

        assert!(a.same_block(&look_only));
        assert!(!a.same_block(&stepped));

        // Negative coordinates floor toward negative infinity.
        assert_eq!(Position::new(-0.5, 0.0, 0.0).block().0, -1);
    }

    #[tokio::test]
    async fn registry_keeps_names_resolvable_after_quit() {
        use tether_link::IdentityResolver;

        let registry = SessionRegistry::new();
        let id = StableId::new();
        let session = testing::FakeSession::new("Alice");
        registry.register(session, id).await;

        assert!(registry.get("Alice").await.is_some());
        registry.unregister("Alice").await;
        assert!(registry.get("Alice").await.is_none());

        // Identity still resolves for offline players.
        assert_eq!(registry.resolver().resolve("Alice").await.unwrap(), id);
    }
}
