//! Identity resolution: display name to stable id.
//!
//! Resolution is an explicit step with its own error type, composed by the
//! repository rather than hidden inside reads. The production resolver is
//! backed by the session registry; it may be slow (the original identity
//! service is a network call), which is why the repository always invokes
//! it from the background context.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use tether_shared::StableId;

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The name has never connected to this server (or renamed away).
    #[error("no stable id known for '{0}'")]
    Unknown(String),

    /// The identity service could not be reached.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the stable id for a current display name.
    async fn resolve(&self, player_name: &str) -> Result<StableId, ResolveError>;
}

/// Map-backed resolver tracking the *current* name of each stable id.
///
/// Registering a stable id under a new name drops any previous name it held,
/// so a stale name stops resolving the moment the rename is observed --
/// exactly the behavior the rename-reconciliation path depends on.
#[derive(Default)]
pub struct MemoryResolver {
    names: Mutex<HashMap<String, StableId>>,
}

impl MemoryResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Associate `name` with `id`, displacing any older name for the same id.
    pub async fn register(&self, name: &str, id: StableId) {
        let mut names = self.names.lock().await;
        names.retain(|_, existing| *existing != id);
        names.insert(name.to_string(), id);
    }

    /// Forget a name (e.g. the session disconnected and identity lookups
    /// for offline players are not available).
    pub async fn unregister(&self, name: &str) {
        self.names.lock().await.remove(name);
    }
}

#[async_trait]
impl IdentityResolver for MemoryResolver {
    async fn resolve(&self, player_name: &str) -> Result<StableId, ResolveError> {
        self.names
            .lock()
            .await
            .get(player_name)
            .copied()
            .ok_or_else(|| ResolveError::Unknown(player_name.to_string()))
    }
}
