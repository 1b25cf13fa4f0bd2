//! The link repository: durable game↔chat account mapping.
//!
//! Owns the persisted [`LinkRecord`]s and the read-through
//! `player_name -> LinkRecord` cache in front of them. Reads are
//! cache-first; every store round-trip runs on the blocking worker pool.
//! The bind path is the correctness-critical region: both existence checks
//! and the insert execute under one lock so two concurrent binds can never
//! both pass their checks.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tether_shared::constants::{LINK_CACHE_MAX, LINK_CACHE_TTL_SECS};
use tether_shared::{ChatProfile, ChatUserId};
use tether_store::{Database, LinkRecord, StoreError};

use crate::cache::TtlCache;
use crate::error::{LinkError, Result};
use crate::identity::IdentityResolver;

/// Outcome of the in-store check phase of a bind.
enum BindCheck {
    Inserted,
    PlayerSideTaken(LinkRecord),
    ChatSideTaken(LinkRecord),
}

pub struct LinkRepository {
    db: Arc<StdMutex<Database>>,
    cache: TtlCache<String, LinkRecord>,
    resolver: Arc<dyn IdentityResolver>,
    /// Serializes the check-then-insert region of `bind`. Contention is
    /// low (one bind per code redemption), so a single lock is enough.
    bind_lock: Mutex<()>,
}

impl LinkRepository {
    pub fn new(db: Arc<StdMutex<Database>>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            db,
            cache: TtlCache::new(
                Duration::from_secs(LINK_CACHE_TTL_SECS),
                LINK_CACHE_MAX,
            ),
            resolver,
            bind_lock: Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Whether `player_name` has a completed link. Any failure along the
    /// way (unresolvable identity, store trouble) is logged and reported
    /// as "not linked" -- boolean callers get no error channel.
    pub async fn is_linked(&self, player_name: &str) -> bool {
        match self.lookup(player_name).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(player = %player_name, error = %e, "link check aborted");
                false
            }
        }
    }

    /// The full record for `player_name`. Unlike [`Self::is_linked`], an
    /// unresolvable identity surfaces as an error so the caller can tell
    /// "checked and absent" from "could not check".
    pub async fn get_linked_record(&self, player_name: &str) -> Result<LinkRecord> {
        self.lookup(player_name).await?.ok_or(LinkError::NotFound)
    }

    /// Same resolution path as [`Self::is_linked`].
    pub async fn find_chat_user_by_player_name(
        &self,
        player_name: &str,
    ) -> Result<Option<ChatUserId>> {
        Ok(self.lookup(player_name).await?.map(|r| r.chat_user_id))
    }

    /// Direct chat-side lookup; no identity resolution involved.
    pub async fn find_player_name_by_chat_user(
        &self,
        chat_user_id: &ChatUserId,
    ) -> Result<Option<String>> {
        let id = chat_user_id.clone();
        let record = self
            .with_db("find_by_chat_user", move |db| db.get_link_by_chat_user(&id))
            .await?;
        Ok(record.map(|r| r.player_name))
    }

    pub async fn chat_user_is_linked(&self, chat_user_id: &ChatUserId) -> bool {
        match self.find_player_name_by_chat_user(chat_user_id).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(chat_user = %chat_user_id, error = %e, "chat-side link check aborted");
                false
            }
        }
    }

    /// Cache-first read with rename reconciliation on the miss path.
    async fn lookup(&self, player_name: &str) -> Result<Option<LinkRecord>> {
        if let Some(record) = self.cache.get(&player_name.to_string()).await {
            return Ok(Some(record));
        }

        let stable_id = self.resolver.resolve(player_name).await?;
        let found = self
            .with_db("lookup", move |db| db.get_link_by_stable_id(stable_id))
            .await?;

        let Some(mut record) = found else {
            return Ok(None);
        };

        if record.player_name != player_name {
            self.reconcile_rename(&mut record, player_name).await;
        }

        self.cache
            .insert(player_name.to_string(), record.clone())
            .await;
        Ok(Some(record))
    }

    /// Repair the stored display name after a detected rename. Best-effort:
    /// a failed update is logged and the read proceeds, since the link
    /// itself is intact.
    async fn reconcile_rename(&self, record: &mut LinkRecord, current_name: &str) {
        let old_name = record.player_name.clone();
        info!(
            stable_id = %record.stable_id,
            old_name = %old_name,
            new_name = %current_name,
            "player rename detected, repairing stored name"
        );

        let stable_id = record.stable_id;
        let new_name = current_name.to_string();
        match self
            .with_db("reconcile_rename", move |db| {
                db.update_player_name(stable_id, &new_name)
            })
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(stable_id = %record.stable_id, "rename repair touched no rows"),
            Err(e) => warn!(stable_id = %record.stable_id, error = %e, "rename repair failed"),
        }

        self.cache.invalidate(&old_name).await;
        record.player_name = current_name.to_string();
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Create the link between `player_name` and the chat account in
    /// `profile`.
    ///
    /// The existence checks on both keys and the insert run as one
    /// critical section; of two concurrent binds overlapping on either
    /// key, exactly one succeeds and the loser sees the same conflict it
    /// would have seen arriving late.
    pub async fn bind(&self, player_name: &str, profile: &ChatProfile) -> Result<LinkRecord> {
        let stable_id = self.resolver.resolve(player_name).await?;
        let record = LinkRecord::from_bind(stable_id, player_name, profile, Utc::now());

        let _guard = self.bind_lock.lock().await;

        let candidate = record.clone();
        let check = self
            .with_db("bind", move |db| {
                if let Some(existing) = db.get_link_by_stable_id(candidate.stable_id)? {
                    return Ok(BindCheck::PlayerSideTaken(existing));
                }
                if let Some(existing) = db.get_link_by_chat_user(&candidate.chat_user_id)? {
                    return Ok(BindCheck::ChatSideTaken(existing));
                }
                db.insert_link(&candidate)?;
                Ok(BindCheck::Inserted)
            })
            .await?;

        match check {
            BindCheck::Inserted => {
                // No cache mutation happens on the failure paths above.
                self.cache.invalidate(&player_name.to_string()).await;
                info!(
                    player = %player_name,
                    chat_user = %profile.id,
                    stable_id = %stable_id,
                    "link established"
                );
                Ok(record)
            }
            BindCheck::PlayerSideTaken(existing) => Err(LinkError::PlayerAlreadyLinked {
                player: player_name.to_string(),
                chat_user_id: existing.chat_user_id.to_string(),
            }),
            BindCheck::ChatSideTaken(existing) => Err(LinkError::ChatAccountAlreadyLinked {
                chat_user_id: profile.id.to_string(),
                player: existing.player_name,
            }),
        }
    }

    /// Remove the link for a player, keyed by their (current) name.
    /// Returns the removed record.
    pub async fn unbind_by_player_name(&self, player_name: &str) -> Result<LinkRecord> {
        let stable_id = self.resolver.resolve(player_name).await?;

        let removed = self
            .with_db("unbind_by_player", move |db| {
                let Some(existing) = db.get_link_by_stable_id(stable_id)? else {
                    return Ok(None);
                };
                db.delete_link_by_stable_id(stable_id)?;
                Ok(Some(existing))
            })
            .await?;

        let Some(record) = removed else {
            return Err(LinkError::NotFound);
        };

        // The cache is keyed by the record's *stored* name, which may lag
        // the caller's name when a rename was never reconciled.
        self.cache.invalidate(&record.player_name).await;
        info!(
            player = %record.player_name,
            chat_user = %record.chat_user_id,
            "link removed by player name"
        );
        Ok(record)
    }

    /// Remove the link for a chat account. Returns the removed record.
    pub async fn unbind_by_chat_user(&self, chat_user_id: &ChatUserId) -> Result<LinkRecord> {
        let id = chat_user_id.clone();
        let removed = self
            .with_db("unbind_by_chat_user", move |db| {
                let Some(existing) = db.get_link_by_chat_user(&id)? else {
                    return Ok(None);
                };
                db.delete_link_by_chat_user(&id)?;
                Ok(Some(existing))
            })
            .await?;

        let Some(record) = removed else {
            return Err(LinkError::NotFound);
        };

        self.cache.invalidate(&record.player_name).await;
        info!(
            player = %record.player_name,
            chat_user = %record.chat_user_id,
            "link removed by chat account"
        );
        Ok(record)
    }

    /// Drop the read-through cache. Shutdown only.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    // ------------------------------------------------------------------
    // Store access
    // ------------------------------------------------------------------

    /// Run one store operation on the blocking pool, with duration logging
    /// and error conversion at the boundary. Store errors never cross this
    /// seam unconverted.
    async fn with_db<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> std::result::Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let started = Instant::now();

        let joined = tokio::task::spawn_blocking(move || -> Result<T> {
            let guard = db
                .lock()
                .map_err(|_| LinkError::Internal("store lock poisoned".to_string()))?;
            f(&guard).map_err(LinkError::from)
        })
        .await;

        let elapsed = started.elapsed();
        match joined {
            Ok(Ok(value)) => {
                debug!(op, elapsed_ms = elapsed.as_millis() as u64, "store operation done");
                Ok(value)
            }
            Ok(Err(e)) => {
                warn!(op, elapsed_ms = elapsed.as_millis() as u64, error = %e, "store operation failed");
                Err(e)
            }
            Err(join_err) => {
                warn!(op, error = %join_err, "store worker panicked or was cancelled");
                Err(LinkError::Internal(format!("store worker failed: {join_err}")))
            }
        }
    }
}
