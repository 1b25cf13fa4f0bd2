//! Verification-code issuance.
//!
//! Codes are short opaque tokens proving a redemption request originated
//! from a specific game identity. They live in a bounded expire-after-write
//! cache; a lookup is a pure read and never extends a code's life. A miss
//! and an expired code are indistinguishable to the caller, so redemption
//! cannot be used as a code-guessing oracle.

use std::time::Duration;

use rand::Rng;

use tether_shared::constants::{
    CODE_CACHE_MAX, CODE_LENGTH, CODE_MAX_GENERATION_ATTEMPTS, CODE_TTL_SECS,
};

use crate::cache::TtlCache;
use crate::error::{LinkError, Result};

const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

type Generator = Box<dyn Fn() -> String + Send + Sync>;

pub struct CodeIssuer {
    /// code -> requesting player name
    codes: TtlCache<String, String>,
    /// player name -> their live code, so a rejoin reuses it
    by_player: TtlCache<String, String>,
    generator: Generator,
}

impl CodeIssuer {
    pub fn new() -> Self {
        Self::with_generator(Box::new(generate_code))
    }

    /// Issuer with a custom generator; tests use this to force collisions.
    pub fn with_generator(generator: Generator) -> Self {
        let ttl = Duration::from_secs(CODE_TTL_SECS);
        Self {
            codes: TtlCache::new(ttl, CODE_CACHE_MAX),
            by_player: TtlCache::new(ttl, CODE_CACHE_MAX),
            generator,
        }
    }

    /// Issue a code for `player_name`, reusing a still-live one for the
    /// same player. A freshly generated code that collides with another
    /// live code is regenerated, a bounded number of times.
    pub async fn issue(&self, player_name: &str) -> Result<String> {
        if let Some(code) = self.by_player.get(&player_name.to_string()).await {
            // Both caches share a TTL, but verify the forward entry is
            // still live before handing the code back out.
            if self.codes.get(&code).await.as_deref() == Some(player_name) {
                tracing::debug!(player = %player_name, "reusing live verification code");
                return Ok(code);
            }
        }

        for _ in 0..CODE_MAX_GENERATION_ATTEMPTS {
            let code = (self.generator)();
            if self.codes.get(&code).await.is_some() {
                tracing::debug!("verification code collision, regenerating");
                continue;
            }
            self.codes.insert(code.clone(), player_name.to_string()).await;
            self.by_player
                .insert(player_name.to_string(), code.clone())
                .await;
            tracing::info!(player = %player_name, "issued verification code");
            return Ok(code);
        }

        Err(LinkError::Internal(format!(
            "verification code generation collided {CODE_MAX_GENERATION_ATTEMPTS} times"
        )))
    }

    /// Pure read: the requesting player for a live code, or absent.
    /// Expired and never-issued codes are indistinguishable.
    pub async fn lookup(&self, code: &str) -> Option<String> {
        self.codes.get(&code.to_string()).await
    }

    /// Drop all live codes (shutdown only).
    pub async fn clear(&self) {
        self.codes.clear().await;
        self.by_player.clear().await;
    }
}

impl Default for CodeIssuer {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::advance;

    #[test]
    fn generated_codes_use_charset() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_CHARSET.contains(&b)));
    }

    #[tokio::test]
    async fn issue_then_lookup() {
        let issuer = CodeIssuer::new();
        let code = issuer.issue("Alice").await.unwrap();
        assert_eq!(issuer.lookup(&code).await.as_deref(), Some("Alice"));
        assert_eq!(issuer.lookup("NOPE42").await, None);
    }

    #[tokio::test]
    async fn live_code_is_reused_for_same_player() {
        let issuer = CodeIssuer::new();
        let first = issuer.issue("Alice").await.unwrap();
        let second = issuer.issue("Alice").await.unwrap();
        assert_eq!(first, second);

        // A different player gets a different code.
        let other = issuer.issue("Bob").await.unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_codes_are_not_redeemable() {
        let issuer = CodeIssuer::new();
        let code = issuer.issue("Alice").await.unwrap();

        advance(Duration::from_secs(CODE_TTL_SECS + 1)).await;
        assert_eq!(issuer.lookup(&code).await, None);

        // After expiry a fresh issue produces a new live code.
        let fresh = issuer.issue("Alice").await.unwrap();
        assert_eq!(issuer.lookup(&fresh).await.as_deref(), Some("Alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn lookups_do_not_extend_the_ttl() {
        let issuer = CodeIssuer::new();
        let code = issuer.issue("Alice").await.unwrap();

        advance(Duration::from_secs(CODE_TTL_SECS - 1)).await;
        assert!(issuer.lookup(&code).await.is_some());
        advance(Duration::from_secs(2)).await;
        assert_eq!(issuer.lookup(&code).await, None);
    }

    #[tokio::test]
    async fn collision_regenerates() {
        // First two calls produce "SAME", then unique codes.
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let issuer = CodeIssuer::with_generator(Box::new(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                "SAME".to_string()
            } else {
                format!("UNIQ{n}")
            }
        }));

        let first = issuer.issue("Alice").await.unwrap();
        assert_eq!(first, "SAME");

        let second = issuer.issue("Bob").await.unwrap();
        assert_eq!(second, "UNIQ2");
        assert_eq!(issuer.lookup("SAME").await.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn exhausted_regeneration_fails() {
        let issuer = CodeIssuer::with_generator(Box::new(|| "STUCK".to_string()));
        issuer.issue("Alice").await.unwrap();

        let err = issuer.issue("Bob").await.unwrap_err();
        assert!(matches!(err, LinkError::Internal(_)));
    }
}
