//! Orchestration layer over the repository and the code issuer.
//!
//! This is the only surface other crates talk to; it adds argument
//! validation and nothing else. The admission machinery calls
//! [`LinkService::is_linked`] / [`LinkService::build_verify_code`], the
//! redemption handler calls [`LinkService::lookup_code`] /
//! [`LinkService::link`], and admin commands use the unbind/find family.

use std::sync::Arc;

use tether_shared::{ChatProfile, ChatUserId};
use tether_store::LinkRecord;

use crate::codes::CodeIssuer;
use crate::error::{LinkError, Result};
use crate::repository::LinkRepository;

pub struct LinkService {
    repository: Arc<LinkRepository>,
    issuer: CodeIssuer,
}

impl LinkService {
    pub fn new(repository: Arc<LinkRepository>) -> Self {
        Self {
            repository,
            issuer: CodeIssuer::new(),
        }
    }

    /// Service with a custom issuer (tests force collisions through this).
    pub fn with_issuer(repository: Arc<LinkRepository>, issuer: CodeIssuer) -> Self {
        Self { repository, issuer }
    }

    pub async fn is_linked(&self, player_name: &str) -> bool {
        if player_name.trim().is_empty() {
            return false;
        }
        self.repository.is_linked(player_name).await
    }

    pub async fn get_linked_record(&self, player_name: &str) -> Result<LinkRecord> {
        Self::require(player_name, "player name must not be empty")?;
        self.repository.get_linked_record(player_name).await
    }

    /// Complete a bind for `player_name` with the redeeming chat account.
    pub async fn link(&self, player_name: &str, profile: &ChatProfile) -> Result<LinkRecord> {
        Self::require(player_name, "player name must not be empty")?;
        Self::require(profile.id.as_str(), "chat user id must not be empty")?;
        self.repository.bind(player_name, profile).await
    }

    /// Issue (or reuse) the verification code for an unlinked player.
    pub async fn build_verify_code(&self, player_name: &str) -> Result<String> {
        Self::require(player_name, "player name must not be empty")?;
        self.issuer.issue(player_name).await
    }

    /// The player name a live code was issued for, or absent. Expired and
    /// unknown codes are indistinguishable.
    pub async fn lookup_code(&self, code: &str) -> Option<String> {
        if code.trim().is_empty() {
            return None;
        }
        self.issuer.lookup(code.trim()).await
    }

    pub async fn chat_user_is_linked(&self, chat_user_id: &ChatUserId) -> bool {
        if chat_user_id.as_str().is_empty() {
            return false;
        }
        self.repository.chat_user_is_linked(chat_user_id).await
    }

    pub async fn unbind_by_player_name(&self, player_name: &str) -> Result<LinkRecord> {
        Self::require(player_name, "player name must not be empty")?;
        self.repository.unbind_by_player_name(player_name).await
    }

    pub async fn unbind_by_chat_user(&self, chat_user_id: &ChatUserId) -> Result<LinkRecord> {
        Self::require(chat_user_id.as_str(), "chat user id must not be empty")?;
        self.repository.unbind_by_chat_user(chat_user_id).await
    }

    pub async fn find_player_name_by_chat_user(
        &self,
        chat_user_id: &ChatUserId,
    ) -> Result<Option<String>> {
        Self::require(chat_user_id.as_str(), "chat user id must not be empty")?;
        self.repository
            .find_player_name_by_chat_user(chat_user_id)
            .await
    }

    pub async fn find_chat_user_by_player_name(
        &self,
        player_name: &str,
    ) -> Result<Option<ChatUserId>> {
        Self::require(player_name, "player name must not be empty")?;
        self.repository
            .find_chat_user_by_player_name(player_name)
            .await
    }

    /// Drop transient state (caches). Called once on shutdown.
    pub async fn shutdown(&self) {
        self.issuer.clear().await;
        self.repository.clear_cache().await;
    }

    fn require(value: &str, what: &'static str) -> Result<()> {
        if value.trim().is_empty() {
            Err(LinkError::InvalidArgument(what))
        } else {
            Ok(())
        }
    }
}
