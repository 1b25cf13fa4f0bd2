use thiserror::Error;

use crate::identity::ResolveError;

/// Errors produced by the linking core.
///
/// Expected conditions (not-found, conflict) are ordinary variants so that
/// command handlers can map them to distinct user-facing text; only
/// [`LinkError::Internal`] represents something going wrong.
#[derive(Error, Debug)]
pub enum LinkError {
    /// No stable identifier could be resolved for the given name.
    #[error("could not resolve a stable id for '{0}'")]
    UnresolvedIdentity(String),

    /// No link record exists for the queried key.
    #[error("no link record found")]
    NotFound,

    /// The game account is already linked.
    #[error("player {player} is already linked to chat account {chat_user_id}")]
    PlayerAlreadyLinked { player: String, chat_user_id: String },

    /// The chat account is already linked.
    #[error("chat account {chat_user_id} is already linked to player {player}")]
    ChatAccountAlreadyLinked { chat_user_id: String, player: String },

    /// A caller passed a structurally invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A dependency (identity service, chat gateway) is not reachable.
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    /// Unexpected store or runtime failure; details are in the log.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LinkError {
    /// Whether this error names a bind conflict (either side, including a
    /// lost race, which surfaces as the same conflict).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            LinkError::PlayerAlreadyLinked { .. } | LinkError::ChatAccountAlreadyLinked { .. }
        )
    }
}

impl From<ResolveError> for LinkError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Unknown(name) => LinkError::UnresolvedIdentity(name),
            ResolveError::Unavailable(reason) => LinkError::Unavailable(reason),
        }
    }
}

impl From<tether_store::StoreError> for LinkError {
    fn from(e: tether_store::StoreError) -> Self {
        match e {
            tether_store::StoreError::NotFound => LinkError::NotFound,
            other => LinkError::Internal(other.to_string()),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LinkError>;
