//! CRUD operations for [`LinkRecord`] rows.
//!
//! All statements are parameterized. None of these helpers enforce the
//! one-per-side uniqueness invariant on their own; that belongs to the
//! repository's bind critical section.

use chrono::{DateTime, Utc};
use rusqlite::params;
use tether_shared::{ChatUserId, StableId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::LinkRecord;

const SELECT_COLUMNS: &str =
    "stable_id, chat_user_id, player_name, display_name, avatar_url, verified, joined_at, nickname";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new link record.
    pub fn insert_link(&self, record: &LinkRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO links (stable_id, chat_user_id, player_name, display_name,
                                avatar_url, verified, joined_at, nickname)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.stable_id.to_string(),
                record.chat_user_id.as_str(),
                record.player_name,
                record.display_name,
                record.avatar_url,
                record.verified,
                record.joined_at.to_rfc3339(),
                record.nickname,
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch the link record for a stable game identity, if any.
    pub fn get_link_by_stable_id(&self, stable_id: StableId) -> Result<Option<LinkRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM links WHERE stable_id = ?1");
        optional(
            self.conn()
                .query_row(&sql, params![stable_id.to_string()], row_to_link),
        )
    }

    /// Fetch the link record for a chat-platform account, if any.
    pub fn get_link_by_chat_user(&self, chat_user_id: &ChatUserId) -> Result<Option<LinkRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM links WHERE chat_user_id = ?1 LIMIT 1");
        optional(
            self.conn()
                .query_row(&sql, params![chat_user_id.as_str()], row_to_link),
        )
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Repair the stored display name after a detected rename.
    /// Returns `true` if a row was updated.
    pub fn update_player_name(&self, stable_id: StableId, new_name: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE links SET player_name = ?1 WHERE stable_id = ?2",
            params![new_name, stable_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete by the game-side key. Returns `true` if a row was deleted.
    pub fn delete_link_by_stable_id(&self, stable_id: StableId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM links WHERE stable_id = ?1",
            params![stable_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Delete by the chat-side key. Returns `true` if a row was deleted.
    pub fn delete_link_by_chat_user(&self, chat_user_id: &ChatUserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM links WHERE chat_user_id = ?1",
            params![chat_user_id.as_str()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collapse `QueryReturnedNoRows` into `Ok(None)`.
fn optional(result: rusqlite::Result<LinkRecord>) -> Result<Option<LinkRecord>> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(other) => Err(StoreError::Sqlite(other)),
    }
}

/// Map a `rusqlite::Row` to a [`LinkRecord`].
fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<LinkRecord> {
    let stable_id_str: String = row.get(0)?;
    let chat_user_id: String = row.get(1)?;
    let player_name: String = row.get(2)?;
    let display_name: Option<String> = row.get(3)?;
    let avatar_url: Option<String> = row.get(4)?;
    let verified: bool = row.get(5)?;
    let joined_str: String = row.get(6)?;
    let nickname: Option<String> = row.get(7)?;

    let stable_id = StableId::parse(&stable_id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let joined_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&joined_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(LinkRecord {
        stable_id,
        chat_user_id: ChatUserId(chat_user_id),
        player_name,
        display_name,
        avatar_url,
        verified,
        joined_at,
        nickname,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, chat: &str) -> LinkRecord {
        LinkRecord {
            stable_id: StableId::new(),
            chat_user_id: ChatUserId::from(chat),
            player_name: name.to_string(),
            display_name: Some(format!("{name}#chat")),
            avatar_url: None,
            verified: true,
            joined_at: Utc::now(),
            nickname: Some(name.to_string()),
        }
    }

    #[test]
    fn insert_and_get_by_both_keys() {
        let db = Database::open_in_memory().unwrap();
        let rec = record("Alice", "chat-1");
        db.insert_link(&rec).unwrap();

        let by_stable = db.get_link_by_stable_id(rec.stable_id).unwrap().unwrap();
        assert_eq!(by_stable.player_name, "Alice");

        let by_chat = db
            .get_link_by_chat_user(&rec.chat_user_id)
            .unwrap()
            .unwrap();
        assert_eq!(by_chat.stable_id, rec.stable_id);
    }

    #[test]
    fn get_missing_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_link_by_stable_id(StableId::new()).unwrap().is_none());
        assert!(db
            .get_link_by_chat_user(&ChatUserId::from("nobody"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn update_player_name_repairs_row() {
        let db = Database::open_in_memory().unwrap();
        let rec = record("Alice", "chat-1");
        db.insert_link(&rec).unwrap();

        assert!(db.update_player_name(rec.stable_id, "Alice2").unwrap());
        let fetched = db.get_link_by_stable_id(rec.stable_id).unwrap().unwrap();
        assert_eq!(fetched.player_name, "Alice2");

        // Unknown key touches nothing.
        assert!(!db.update_player_name(StableId::new(), "Ghost").unwrap());
    }

    #[test]
    fn delete_by_either_key() {
        let db = Database::open_in_memory().unwrap();
        let a = record("Alice", "chat-1");
        let b = record("Bob", "chat-2");
        db.insert_link(&a).unwrap();
        db.insert_link(&b).unwrap();

        assert!(db.delete_link_by_stable_id(a.stable_id).unwrap());
        assert!(db.get_link_by_stable_id(a.stable_id).unwrap().is_none());

        assert!(db.delete_link_by_chat_user(&b.chat_user_id).unwrap());
        assert!(db
            .get_link_by_chat_user(&b.chat_user_id)
            .unwrap()
            .is_none());

        // Second delete finds nothing.
        assert!(!db.delete_link_by_stable_id(a.stable_id).unwrap());
    }
}
