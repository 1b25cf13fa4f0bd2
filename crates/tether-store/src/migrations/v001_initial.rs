//! v001 -- Initial schema creation.
//!
//! Creates the `links` table: one row per completed bind between a stable
//! game identity and a chat-platform account.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
///
/// `stable_id` is the primary key. `chat_user_id` carries no UNIQUE
/// constraint: chat-side uniqueness is enforced by the repository's
/// check-then-insert region, which also covers the game side in the same
/// critical section.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Links
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS links (
    stable_id    TEXT PRIMARY KEY NOT NULL,   -- UUID v4 of the game account
    chat_user_id TEXT NOT NULL,               -- opaque chat-platform id
    player_name  TEXT NOT NULL,               -- current display name, reconciled on rename
    display_name TEXT,                        -- chat-side display name (descriptive)
    avatar_url   TEXT,
    verified     INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    joined_at    TEXT NOT NULL,               -- ISO-8601 / RFC-3339
    nickname     TEXT
);

CREATE INDEX IF NOT EXISTS idx_links_chat_user_id ON links(chat_user_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
