use rusqlite::Connection;

use crate::error::Result;

/// Initialise the store schema in `conn`.
///
/// Both tables are keyed so that a write for an existing recipient replaces
/// the previous row instead of adding a second one.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS locations (
            key          TEXT    NOT NULL PRIMARY KEY,   -- {prefix}:geo:{recipient}
            recipient_id INTEGER NOT NULL,
            lat          REAL    NOT NULL,
            lng          REAL    NOT NULL,
            updated_at   TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS triggers (
            recipient_id INTEGER NOT NULL PRIMARY KEY,
            hour         INTEGER NOT NULL,
            minute       INTEGER NOT NULL,
            timezone     TEXT    NOT NULL,
            payload      TEXT    NOT NULL,               -- JSON-encoded TriggerPayload
            updated_at   TEXT    NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
