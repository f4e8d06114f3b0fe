use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rainbot_core::types::{Location, RecipientId, Trigger, TriggerPayload};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::db::init_db;
use crate::error::Result;
use crate::{location_key, Store};

/// SQLite-backed store. One connection, serialized behind a mutex; every
/// write is a single upsert statement so readers never see a partial row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    prefix: String,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`, creating its directory
    /// and schema as needed.
    pub fn open(path: &str, prefix: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn, prefix)
    }

    /// Wrap an already-open connection (e.g. `Connection::open_in_memory`).
    pub fn from_connection(conn: Connection, prefix: &str) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            prefix: prefix.to_string(),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for SqliteStore {
    fn get_location(&self, recipient: RecipientId) -> Result<Option<Location>> {
        let key = location_key(&self.prefix, recipient);
        let row = self
            .conn()
            .query_row(
                "SELECT lat, lng FROM locations WHERE key = ?1",
                [&key],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, f64>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(lat, lng)| Location { lat, lng }))
    }

    fn set_location(&self, recipient: RecipientId, location: Location) -> Result<()> {
        let key = location_key(&self.prefix, recipient);
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO locations (key, recipient_id, lat, lng, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                lat = excluded.lat, lng = excluded.lng, updated_at = excluded.updated_at",
            params![key, recipient.get(), location.lat, location.lng, now],
        )?;
        debug!(%key, "location saved");
        Ok(())
    }

    fn upsert_trigger(&self, trigger: &Trigger) -> Result<()> {
        let payload = serde_json::to_string(&trigger.payload)?;
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO triggers (recipient_id, hour, minute, timezone, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(recipient_id) DO UPDATE SET
                hour = excluded.hour, minute = excluded.minute,
                timezone = excluded.timezone, payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![
                trigger.recipient.get(),
                trigger.hour,
                trigger.minute,
                trigger.timezone,
                payload,
                now
            ],
        )?;
        info!(recipient = %trigger.recipient, tz = %trigger.timezone, "trigger persisted");
        Ok(())
    }

    fn remove_trigger(&self, recipient: RecipientId) -> Result<bool> {
        let n = self
            .conn()
            .execute("DELETE FROM triggers WHERE recipient_id = ?1", [recipient.get()])?;
        Ok(n > 0)
    }

    fn load_triggers(&self) -> Result<Vec<Trigger>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT recipient_id, hour, minute, timezone, payload
             FROM triggers ORDER BY recipient_id",
        )?;
        let rows: Vec<(i64, u8, u8, String, String)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?, // recipient_id
                    row.get(1)?, // hour
                    row.get(2)?, // minute
                    row.get(3)?, // timezone
                    row.get(4)?, // payload JSON
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut triggers = Vec::with_capacity(rows.len());
        for (id, hour, minute, timezone, payload_json) in rows {
            let payload: TriggerPayload = match serde_json::from_str(&payload_json) {
                Ok(p) => p,
                Err(e) => {
                    warn!(recipient = id, "skipping trigger with bad payload JSON: {e}");
                    continue;
                }
            };
            if payload.recipient.get() != id {
                warn!(
                    recipient = id,
                    payload_recipient = %payload.recipient,
                    "skipping trigger whose payload belongs to another recipient"
                );
                continue;
            }
            triggers.push(Trigger {
                recipient: RecipientId(id),
                hour,
                minute,
                timezone,
                payload,
            });
        }
        Ok(triggers)
    }
}
