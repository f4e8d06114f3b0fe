//! `rainbot-store`: durable recipient state: locations and daily triggers.
//!
//! The [`Store`] trait is the whole capability set the rest of the workspace
//! needs. Each backing technology gets one implementation; [`open_store`]
//! picks one from [`DatabaseConfig::backend`].
//!
//! | Backend  | Type            | Survives restart |
//! |----------|-----------------|------------------|
//! | `sqlite` | [`SqliteStore`] | yes              |
//! | `memory` | [`MemoryStore`] | no               |

pub mod db;
pub mod error;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use rainbot_core::config::{DatabaseConfig, StoreBackend};
use rainbot_core::types::{Location, RecipientId, Trigger};
use tracing::info;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistence capabilities for locations (geo store) and triggers
/// (schedule store).
///
/// Writes are upserts keyed by recipient: a second write for the same
/// recipient replaces the first.
pub trait Store: Send + Sync {
    fn get_location(&self, recipient: RecipientId) -> Result<Option<Location>>;

    fn set_location(&self, recipient: RecipientId, location: Location) -> Result<()>;

    fn upsert_trigger(&self, trigger: &Trigger) -> Result<()>;

    /// Returns whether a trigger existed.
    fn remove_trigger(&self, recipient: RecipientId) -> Result<bool>;

    fn load_triggers(&self) -> Result<Vec<Trigger>>;
}

/// Namespaced key a recipient's location is stored under.
pub fn location_key(prefix: &str, recipient: RecipientId) -> String {
    format!("{prefix}:geo:{recipient}")
}

/// Open the backend selected in `config`.
pub fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Sqlite => {
            info!(path = %config.path, "opening SQLite store");
            Ok(Arc::new(SqliteStore::open(&config.path, &config.prefix)?))
        }
        StoreBackend::Memory => {
            info!("using in-memory store; state is lost on restart");
            Ok(Arc::new(MemoryStore::new(&config.prefix)))
        }
    }
}
