use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use rainbot_core::types::{Location, RecipientId, Trigger};

use crate::error::Result;
use crate::{location_key, Store};

/// Process-local store. Used for tests and for running without a database.
pub struct MemoryStore {
    prefix: String,
    locations: Mutex<HashMap<String, Location>>,
    triggers: Mutex<BTreeMap<RecipientId, Trigger>>,
}

impl MemoryStore {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            locations: Mutex::new(HashMap::new()),
            triggers: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(rainbot_core::config::DEFAULT_KEY_PREFIX)
    }
}

impl Store for MemoryStore {
    fn get_location(&self, recipient: RecipientId) -> Result<Option<Location>> {
        let key = location_key(&self.prefix, recipient);
        let map = self.locations.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(&key).copied())
    }

    fn set_location(&self, recipient: RecipientId, location: Location) -> Result<()> {
        let key = location_key(&self.prefix, recipient);
        self.locations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, location);
        Ok(())
    }

    fn upsert_trigger(&self, trigger: &Trigger) -> Result<()> {
        self.triggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(trigger.recipient, trigger.clone());
        Ok(())
    }

    fn remove_trigger(&self, recipient: RecipientId) -> Result<bool> {
        Ok(self
            .triggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&recipient)
            .is_some())
    }

    fn load_triggers(&self) -> Result<Vec<Trigger>> {
        let map = self.triggers.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.values().cloned().collect())
    }
}
