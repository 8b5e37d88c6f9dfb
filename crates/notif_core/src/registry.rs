use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StorageError;
use crate::id_list::IdList;
use crate::store::{PersistentStore, StoreEdit};

const SCHEDULED_IDS: &str = "schedule.ids";
const ENTRY_PREFIX: &str = "schedule.entry.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// The id was already scheduled; carries the record that stays in place.
    AlreadyPresent(String),
}

/// Durable record of which notification ids are scheduled and what they contain.
///
/// Every read-modify-write of the id list runs under one lock and commits the
/// id list together with the entry it belongs to.
pub struct ScheduleRegistry {
    store: Arc<dyn PersistentStore>,
    ids: Mutex<IdList>,
}

impl ScheduleRegistry {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        let ids = store
            .get_text(SCHEDULED_IDS)
            .map(|encoded| IdList::parse(&encoded))
            .unwrap_or_default();
        tracing::debug!(count = ids.len(), "loaded scheduled notification ids");
        Self {
            store,
            ids: Mutex::new(ids),
        }
    }

    pub fn register(&self, id: i32, packed: &str) -> Result<Registration, StorageError> {
        let mut ids = self.ids.lock();
        if let Some(existing) = self.store.get_text(&entry_key(id)) {
            if !ids.contains(id) {
                let mut next = ids.clone();
                next.insert(id);
                self.store.apply(vec![ids_edit(&next)])?;
                *ids = next;
            }
            return Ok(Registration::AlreadyPresent(existing));
        }

        let mut next = ids.clone();
        next.insert(id);
        self.store.apply(vec![
            StoreEdit::put_text(entry_key(id), packed),
            ids_edit(&next),
        ])?;
        *ids = next;
        Ok(Registration::Added)
    }

    pub fn replace(&self, id: i32, packed: &str) -> Result<(), StorageError> {
        let mut ids = self.ids.lock();
        let mut next = ids.clone();
        next.insert(id);
        self.store.apply(vec![
            StoreEdit::put_text(entry_key(id), packed),
            ids_edit(&next),
        ])?;
        *ids = next;
        Ok(())
    }

    /// Returns whether anything was removed.
    pub fn unregister(&self, id: i32) -> Result<bool, StorageError> {
        let mut ids = self.ids.lock();
        let has_entry = self.store.get(&entry_key(id)).is_some();
        if !ids.contains(id) && !has_entry {
            return Ok(false);
        }

        let mut next = ids.clone();
        next.remove(id);
        self.store
            .apply(vec![StoreEdit::remove(entry_key(id)), ids_edit(&next)])?;
        *ids = next;
        Ok(true)
    }

    pub fn list_ids(&self) -> Vec<i32> {
        self.ids.lock().ids().to_vec()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn get(&self, id: i32) -> Option<String> {
        self.store.get_text(&entry_key(id))
    }
}

fn entry_key(id: i32) -> String {
    format!("{ENTRY_PREFIX}{id}")
}

fn ids_edit(ids: &IdList) -> StoreEdit {
    if ids.is_empty() {
        StoreEdit::remove(SCHEDULED_IDS)
    } else {
        StoreEdit::put_text(SCHEDULED_IDS, ids.encode())
    }
}
