use parking_lot::Mutex;

use crate::preferences::Preferences;

/// Hands out ids for notifications that arrive without one.
///
/// The counter lives only as long as the process: after a restart it starts
/// again from the persisted start id.
pub struct IdentifierAllocator {
    prefs: Preferences,
    next: Mutex<Option<i32>>,
}

impl IdentifierAllocator {
    pub fn new(prefs: Preferences) -> Self {
        Self {
            prefs,
            next: Mutex::new(None),
        }
    }

    pub fn reseed(&self, start_id: i32) {
        *self.next.lock() = Some(start_id);
    }

    pub fn next(&self) -> i32 {
        let mut next = self.next.lock();
        let current = *next.get_or_insert_with(|| self.prefs.start_id());
        if self.prefs.incremental_id() {
            *next = Some(current.wrapping_add(1));
        }
        current
    }
}
