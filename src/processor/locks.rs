use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{account::AccountId, command::PixKeyRef};

/// Resource guarded by the lock table.
///
/// The derived order is the acquisition order: accounts before key claims before
/// national ids. An operation that needs a second [`LockSet`] may only ask for
/// keys ordered after everything it already holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Account(AccountId),
    PixKey(PixKeyRef),
    NationalId(String),
}

type Slots = Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>;

#[derive(Default)]
pub struct LockTable {
    slots: Slots,
}

impl LockTable {
    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> LockSet {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        // Slots are recorded before they are awaited, so a cancelled acquire
        // still prunes what it inserted.
        let mut set = LockSet {
            guards: Vec::with_capacity(keys.len()),
            keys: Vec::with_capacity(keys.len()),
            slots: self.slots.clone(),
        };
        for key in keys {
            let slot = {
                let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
                slots.entry(key.clone()).or_default().clone()
            };
            set.keys.push(key);
            set.guards.push(slot.lock_owned().await);
        }
        set
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Held locks; released on drop, idle slots are pruned from the table.
pub struct LockSet {
    guards: Vec<OwnedMutexGuard<()>>,
    keys: Vec<LockKey>,
    slots: Slots,
}

impl Drop for LockSet {
    fn drop(&mut self) {
        self.guards.clear();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            if let Some(slot) = slots.get(key)
                && Arc::strong_count(slot) == 1
            {
                slots.remove(key);
            }
        }
    }
}
