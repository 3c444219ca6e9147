use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    account::{Account, AccountId},
    command::PixKeyRef,
};

use super::{DocumentStore, RecordWrite, StoreError, Versioned, WriteBatch};

#[derive(Default)]
struct Collections {
    accounts: HashMap<AccountId, Versioned<Account>>,
    national_ids: HashMap<String, AccountId>,
    pix_keys: HashMap<PixKeyRef, AccountId>,
}

impl Collections {
    fn check(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        for write in &batch.writes {
            match write {
                RecordWrite::Create(account) => {
                    if self.accounts.contains_key(account.id()) {
                        return Err(StoreError::DuplicateRecord(account.id().clone()));
                    }
                    if self.national_ids.contains_key(account.national_id()) {
                        return Err(StoreError::NationalIdTaken);
                    }
                }
                RecordWrite::Update { expected, account } => {
                    let stored = self
                        .accounts
                        .get(account.id())
                        .ok_or_else(|| StoreError::MissingRecord(account.id().clone()))?;
                    if stored.version != *expected {
                        return Err(StoreError::VersionMismatch(account.id().clone()));
                    }
                }
            }
        }
        let released: HashSet<&PixKeyRef> = batch.releases.iter().collect();
        let mut claimed = HashSet::new();
        for (key, _) in &batch.claims {
            let taken = self.pix_keys.contains_key(key) && !released.contains(key);
            if taken || !claimed.insert(key) {
                return Err(StoreError::KeyClaimed(key.clone()));
            }
        }
        Ok(())
    }

    fn apply(&mut self, batch: WriteBatch) {
        for write in batch.writes {
            match write {
                RecordWrite::Create(account) => {
                    self.national_ids
                        .insert(account.national_id().to_string(), account.id().clone());
                    self.accounts.insert(
                        account.id().clone(),
                        Versioned {
                            version: 1,
                            record: account,
                        },
                    );
                }
                RecordWrite::Update { expected, account } => {
                    self.accounts.insert(
                        account.id().clone(),
                        Versioned {
                            version: expected + 1,
                            record: account,
                        },
                    );
                }
            }
        }
        for key in batch.releases {
            self.pix_keys.remove(&key);
        }
        for (key, owner) in batch.claims {
            self.pix_keys.insert(key, owner);
        }
    }
}

/// Process-local [`DocumentStore`], with switches to simulate an unreachable or slow backend.
#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<Collections>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    async fn round_trip(&self) -> Result<(), StoreError> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }

    fn collections(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, id: &AccountId) -> Result<Option<Versioned<Account>>, StoreError> {
        self.round_trip().await?;
        let collections = self.collections()?;
        Ok(collections.accounts.get(id).cloned())
    }

    async fn find_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<Versioned<Account>>, StoreError> {
        self.round_trip().await?;
        let collections = self.collections()?;
        Ok(collections
            .national_ids
            .get(national_id)
            .and_then(|id| collections.accounts.get(id))
            .cloned())
    }

    async fn resolve_key(&self, key: &PixKeyRef) -> Result<Option<AccountId>, StoreError> {
        self.round_trip().await?;
        let collections = self.collections()?;
        Ok(collections.pix_keys.get(key).cloned())
    }

    async fn accounts(&self) -> Result<Vec<Versioned<Account>>, StoreError> {
        self.round_trip().await?;
        let collections = self.collections()?;
        Ok(collections.accounts.values().cloned().collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.round_trip().await?;
        let mut collections = self.collections()?;
        collections.check(&batch)?;
        collections.apply(batch);
        Ok(())
    }
}
