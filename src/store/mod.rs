use async_trait::async_trait;
use thiserror::Error;

use crate::{
    account::{Account, AccountId},
    command::PixKeyRef,
};

pub mod in_memory_store;

pub type Version = u64;

/// A record together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: Version,
    pub record: T,
}

#[derive(Debug, Clone)]
pub enum RecordWrite {
    /// Insert a new account; fails if the id or the national id is taken.
    Create(Account),
    /// Replace an account; fails unless the stored version still matches.
    Update { expected: Version, account: Account },
}

/// All-or-nothing unit applied by [`DocumentStore::commit`].
///
/// Every write and claim is validated before anything is applied, so a batch
/// that fails leaves the store untouched.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub writes: Vec<RecordWrite>,
    /// Key index entries to create; fail if the pair is already claimed.
    pub claims: Vec<(PixKeyRef, AccountId)>,
    /// Key index entries to drop. Releases are applied before claims.
    pub releases: Vec<PixKeyRef>,
}

impl WriteBatch {
    pub fn write(mut self, write: RecordWrite) -> Self {
        self.writes.push(write);
        self
    }

    pub fn claim(mut self, key: PixKeyRef, owner: AccountId) -> Self {
        self.claims.push((key, owner));
        self
    }

    pub fn release(mut self, key: PixKeyRef) -> Self {
        self.releases.push(key);
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Account {0} was modified concurrently")]
    VersionMismatch(AccountId),
    #[error("Account {0} does not exist")]
    MissingRecord(AccountId),
    #[error("Account {0} already exists")]
    DuplicateRecord(AccountId),
    #[error("National id is already registered")]
    NationalIdTaken,
    #[error("PIX key {0} is already claimed")]
    KeyClaimed(PixKeyRef),
}

/// Document store holding one record per account, plus the key and national id indexes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: &AccountId) -> Result<Option<Versioned<Account>>, StoreError>;

    async fn find_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<Versioned<Account>>, StoreError>;

    async fn resolve_key(&self, key: &PixKeyRef) -> Result<Option<AccountId>, StoreError>;

    async fn accounts(&self) -> Result<Vec<Versioned<Account>>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
