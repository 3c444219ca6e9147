use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    account::{Account, AccountError, AccountId, KeyId, PixKey},
    command::{PixKeyRef, PixKeyType},
    store::{RecordWrite, WriteBatch},
};

use super::{Bank, ProcessError, locks::LockKey};

impl Bank {
    /// Owner of a key, looked up through the store's claim index.
    pub async fn resolve(&self, key: &PixKeyRef) -> Result<Account, ProcessError> {
        let owner = self
            .round_trip("resolve key", self.store.resolve_key(key))
            .await?
            .ok_or_else(|| ProcessError::KeyNotRegistered(key.clone()))?;
        Ok(self.load(&owner).await?.record)
    }

    async fn ensure_unclaimed(&self, key: &PixKeyRef) -> Result<(), ProcessError> {
        match self
            .round_trip("resolve key", self.store.resolve_key(key))
            .await?
        {
            Some(_) => Err(ProcessError::KeyAlreadyRegistered(key.clone())),
            None => Ok(()),
        }
    }

    /// Registers a key for the account. The key must not be held by any account.
    pub async fn add_key(
        &self,
        account_id: &AccountId,
        kind: PixKeyType,
        value: &str,
    ) -> Result<PixKey, ProcessError> {
        self.insert_key(account_id, kind, value)
            .await
            .inspect_err(|err| warn!(account = %account_id, %kind, value, "Key not added: {err}"))
    }

    async fn insert_key(
        &self,
        account_id: &AccountId,
        kind: PixKeyType,
        value: &str,
    ) -> Result<PixKey, ProcessError> {
        let key_ref = PixKeyRef::parse(kind, value)?;
        let _locks = self
            .locks
            .acquire([
                LockKey::Account(account_id.clone()),
                LockKey::PixKey(key_ref.clone()),
            ])
            .await;

        let account = self.load(account_id).await?;
        let key = PixKey {
            id: Uuid::new_v4(),
            kind,
            value: key_ref.value.clone(),
        };
        let event = account.record.handle_add_key(key.clone())?;
        self.ensure_unclaimed(&key_ref).await?;

        let mut updated = account.record;
        updated.apply(&event);
        let batch = WriteBatch::default()
            .write(RecordWrite::Update {
                expected: account.version,
                account: updated,
            })
            .claim(key_ref.clone(), account_id.clone());
        self.round_trip("commit key", self.store.commit(batch))
            .await?;

        info!(account = %account_id, key = %key_ref, key_id = %key.id, "PIX key added");
        Ok(key)
    }

    /// Replaces the value of a key, keeping its type and id.
    ///
    /// The new value must be free across all accounts, same as for [`Bank::add_key`].
    /// Editing a key to its current value succeeds without writing anything.
    pub async fn edit_key(
        &self,
        account_id: &AccountId,
        key_id: KeyId,
        value: &str,
    ) -> Result<PixKey, ProcessError> {
        self.replace_key_value(account_id, key_id, value)
            .await
            .inspect_err(|err| {
                warn!(account = %account_id, %key_id, value, "Key not edited: {err}")
            })
    }

    async fn replace_key_value(
        &self,
        account_id: &AccountId,
        key_id: KeyId,
        value: &str,
    ) -> Result<PixKey, ProcessError> {
        let _account_lock = self
            .locks
            .acquire([LockKey::Account(account_id.clone())])
            .await;
        let account = self.load(account_id).await?;
        let current = account
            .record
            .key(key_id)
            .cloned()
            .ok_or(AccountError::KeyNotFound(key_id))?;

        let new_ref = PixKeyRef::parse(current.kind, value)?;
        if new_ref.value == current.value {
            return Ok(current);
        }
        let old_ref = current.key_ref();
        let _key_locks = self
            .locks
            .acquire([
                LockKey::PixKey(old_ref.clone()),
                LockKey::PixKey(new_ref.clone()),
            ])
            .await;

        let event = account
            .record
            .handle_edit_key(key_id, new_ref.value.clone())?;
        self.ensure_unclaimed(&new_ref).await?;

        let mut updated = account.record;
        updated.apply(&event);
        let batch = WriteBatch::default()
            .write(RecordWrite::Update {
                expected: account.version,
                account: updated,
            })
            .release(old_ref.clone())
            .claim(new_ref.clone(), account_id.clone());
        self.round_trip("commit key", self.store.commit(batch))
            .await?;

        info!(account = %account_id, %key_id, from = %old_ref, to = %new_ref, "PIX key edited");
        Ok(PixKey {
            value: new_ref.value,
            ..current
        })
    }

    /// Removes a key and frees its value. `Ok(None)` when the account holds no such key.
    pub async fn remove_key(
        &self,
        account_id: &AccountId,
        key_id: KeyId,
    ) -> Result<Option<PixKey>, ProcessError> {
        let _account_lock = self
            .locks
            .acquire([LockKey::Account(account_id.clone())])
            .await;
        let account = self.load(account_id).await?;
        let Some(key) = account.record.key(key_id).cloned() else {
            return Ok(None);
        };
        let key_ref = key.key_ref();
        let _key_lock = self.locks.acquire([LockKey::PixKey(key_ref.clone())]).await;

        let event = account.record.handle_remove_key(key_id)?;
        let mut updated = account.record;
        updated.apply(&event);
        let batch = WriteBatch::default()
            .write(RecordWrite::Update {
                expected: account.version,
                account: updated,
            })
            .release(key_ref.clone());
        self.round_trip("commit key", self.store.commit(batch))
            .await?;

        info!(account = %account_id, key = %key_ref, "PIX key removed");
        Ok(Some(key))
    }
}
