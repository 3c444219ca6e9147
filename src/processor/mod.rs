use std::{future::Future, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    account::{Account, AccountError, AccountId},
    command::{CommandError, PixKeyRef},
    config::LedgerConfig,
    credential::CredentialError,
    store::{DocumentStore, StoreError, Versioned},
};

pub mod directory;
pub mod ledger;
pub mod locks;
pub mod registry;

use locks::LockTable;

/// Failure category of a [`ProcessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    /// Store unreachable or slow. The outcome of a write is unknown, re-read before retrying.
    Transient,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    CommandErr(#[from] CommandError),
    #[error(transparent)]
    AccountErr(#[from] AccountError),
    #[error(transparent)]
    CredentialErr(#[from] CredentialError),
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),
    #[error("PIX key {0} is not registered")]
    KeyNotRegistered(PixKeyRef),
    #[error("No recipient account for PIX key {0}")]
    RecipientNotFound(PixKeyRef),
    #[error("PIX key {0} is already registered")]
    KeyAlreadyRegistered(PixKeyRef),
    #[error("National id is already registered")]
    NationalIdTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Store call `{operation}` timed out after {timeout:?}, outcome unknown")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error(transparent)]
    StoreErr(StoreError),
}

impl From<StoreError> for ProcessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyClaimed(key) => ProcessError::KeyAlreadyRegistered(key),
            StoreError::NationalIdTaken => ProcessError::NationalIdTaken,
            // accounts are never deleted, a missing record was never there
            StoreError::MissingRecord(id) => ProcessError::AccountNotFound(id),
            err => ProcessError::StoreErr(err),
        }
    }
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::CommandErr(CommandError::SelfTransfer) => ErrorKind::Conflict,
            ProcessError::CommandErr(_) => ErrorKind::InvalidInput,
            ProcessError::AccountErr(AccountError::KeyNotFound(_)) => ErrorKind::NotFound,
            ProcessError::AccountErr(AccountError::BalanceOverflow { .. }) => {
                ErrorKind::InvalidInput
            }
            ProcessError::AccountErr(_) => ErrorKind::Conflict,
            ProcessError::AccountNotFound(_)
            | ProcessError::KeyNotRegistered(_)
            | ProcessError::RecipientNotFound(_) => ErrorKind::NotFound,
            ProcessError::KeyAlreadyRegistered(_) | ProcessError::NationalIdTaken => {
                ErrorKind::Conflict
            }
            ProcessError::InvalidCredentials => ErrorKind::InvalidInput,
            ProcessError::StoreErr(StoreError::DuplicateRecord(_)) => ErrorKind::Conflict,
            ProcessError::CredentialErr(_)
            | ProcessError::Timeout { .. }
            | ProcessError::StoreErr(_) => ErrorKind::Transient,
        }
    }

    /// Human readable category shown to the end user.
    pub fn reason(&self) -> &'static str {
        match self {
            ProcessError::CommandErr(err) => match err {
                CommandError::InvalidAmount(_) | CommandError::NegativeOpeningBalance => {
                    "invalid amount"
                }
                CommandError::SelfTransfer => "invalid recipient",
                CommandError::DescriptionTooLong { .. } => "invalid description",
                CommandError::UnknownKeyType(_) | CommandError::InvalidKeyValue { .. } => {
                    "invalid key"
                }
                CommandError::InvalidNationalId => "invalid national id",
                CommandError::EmptyHolderName => "invalid holder name",
                CommandError::WeakPassword => "weak password",
            },
            ProcessError::AccountErr(err) => match err {
                AccountError::InsufficientFunds => "insufficient funds",
                AccountError::BalanceOverflow { .. } => "invalid amount",
                AccountError::DuplicateKey(_) => "key already registered",
                AccountError::KeyNotFound(_) => "key not found",
            },
            ProcessError::AccountNotFound(_) | ProcessError::RecipientNotFound(_) => {
                "account not found"
            }
            ProcessError::KeyNotRegistered(_) => "key not found",
            ProcessError::KeyAlreadyRegistered(_) => "key already registered",
            ProcessError::NationalIdTaken => "national id already registered",
            ProcessError::InvalidCredentials => "invalid credentials",
            ProcessError::Timeout { .. } => "request timed out",
            ProcessError::CredentialErr(_) | ProcessError::StoreErr(_) => "service unavailable",
        }
    }
}

/// Account ledger, PIX key directory and registry over one [`DocumentStore`].
///
/// Conflicting operations are serialized through an in-process [`LockTable`];
/// every mutation lands in the store as a single conditional commit.
pub struct Bank {
    store: Arc<dyn DocumentStore>,
    locks: LockTable,
    config: LedgerConfig,
}

impl Bank {
    pub fn new(store: Arc<dyn DocumentStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            locks: LockTable::default(),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    async fn round_trip<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ProcessError> {
        let timeout = self.config.store_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProcessError::Timeout { operation, timeout }),
        }
    }

    async fn load(&self, id: &AccountId) -> Result<Versioned<Account>, ProcessError> {
        self.round_trip("get account", self.store.get(id))
            .await?
            .ok_or_else(|| ProcessError::AccountNotFound(id.clone()))
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::{
        io,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tracing::subscriber::DefaultGuard;

    use crate::{
        account::{Account, AccountId},
        command::PixKeyRef,
        config::LedgerConfig,
        credential::Credential,
        store::{
            DocumentStore, RecordWrite, StoreError, Versioned, WriteBatch,
            in_memory_store::InMemoryStore,
        },
    };

    use super::Bank;

    pub fn bank() -> (Bank, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let config = LedgerConfig {
            store_timeout_ms: 100,
            ..LedgerConfig::default()
        };
        (Bank::new(store.clone(), config), store)
    }

    /// Stores an account directly, skipping the password hashing of registration.
    pub async fn seed(
        store: &InMemoryStore,
        holder: &str,
        national_id: &str,
        balance: u32,
    ) -> Account {
        let account = Account::open(
            holder,
            national_id,
            Credential::from_stored("unused"),
            Decimal::from(balance),
        );
        store
            .commit(WriteBatch::default().write(RecordWrite::Create(account.clone())))
            .await
            .unwrap();
        account
    }

    /// Applies commits, then stalls before acknowledging them.
    pub struct SlowCommits {
        pub inner: Arc<InMemoryStore>,
        pub delay: Duration,
    }

    #[async_trait]
    impl DocumentStore for SlowCommits {
        async fn get(&self, id: &AccountId) -> Result<Option<Versioned<Account>>, StoreError> {
            self.inner.get(id).await
        }

        async fn find_by_national_id(
            &self,
            national_id: &str,
        ) -> Result<Option<Versioned<Account>>, StoreError> {
            self.inner.find_by_national_id(national_id).await
        }

        async fn resolve_key(&self, key: &PixKeyRef) -> Result<Option<AccountId>, StoreError> {
            self.inner.resolve_key(key).await
        }

        async fn accounts(&self) -> Result<Vec<Versioned<Account>>, StoreError> {
            self.inner.accounts().await
        }

        async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
            self.inner.commit(batch).await?;
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    pub fn bank_with_slow_commits() -> (Bank, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let slow = SlowCommits {
            inner: store.clone(),
            delay: Duration::from_millis(500),
        };
        let config = LedgerConfig {
            store_timeout_ms: 100,
            ..LedgerConfig::default()
        };
        (Bank::new(Arc::new(slow), config), store)
    }

    #[derive(Clone, Default)]
    pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Routes this thread's events into a buffer until the guard drops.
    pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
        let buffer = LogBuffer::default();
        let make_writer = {
            let buffer = buffer.clone();
            move || buffer.clone()
        };
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(make_writer)
            .finish();
        (buffer, tracing::subscriber::set_default(subscriber))
    }
}
