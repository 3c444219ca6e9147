use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    account::{AccountId, Transaction, TransactionId},
    command::{PixKeyRef, PixKeyType, TransferCommand},
    store::{RecordWrite, WriteBatch},
};

use super::{Bank, ProcessError, locks::LockKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transaction_id: TransactionId,
    pub timestamp: DateTime<Utc>,
    pub source_balance: Decimal,
    pub destination_balance: Decimal,
}

impl Bank {
    pub async fn transfer(
        &self,
        source: &AccountId,
        destination: &AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt, ProcessError> {
        self.try_transfer(source, destination, amount, description)
            .await
            .inspect_err(|err| warn!(%source, %destination, %amount, "Transfer rejected: {err}"))
    }

    /// Resolves the recipient through the key directory, then transfers.
    pub async fn transfer_to_key(
        &self,
        source: &AccountId,
        kind: PixKeyType,
        value: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt, ProcessError> {
        let key = PixKeyRef::parse(kind, value)
            .map_err(ProcessError::from)
            .inspect_err(|err| warn!(%source, %kind, value, "PIX transfer rejected: {err}"))?;
        let recipient = self
            .resolve(&key)
            .await
            .map_err(|err| match err {
                ProcessError::KeyNotRegistered(key) => ProcessError::RecipientNotFound(key),
                err => err,
            })
            .inspect_err(|err| warn!(%source, %key, "PIX transfer rejected: {err}"))?;
        debug!(%key, recipient = %recipient.id(), "PIX key resolved");
        self.transfer(source, recipient.id(), amount, description)
            .await
    }

    async fn try_transfer(
        &self,
        source: &AccountId,
        destination: &AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<TransferReceipt, ProcessError> {
        let command = TransferCommand::new(
            source.clone(),
            destination.clone(),
            amount,
            description,
            self.config.description_max_len,
        )?;
        self.execute_transfer(command).await
    }

    /// Both account records are written by one conditional commit, so either
    /// both legs are visible or neither is.
    async fn execute_transfer(
        &self,
        command: TransferCommand,
    ) -> Result<TransferReceipt, ProcessError> {
        let _locks = self
            .locks
            .acquire([
                LockKey::Account(command.source.clone()),
                LockKey::Account(command.destination.clone()),
            ])
            .await;

        let source = self.load(&command.source).await?;
        let destination = self.load(&command.destination).await?;

        let transaction_id = Uuid::new_v4();
        let timestamp = Utc::now();
        let (sent, received) = Transaction::pair(
            transaction_id,
            timestamp,
            command.amount,
            &command.description,
            source.record.holder(),
            destination.record.holder(),
        );
        let debit = source.record.handle_send(sent)?;
        let credit = destination.record.handle_receive(received)?;

        let mut debited = source.record;
        debited.apply(&debit);
        let mut credited = destination.record;
        credited.apply(&credit);

        let receipt = TransferReceipt {
            transaction_id,
            timestamp,
            source_balance: debited.balance(),
            destination_balance: credited.balance(),
        };
        let batch = WriteBatch::default()
            .write(RecordWrite::Update {
                expected: source.version,
                account: debited,
            })
            .write(RecordWrite::Update {
                expected: destination.version,
                account: credited,
            });
        self.round_trip("commit transfer", self.store.commit(batch))
            .await?;

        info!(
            %transaction_id,
            source = %command.source,
            destination = %command.destination,
            amount = %command.amount,
            "Transfer committed"
        );
        Ok(receipt)
    }
}
