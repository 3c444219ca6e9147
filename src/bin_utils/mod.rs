//! Drives a [`Bank`] over an [`InMemoryStore`] from a CSV script and prints the
//! resulting accounts. Used by the `pix-ledger` binary and the integration tests.

use std::{
    collections::BTreeMap,
    io::{Read, Write},
    sync::Arc,
};

use anyhow::Result;
use thiserror::Error;

use crate::{
    account::{AccountId, PixKey},
    command::{PixKeyRef, PixKeyType, RegisterCommand},
    config::LedgerConfig,
    processor::{Bank, ProcessError},
    store::in_memory_store::InMemoryStore,
};
use csv_parser::{CsvOperationParser, Operation, OperationKind};
use csv_printer::{AccountRow, print_accounts};

pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Malformed row: {0}")]
    Malformed(#[from] csv::Error),
    #[error("Column `{0}` is required for this operation")]
    MissingColumn(&'static str),
    #[error("Unknown account `{0}`")]
    UnknownLabel(String),
    #[error("Account `{0}` is already registered in this script")]
    DuplicateLabel(String),
    #[error("Account `{label}` holds no key {key}")]
    UnknownKey { label: String, key: PixKeyRef },
    #[error(transparent)]
    Process(#[from] ProcessError),
}

fn required<'a>(value: &'a Option<String>, column: &'static str) -> Result<&'a str, ScriptError> {
    value.as_deref().ok_or(ScriptError::MissingColumn(column))
}

fn key_type(op: &Operation) -> Result<PixKeyType, ScriptError> {
    required(&op.key_type, "key_type")?
        .parse::<PixKeyType>()
        .map_err(|err| ScriptError::Process(ProcessError::from(err)))
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: LedgerConfig,
    pub error_printer: Box<dyn FnMut(u64, ScriptError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub async fn run(mut self) -> Result<()> {
        let parser = CsvOperationParser::new(self.input);
        let bank = Bank::new(Arc::new(InMemoryStore::new()), self.config);
        let mut script = Script {
            bank: &bank,
            labels: BTreeMap::new(),
        };

        for (line, row) in parser {
            let outcome = match row {
                Ok(op) => script.execute(op).await,
                Err(err) => Err(err.into()),
            };
            if let Err(err) = outcome {
                (self.error_printer)(line, err);
            }
        }

        let mut rows = Vec::with_capacity(script.labels.len());
        for (label, id) in &script.labels {
            let account = bank.account(id).await?;
            rows.push(AccountRow {
                account: label.clone(),
                holder: account.holder().to_string(),
                balance: account.balance(),
                keys: account
                    .pix_keys()
                    .iter()
                    .map(|key| key.key_ref().to_string())
                    .collect::<Vec<_>>()
                    .join(";"),
                transactions: account.transactions().len(),
            });
        }
        print_accounts(self.output, rows.into_iter())
    }
}

struct Script<'b> {
    bank: &'b Bank,
    labels: BTreeMap<String, AccountId>,
}

impl Script<'_> {
    fn account(&self, label: &str) -> Result<&AccountId, ScriptError> {
        self.labels
            .get(label)
            .ok_or_else(|| ScriptError::UnknownLabel(label.to_string()))
    }

    async fn held_key(&self, op: &Operation) -> Result<PixKey, ScriptError> {
        let key = PixKeyRef::parse(key_type(op)?, required(&op.key, "key")?)
            .map_err(ProcessError::from)?;
        let account = self.bank.account(self.account(&op.account)?).await?;
        account
            .pix_keys()
            .iter()
            .find(|held| held.key_ref() == key)
            .cloned()
            .ok_or_else(|| ScriptError::UnknownKey {
                label: op.account.clone(),
                key,
            })
    }

    async fn execute(&mut self, op: Operation) -> Result<(), ScriptError> {
        match op.op {
            OperationKind::Register => {
                if self.labels.contains_key(&op.account) {
                    return Err(ScriptError::DuplicateLabel(op.account));
                }
                let command = RegisterCommand::new(
                    required(&op.text, "text")?,
                    required(&op.key, "key")?,
                    required(&op.password, "password")?,
                    op.amount,
                )
                .map_err(ProcessError::from)?;
                let account = self.bank.register(command).await?;
                self.labels.insert(op.account, account.id().clone());
            }
            OperationKind::Transfer => {
                let target = self.account(required(&op.target, "target")?)?;
                let amount = op.amount.ok_or(ScriptError::MissingColumn("amount"))?;
                self.bank
                    .transfer(
                        self.account(&op.account)?,
                        target,
                        amount,
                        op.text.as_deref().unwrap_or_default(),
                    )
                    .await?;
            }
            OperationKind::PixTransfer => {
                let amount = op.amount.ok_or(ScriptError::MissingColumn("amount"))?;
                self.bank
                    .transfer_to_key(
                        self.account(&op.account)?,
                        key_type(&op)?,
                        required(&op.key, "key")?,
                        amount,
                        op.text.as_deref().unwrap_or_default(),
                    )
                    .await?;
            }
            OperationKind::AddKey => {
                self.bank
                    .add_key(
                        self.account(&op.account)?,
                        key_type(&op)?,
                        required(&op.key, "key")?,
                    )
                    .await?;
            }
            OperationKind::EditKey => {
                let key = self.held_key(&op).await?;
                self.bank
                    .edit_key(self.account(&op.account)?, key.id, required(&op.text, "text")?)
                    .await?;
            }
            OperationKind::RemoveKey => {
                let key = self.held_key(&op).await?;
                self.bank
                    .remove_key(self.account(&op.account)?, key.id)
                    .await?;
            }
        }
        Ok(())
    }
}
