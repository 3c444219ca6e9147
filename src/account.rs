use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    command::{PixKeyRef, PixKeyType},
    credential::Credential,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type KeyId = Uuid;
pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub direction: Direction,
    pub description: String,
    pub counterparty: String,
}

impl Transaction {
    /// Both legs of one transfer: the SENT record for the source and the RECEIVED
    /// record for the destination, sharing id, timestamp, amount and description.
    pub fn pair(
        id: TransactionId,
        timestamp: DateTime<Utc>,
        amount: Decimal,
        description: &str,
        source_holder: &str,
        destination_holder: &str,
    ) -> (Self, Self) {
        let sent = Self {
            id,
            timestamp,
            amount,
            direction: Direction::Sent,
            description: description.to_string(),
            counterparty: destination_holder.to_string(),
        };
        let received = Self {
            direction: Direction::Received,
            counterparty: source_holder.to_string(),
            ..sent.clone()
        };
        (sent, received)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PixKey {
    pub id: KeyId,
    #[serde(rename = "type")]
    pub kind: PixKeyType,
    pub value: String,
}

impl PixKey {
    pub fn key_ref(&self) -> PixKeyRef {
        PixKeyRef {
            kind: self.kind,
            value: self.value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    Sent(Transaction),
    Received(Transaction),
    KeyAdded(PixKey),
    KeyEdited { key_id: KeyId, value: String },
    KeyRemoved(KeyId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Crediting {amount} would overflow the balance")]
    BalanceOverflow { amount: Decimal },
    #[error("Account already holds PIX key {0}")]
    DuplicateKey(PixKeyRef),
    #[error("PIX key {0} not found on account")]
    KeyNotFound(KeyId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    holder: String,
    national_id: String,
    credential: Credential,
    balance: Decimal,
    transactions: Vec<Transaction>,
    pix_keys: Vec<PixKey>,
}

impl Account {
    pub fn open(holder: &str, national_id: &str, credential: Credential, balance: Decimal) -> Self {
        Self {
            id: AccountId::generate(),
            holder: holder.to_string(),
            national_id: national_id.to_string(),
            credential,
            balance,
            transactions: Vec::new(),
            pix_keys: Vec::new(),
        }
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn national_id(&self) -> &str {
        &self.national_id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Newest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn pix_keys(&self) -> &[PixKey] {
        &self.pix_keys
    }

    pub fn key(&self, key_id: KeyId) -> Option<&PixKey> {
        self.pix_keys.iter().find(|key| key.id == key_id)
    }

    fn holds(&self, key: &PixKeyRef) -> Option<&PixKey> {
        self.pix_keys
            .iter()
            .find(|own| own.kind == key.kind && own.value == key.value)
    }

    pub fn apply(&mut self, event: &AccountEvent) {
        match event {
            AccountEvent::Sent(tx) => {
                self.balance -= tx.amount;
                self.transactions.insert(0, tx.clone());
            }
            AccountEvent::Received(tx) => {
                self.balance += tx.amount;
                self.transactions.insert(0, tx.clone());
            }
            AccountEvent::KeyAdded(key) => {
                self.pix_keys.push(key.clone());
            }
            AccountEvent::KeyEdited { key_id, value } => {
                if let Some(key) = self.pix_keys.iter_mut().find(|key| key.id == *key_id) {
                    key.value = value.clone();
                }
            }
            AccountEvent::KeyRemoved(key_id) => {
                self.pix_keys.retain(|key| key.id != *key_id);
            }
        }
    }

    pub fn handle_send(&self, tx: Transaction) -> Result<AccountEvent, AccountError> {
        if self.balance >= tx.amount {
            Ok(AccountEvent::Sent(tx))
        } else {
            Err(AccountError::InsufficientFunds)
        }
    }

    pub fn handle_receive(&self, tx: Transaction) -> Result<AccountEvent, AccountError> {
        match self.balance.checked_add(tx.amount) {
            Some(_) => Ok(AccountEvent::Received(tx)),
            None => Err(AccountError::BalanceOverflow { amount: tx.amount }),
        }
    }

    pub fn handle_add_key(&self, key: PixKey) -> Result<AccountEvent, AccountError> {
        let key_ref = key.key_ref();
        if self.holds(&key_ref).is_some() {
            return Err(AccountError::DuplicateKey(key_ref));
        }
        Ok(AccountEvent::KeyAdded(key))
    }

    /// Type and id of the key are kept, only the value changes.
    pub fn handle_edit_key(
        &self,
        key_id: KeyId,
        value: String,
    ) -> Result<AccountEvent, AccountError> {
        let key = self.key(key_id).ok_or(AccountError::KeyNotFound(key_id))?;
        let key_ref = PixKeyRef {
            kind: key.kind,
            value,
        };
        if self.holds(&key_ref).is_some_and(|other| other.id != key_id) {
            return Err(AccountError::DuplicateKey(key_ref));
        }
        Ok(AccountEvent::KeyEdited {
            key_id,
            value: key_ref.value,
        })
    }

    pub fn handle_remove_key(&self, key_id: KeyId) -> Result<AccountEvent, AccountError> {
        match self.key(key_id) {
            Some(_) => Ok(AccountEvent::KeyRemoved(key_id)),
            None => Err(AccountError::KeyNotFound(key_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::prelude::Zero;

    use super::*;

    fn account(balance: u32) -> Account {
        Account::open(
            "Ana",
            "12345678901",
            Credential::from_stored("not-a-real-hash"),
            Decimal::from(balance),
        )
    }

    fn transfer_pair(amount: u32) -> (Transaction, Transaction) {
        Transaction::pair(
            Uuid::new_v4(),
            Utc::now(),
            Decimal::from(amount),
            "rent",
            "Ana",
            "Bruno",
        )
    }

    fn pix_key(kind: PixKeyType, value: &str) -> PixKey {
        PixKey {
            id: Uuid::new_v4(),
            kind,
            value: value.to_string(),
        }
    }

    #[test]
    fn transaction_pair_shares_identity() {
        let (sent, received) = transfer_pair(300);
        assert_eq!(sent.id, received.id);
        assert_eq!(sent.timestamp, received.timestamp);
        assert_eq!(sent.amount, received.amount);
        assert_eq!(sent.description, received.description);
        assert_eq!(sent.direction, Direction::Sent);
        assert_eq!(sent.counterparty, "Bruno");
        assert_eq!(received.direction, Direction::Received);
        assert_eq!(received.counterparty, "Ana");
    }

    #[test]
    fn apply_events() {
        let mut acc = account(1000);
        let (sent, received) = transfer_pair(300);
        acc.apply(&AccountEvent::Sent(sent.clone()));
        assert_eq!(acc.balance(), Decimal::from(700));
        acc.apply(&AccountEvent::Received(received.clone()));
        assert_eq!(acc.balance(), Decimal::from(1000));
        // newest first
        assert_eq!(acc.transactions(), &[received, sent]);

        let key = pix_key(PixKeyType::Phone, "11987654321");
        acc.apply(&AccountEvent::KeyAdded(key.clone()));
        assert_eq!(acc.pix_keys(), &[key.clone()]);
        acc.apply(&AccountEvent::KeyEdited {
            key_id: key.id,
            value: "11912345678".to_string(),
        });
        assert_eq!(acc.key(key.id).unwrap().value, "11912345678");
        assert_eq!(acc.key(key.id).unwrap().kind, PixKeyType::Phone);
        acc.apply(&AccountEvent::KeyRemoved(key.id));
        assert!(acc.pix_keys().is_empty());
    }

    #[test]
    fn handle_send() {
        let mut acc = account(100);
        let (sent, _) = transfer_pair(500);
        let err = acc.handle_send(sent).unwrap_err();
        assert_eq!(err, AccountError::InsufficientFunds);
        assert_eq!(err.to_string(), "Insufficient funds");

        // exact balance is allowed
        let (sent, _) = transfer_pair(100);
        let evt = acc.handle_send(sent).unwrap();
        acc.apply(&evt);
        assert_eq!(acc.balance(), Decimal::zero());
    }

    #[test]
    fn handle_receive_overflow() {
        let acc = Account::open(
            "Ana",
            "12345678901",
            Credential::from_stored("x"),
            Decimal::MAX,
        );
        let (_, received) = transfer_pair(1);
        assert!(matches!(
            acc.handle_receive(received),
            Err(AccountError::BalanceOverflow { .. })
        ));
    }

    #[test]
    fn handle_key_commands() {
        let mut acc = account(0);
        let cpf = pix_key(PixKeyType::NationalId, "12345678901");
        let evt = acc.handle_add_key(cpf.clone()).unwrap();
        acc.apply(&evt);

        // same pair twice on one account
        let err = acc
            .handle_add_key(pix_key(PixKeyType::NationalId, "12345678901"))
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateKey(_)));
        // same digits, other type is a different key
        let phone = pix_key(PixKeyType::Phone, "12345678901");
        let evt = acc.handle_add_key(phone.clone()).unwrap();
        acc.apply(&evt);

        let other = pix_key(PixKeyType::Phone, "11987654321");
        acc.apply(&acc.handle_add_key(other.clone()).unwrap());
        let err = acc
            .handle_edit_key(other.id, "12345678901".to_string())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Account already holds PIX key PHONE:12345678901"
        );
        // editing to its current value is accepted
        assert!(acc.handle_edit_key(phone.id, phone.value.clone()).is_ok());

        let missing = Uuid::new_v4();
        assert_eq!(
            acc.handle_edit_key(missing, "11987654321".to_string()),
            Err(AccountError::KeyNotFound(missing))
        );
        assert_eq!(
            acc.handle_remove_key(missing),
            Err(AccountError::KeyNotFound(missing))
        );
        assert_eq!(
            acc.handle_remove_key(cpf.id),
            Ok(AccountEvent::KeyRemoved(cpf.id))
        );
    }
}
