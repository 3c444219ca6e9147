use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, prelude::Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::AccountId;

pub const NATIONAL_ID_DIGITS: usize = 11;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixKeyType {
    NationalId,
    Phone,
}

impl PixKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixKeyType::NationalId => "NATIONAL_ID",
            PixKeyType::Phone => "PHONE",
        }
    }

    /// Reduces raw input to its digits and checks the length allowed for this key type.
    pub fn canonicalize(&self, raw: &str) -> Result<String, CommandError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let valid = match self {
            PixKeyType::NationalId => digits.len() == NATIONAL_ID_DIGITS,
            PixKeyType::Phone => (10..=11).contains(&digits.len()),
        };
        if valid {
            Ok(digits)
        } else {
            Err(CommandError::InvalidKeyValue {
                kind: *self,
                value: raw.to_string(),
            })
        }
    }
}

impl fmt::Display for PixKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixKeyType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NATIONAL_ID" | "CPF" => Ok(PixKeyType::NationalId),
            "PHONE" => Ok(PixKeyType::Phone),
            _ => Err(CommandError::UnknownKeyType(s.to_string())),
        }
    }
}

/// A `(type, value)` pair with the value in canonical digits-only form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PixKeyRef {
    pub kind: PixKeyType,
    pub value: String,
}

impl PixKeyRef {
    pub fn parse(kind: PixKeyType, raw: &str) -> Result<Self, CommandError> {
        Ok(Self {
            kind,
            value: kind.canonicalize(raw)?,
        })
    }
}

impl fmt::Display for PixKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),
    #[error("Source and destination account cannot be the same")]
    SelfTransfer,
    #[error("Description is longer than {max} characters")]
    DescriptionTooLong { max: usize },
    #[error("Unknown PIX key type `{0}`")]
    UnknownKeyType(String),
    #[error("`{value}` is not a valid {kind} key")]
    InvalidKeyValue { kind: PixKeyType, value: String },
    #[error("National id must have exactly {} digits", NATIONAL_ID_DIGITS)]
    InvalidNationalId,
    #[error("Holder name must not be empty")]
    EmptyHolderName,
    #[error("Password must have at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
    #[error("Opening balance must not be negative")]
    NegativeOpeningBalance,
}

#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Decimal,
    pub description: String,
}

impl TransferCommand {
    pub fn new(
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
        description: impl Into<String>,
        description_max_len: usize,
    ) -> Result<Self, CommandError> {
        if amount <= Decimal::zero() {
            return Err(CommandError::InvalidAmount(amount));
        }
        if source == destination {
            return Err(CommandError::SelfTransfer);
        }
        let description = description.into().trim().to_string();
        if description.chars().count() > description_max_len {
            return Err(CommandError::DescriptionTooLong {
                max: description_max_len,
            });
        }
        Ok(Self {
            source,
            destination,
            amount,
            description,
        })
    }
}

#[derive(Clone)]
pub struct RegisterCommand {
    pub holder: String,
    pub national_id: String,
    pub password: String,
    pub opening_balance: Option<Decimal>,
}

// password stays out of logs
impl fmt::Debug for RegisterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterCommand")
            .field("holder", &self.holder)
            .field("national_id", &self.national_id)
            .field("opening_balance", &self.opening_balance)
            .finish_non_exhaustive()
    }
}

impl RegisterCommand {
    pub fn new(
        holder: &str,
        national_id: &str,
        password: &str,
        opening_balance: Option<Decimal>,
    ) -> Result<Self, CommandError> {
        let holder = holder.trim();
        if holder.is_empty() {
            return Err(CommandError::EmptyHolderName);
        }
        let national_id = canonical_national_id(national_id)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CommandError::WeakPassword);
        }
        if opening_balance.is_some_and(|balance| balance < Decimal::zero()) {
            return Err(CommandError::NegativeOpeningBalance);
        }
        Ok(Self {
            holder: holder.to_string(),
            national_id,
            password: password.to_string(),
            opening_balance,
        })
    }
}

pub fn canonical_national_id(raw: &str) -> Result<String, CommandError> {
    PixKeyType::NationalId
        .canonicalize(raw)
        .map_err(|_| CommandError::InvalidNationalId)
}
