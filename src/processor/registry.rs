use tracing::{info, warn};

use crate::{
    account::{Account, AccountId},
    command::{RegisterCommand, canonical_national_id},
    credential::{Credential, CredentialError},
    store::{RecordWrite, WriteBatch},
};

use super::{Bank, ProcessError, locks::LockKey};

impl Bank {
    /// Opens an account. Balance starts at the command's opening balance, or the
    /// configured initial balance when none is given.
    pub async fn register(&self, command: RegisterCommand) -> Result<Account, ProcessError> {
        let _locks = self
            .locks
            .acquire([LockKey::NationalId(command.national_id.clone())])
            .await;

        let existing = self
            .round_trip(
                "find national id",
                self.store.find_by_national_id(&command.national_id),
            )
            .await?;
        if existing.is_some() {
            return Err(ProcessError::NationalIdTaken);
        }

        // hashing blocks, run it on the blocking pool
        let password = command.password;
        let credential = tokio::task::spawn_blocking(move || Credential::derive(&password))
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))??;

        let balance = command
            .opening_balance
            .unwrap_or(self.config.initial_balance);
        let account = Account::open(&command.holder, &command.national_id, credential, balance);
        self.round_trip(
            "create account",
            self.store
                .commit(WriteBatch::default().write(RecordWrite::Create(account.clone()))),
        )
        .await?;

        info!(account = %account.id(), %balance, "Account registered");
        Ok(account)
    }

    /// Unknown national id and wrong password are reported the same way.
    pub async fn authenticate(
        &self,
        national_id: &str,
        password: &str,
    ) -> Result<Account, ProcessError> {
        let national_id =
            canonical_national_id(national_id).map_err(|_| ProcessError::InvalidCredentials)?;
        let account = self
            .round_trip(
                "find national id",
                self.store.find_by_national_id(&national_id),
            )
            .await?
            .ok_or(ProcessError::InvalidCredentials)?
            .record;

        let credential = account.credential().clone();
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || credential.verify(&password))
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))??;
        if verified {
            Ok(account)
        } else {
            warn!(account = %account.id(), "Rejected sign in");
            Err(ProcessError::InvalidCredentials)
        }
    }

    /// Fresh snapshot of one account.
    pub async fn account(&self, id: &AccountId) -> Result<Account, ProcessError> {
        Ok(self.load(id).await?.record)
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, ProcessError> {
        let accounts = self.round_trip("list accounts", self.store.accounts()).await?;
        Ok(accounts.into_iter().map(|versioned| versioned.record).collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::processor::{ErrorKind, test_utils::bank};

    use super::*;

    #[tokio::test]
    async fn register_and_authenticate() {
        let (bank, _) = bank();
        let command = RegisterCommand::new("Ana Silva", "123.456.789-01", "secret1", None).unwrap();
        let account = bank.register(command).await.unwrap();
        assert_eq!(account.balance(), Decimal::from(1000));
        assert_eq!(account.national_id(), "12345678901");
        assert!(account.transactions().is_empty());
        assert!(account.pix_keys().is_empty());

        let signed_in = bank
            .authenticate("12345678901", "secret1")
            .await
            .unwrap();
        assert_eq!(signed_in.id(), account.id());

        let err = bank
            .authenticate("123.456.789-01", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidCredentials));
        let err = bank
            .authenticate("99999999999", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidCredentials));
        let err = bank.authenticate("123", "secret1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn national_id_is_unique() {
        let (bank, _) = bank();
        let first = RegisterCommand::new("Ana", "12345678901", "secret1", Some(Decimal::from(5)))
            .unwrap();
        let account = bank.register(first).await.unwrap();
        assert_eq!(account.balance(), Decimal::from(5));

        let second = RegisterCommand::new("Bruno", "123.456.789-01", "secret2", None).unwrap();
        let err = bank.register(second).await.unwrap_err();
        assert!(matches!(err, ProcessError::NationalIdTaken));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(bank.accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_account() {
        let (bank, _) = bank();
        let err = bank.account(&AccountId::from("ghost")).await.unwrap_err();
        assert_eq!(err.reason(), "account not found");
    }
}
