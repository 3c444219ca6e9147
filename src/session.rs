use std::sync::Arc;

use tracing::debug;

use crate::{account::Account, processor::{Bank, ProcessError}};

/// The signed-in account for one client, constructed by the caller and passed
/// to whatever needs it.
///
/// The snapshot is never updated behind the caller's back: after a mutation,
/// call [`Session::refresh`] to re-read it from the store.
pub struct Session {
    bank: Arc<Bank>,
    current: Option<Account>,
}

impl Session {
    pub fn new(bank: Arc<Bank>) -> Self {
        Self {
            bank,
            current: None,
        }
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn current(&self) -> Option<&Account> {
        self.current.as_ref()
    }

    /// On failure the previous session, if any, is kept.
    pub async fn sign_in(
        &mut self,
        national_id: &str,
        password: &str,
    ) -> Result<&Account, ProcessError> {
        let account = self.bank.authenticate(national_id, password).await?;
        debug!(account = %account.id(), "Session started");
        Ok(self.current.insert(account))
    }

    pub fn sign_out(&mut self) {
        if let Some(account) = self.current.take() {
            debug!(account = %account.id(), "Session ended");
        }
    }

    /// Re-reads the signed-in account. `Ok(None)` when nobody is signed in.
    pub async fn refresh(&mut self) -> Result<Option<&Account>, ProcessError> {
        let Some(id) = self.current.as_ref().map(|account| account.id().clone()) else {
            return Ok(None);
        };
        let account = self.bank.account(&id).await?;
        Ok(Some(self.current.insert(account)))
    }
}
