//! Account operations outside any settlement: explicit provisioning (invoked
//! by the identity-creation workflow) and balance lookup.

use std::sync::Arc;

use crate::domain::{Account, account::DEFAULT_CURRENCY};
use crate::error::LedgerError;
use crate::store::Store;

pub struct AccountService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for AccountService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Provisions the account for a newly created identity. Idempotent: an
    /// existing account is returned unchanged.
    pub async fn provision(
        &self,
        user_id: i64,
        currency: Option<String>,
    ) -> Result<Account, LedgerError> {
        let currency = currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let account = self.store.get_or_create_account(user_id, &currency).await?;
        tracing::info!(user_id, currency = %account.currency, "account provisioned");
        Ok(account)
    }

    pub async fn get(&self, user_id: i64) -> Result<Account, LedgerError> {
        self.store
            .get_account(user_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account for user {user_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn provision_creates_zero_balance_account() {
        let service = AccountService::new(Arc::new(MemoryStore::new()));
        let account = service.provision(7, None).await.unwrap();
        assert_eq!(account.user_id, 7);
        assert_eq!(account.balance, crate::domain::money::zero());
        assert_eq!(account.currency, DEFAULT_CURRENCY);
    }

    #[tokio::test]
    async fn provision_twice_returns_same_account() {
        let service = AccountService::new(Arc::new(MemoryStore::new()));
        let first = service.provision(7, None).await.unwrap();
        let second = service.provision(7, Some("USD".to_string())).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.currency, DEFAULT_CURRENCY);
    }

    #[tokio::test]
    async fn get_unprovisioned_account_is_not_found() {
        let service = AccountService::new(Arc::new(MemoryStore::new()));
        let err = service.get(99).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
