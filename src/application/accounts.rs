use crate::domain::account::{Account, AccountIdentity, Balance};
use crate::domain::ports::AccountStoreRef;
use crate::error::{BillingError, Result};
use serde::Serialize;
use std::collections::BTreeSet;

/// What the caller sees about their own account.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AccountSummary {
    pub username: String,
    pub roles: BTreeSet<String>,
    pub balance: Balance,
}

/// Resolves the caller's identity to a stored account.
///
/// A missing identity means the authentication layer let an anonymous
/// request through.
pub(crate) async fn resolve_account(
    accounts: &AccountStoreRef,
    identity: Option<&AccountIdentity>,
) -> Result<Account> {
    let identity = identity.ok_or(BillingError::Unauthenticated)?;
    accounts
        .find_by_email(identity.email())
        .await?
        .ok_or_else(|| BillingError::AccountNotFound(identity.email().to_string()))
}

/// Account registration and lookup.
#[derive(Clone)]
pub struct AccountDirectory {
    accounts: AccountStoreRef,
}

impl AccountDirectory {
    pub fn new(accounts: AccountStoreRef) -> Self {
        Self { accounts }
    }

    /// Creates an account with a zero balance.
    ///
    /// The password arrives already hashed; credential rules belong to the
    /// authentication layer.
    pub async fn register<I, S>(&self, email: &str, password_hash: &str, roles: I) -> Result<Account>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let email = email.trim();
        if email.is_empty() {
            return Err(BillingError::ValidationError(
                "Email must not be empty".to_string(),
            ));
        }
        let roles = roles.into_iter().map(Into::into).collect();
        let account = self.accounts.create(email, password_hash, roles).await?;
        tracing::info!(account_id = account.id, email = %account.email, "account registered");
        Ok(account)
    }

    pub async fn current_account(&self, identity: Option<&AccountIdentity>) -> Result<AccountSummary> {
        let account = resolve_account(&self.accounts, identity).await?;
        Ok(AccountSummary {
            username: account.email.clone(),
            roles: account.effective_roles(),
            balance: account.balance,
        })
    }
}
