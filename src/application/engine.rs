use crate::application::accounts::resolve_account;
use crate::application::entitlement::EntitlementResolver;
use crate::config::BillingConfig;
use crate::domain::account::{Account, AccountId, AccountIdentity, Amount, Balance};
use crate::domain::course::{Course, CourseType};
use crate::domain::ports::Stores;
use crate::domain::transaction::{
    NewTransaction, Transaction, TransactionFilter, TransactionId, TransactionView,
};
use crate::error::{BillingError, Result};
use chrono::{DateTime, Duration, Utc};
use mockable::{Clock, DefaultClock};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Result of a `pay` call.
///
/// `transaction_id` points at the ledger entry backing the access: the new
/// one when something was recorded, the existing one for an idempotent call.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct PaymentOutcome {
    pub success: bool,
    pub course_type: CourseType,
    pub amount_charged: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub transaction_id: TransactionId,
    pub balance: Balance,
}

/// One async mutex per account, handed out on demand.
///
/// Entries are never evicted; the map holds at most one small entry per
/// account that has ever paid or deposited.
#[derive(Default)]
struct AccountLocks {
    locks: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    async fn acquire(&self, account_id: AccountId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(account_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Orchestrates payments and deposits against the ledger.
///
/// Every balance mutation for an account runs under that account's lock,
/// from the fresh read through the entitlement check to the commit. The
/// store's version check backs this up for writers outside this process.
/// Different accounts never contend.
pub struct PaymentEngine {
    stores: Stores,
    resolver: EntitlementResolver,
    clock: Arc<dyn Clock + Send + Sync>,
    rental_period: Duration,
    locks: AccountLocks,
}

impl PaymentEngine {
    /// Creates a new `PaymentEngine` reading time from the system clock.
    pub fn new(stores: Stores, config: &BillingConfig) -> Self {
        Self {
            resolver: EntitlementResolver::new(stores.transactions.clone()),
            stores,
            clock: Arc::new(DefaultClock),
            rental_period: config.rental_period(),
            locks: AccountLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn resolver(&self) -> &EntitlementResolver {
        &self.resolver
    }

    /// Grants the caller access to the course identified by `course_code`,
    /// charging the balance when access is not already held.
    pub async fn pay(
        &self,
        identity: Option<&AccountIdentity>,
        course_code: &str,
    ) -> Result<PaymentOutcome> {
        let account = resolve_account(&self.stores.accounts, identity).await?;
        let course = self
            .stores
            .courses
            .find_by_code(course_code)
            .await?
            .ok_or_else(|| BillingError::CourseNotFound(course_code.to_string()))?;

        let _guard = self.locks.acquire(account.id).await;
        let mut account = self.reload(&account).await?;
        let now = self.clock.utc();

        if let Some(existing) = self
            .resolver
            .active_entitlement(account.id, course.id, course.course_type, now)
            .await?
        {
            tracing::debug!(
                account_id = account.id,
                course = %course.code,
                transaction_id = existing.id,
                "course already held, nothing charged"
            );
            return Ok(PaymentOutcome {
                success: true,
                course_type: course.course_type,
                amount_charged: Decimal::ZERO,
                expires_at: existing.expires_at,
                transaction_id: existing.id,
                balance: account.balance,
            });
        }

        let (amount, expires_at) = self.price(&course, now)?;
        if let Err(e) = account.debit(amount) {
            tracing::warn!(
                account_id = account.id,
                course = %course.code,
                required = %amount,
                available = %account.balance,
                "payment refused"
            );
            return Err(e);
        }

        let tx = self
            .stores
            .transactions
            .commit(
                &account,
                NewTransaction::payment(account.id, course.id, amount, now, expires_at),
            )
            .await?;

        tracing::info!(
            account_id = account.id,
            course = %course.code,
            course_type = %course.course_type,
            amount = %amount,
            transaction_id = tx.id,
            "course paid"
        );

        Ok(PaymentOutcome {
            success: true,
            course_type: course.course_type,
            amount_charged: amount,
            expires_at: tx.expires_at,
            transaction_id: tx.id,
            balance: account.balance,
        })
    }

    /// Credits the caller's balance and records the deposit.
    pub async fn deposit(
        &self,
        identity: Option<&AccountIdentity>,
        amount: Decimal,
    ) -> Result<Transaction> {
        let account = resolve_account(&self.stores.accounts, identity).await?;
        let amount = Amount::new(amount)?;

        let _guard = self.locks.acquire(account.id).await;
        let mut account = self.reload(&account).await?;
        let now = self.clock.utc();

        if let Err(e) = account.credit(amount) {
            tracing::warn!(
                account_id = account.id,
                amount = %amount.value(),
                balance = %account.balance,
                "deposit refused"
            );
            return Err(e);
        }
        let tx = self
            .stores
            .transactions
            .commit(
                &account,
                NewTransaction::deposit(account.id, amount.value(), now),
            )
            .await?;

        tracing::info!(
            account_id = account.id,
            amount = %amount.value(),
            balance = %account.balance,
            transaction_id = tx.id,
            "deposit recorded"
        );
        Ok(tx)
    }

    /// Lists the caller's ledger entries matching `filter`, oldest first.
    ///
    /// With `skip_expired`, rental payments whose window has closed are left
    /// out; deposits and purchases are always kept.
    pub async fn list_transactions(
        &self,
        identity: Option<&AccountIdentity>,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionView>> {
        let account = resolve_account(&self.stores.accounts, identity).await?;
        let courses: HashMap<_, Course> = self
            .stores
            .courses
            .get_all()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let now = self.clock.utc();

        let views = self
            .stores
            .transactions
            .for_account(account.id)
            .await?
            .into_iter()
            .filter(|tx| filter.r#type.is_none_or(|t| t == tx.r#type))
            .filter(|tx| !filter.skip_expired || tx.is_active_at(now))
            .map(|tx| {
                let course = tx.course_id.and_then(|id| courses.get(&id));
                TransactionView {
                    id: tx.id,
                    created_at: tx.created_at,
                    expires_at: tx.expires_at,
                    r#type: tx.r#type,
                    course_code: course.map(|c| c.code.clone()),
                    course_type: course.map(|c| c.course_type),
                    amount: tx.amount,
                }
            })
            .filter(|view| match &filter.course_code {
                Some(code) => view.course_code.as_deref() == Some(code.as_str()),
                None => true,
            })
            .collect();
        Ok(views)
    }

    async fn reload(&self, account: &Account) -> Result<Account> {
        self.stores
            .accounts
            .get(account.id)
            .await?
            .ok_or_else(|| BillingError::AccountNotFound(account.email.clone()))
    }

    /// Amount to charge and, for rentals, when the new window closes.
    fn price(
        &self,
        course: &Course,
        now: DateTime<Utc>,
    ) -> Result<(Decimal, Option<DateTime<Utc>>)> {
        let amount = course.charge()?;
        let expires_at = match course.course_type {
            CourseType::Rent => Some(now.checked_add_signed(self.rental_period).ok_or_else(
                || BillingError::ValidationError("Rental expiry is out of range".to_string()),
            )?),
            CourseType::Free | CourseType::Buy => None,
        };
        Ok((amount, expires_at))
    }
}
