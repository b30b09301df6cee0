use crate::domain::account::AccountId;
use crate::domain::course::{CourseId, CourseType};
use crate::domain::ports::TransactionStoreRef;
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Derives course access from the ledger.
///
/// Nothing is cached: every answer is recomputed from the account's
/// transactions for the course, so it can never drift from the audit trail.
#[derive(Clone)]
pub struct EntitlementResolver {
    transactions: TransactionStoreRef,
}

/// Whether `tx` grants access to a course of `course_type` at `now`.
///
/// A rental without an expiry never qualifies.
pub fn grants_access(tx: &Transaction, course_type: CourseType, now: DateTime<Utc>) -> bool {
    if tx.r#type != TransactionType::Payment {
        return false;
    }
    match course_type {
        CourseType::Free | CourseType::Buy => true,
        CourseType::Rent => tx.expires_at.is_some_and(|expires| expires > now),
    }
}

impl EntitlementResolver {
    pub fn new(transactions: TransactionStoreRef) -> Self {
        Self { transactions }
    }

    /// Free courses are always accessible; otherwise any qualifying payment
    /// grants access.
    pub async fn has_active_entitlement(
        &self,
        account_id: AccountId,
        course_id: CourseId,
        course_type: CourseType,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if course_type == CourseType::Free {
            return Ok(true);
        }
        Ok(self
            .active_entitlement(account_id, course_id, course_type, now)
            .await?
            .is_some())
    }

    /// The payment currently backing access to the course, if any.
    ///
    /// For rentals this is the one expiring last; for purchases (and recorded
    /// free enrolments) the earliest.
    pub async fn active_entitlement(
        &self,
        account_id: AccountId,
        course_id: CourseId,
        course_type: CourseType,
        now: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        let qualifying = self
            .transactions
            .for_account_and_course(account_id, course_id)
            .await?
            .into_iter()
            .filter(|tx| grants_access(tx, course_type, now));

        let entitlement = match course_type {
            CourseType::Rent => qualifying.max_by_key(|tx| tx.expires_at),
            CourseType::Free | CourseType::Buy => qualifying.min_by_key(|tx| (tx.created_at, tx.id)),
        };
        Ok(entitlement)
    }
}
