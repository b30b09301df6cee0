use super::account::AccountId;
use super::course::{CourseId, CourseType};
use crate::error::BillingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TransactionId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Payment => "payment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(TransactionType::Deposit),
            "payment" => Ok(TransactionType::Payment),
            other => Err(BillingError::ValidationError(format!(
                "Unknown transaction type: {other}"
            ))),
        }
    }
}

/// A ledger entry. Never updated once committed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub course_id: Option<CourseId>,
    pub r#type: TransactionType,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Whether a rental window is still open at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires| expires > now)
    }
}

/// A ledger entry before the store assigns its id.
#[derive(Debug, PartialEq, Clone)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub course_id: Option<CourseId>,
    pub r#type: TransactionType,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewTransaction {
    pub fn deposit(account_id: AccountId, amount: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            course_id: None,
            r#type: TransactionType::Deposit,
            amount,
            created_at: now,
            expires_at: None,
        }
    }

    pub fn payment(
        account_id: AccountId,
        course_id: CourseId,
        amount: Decimal,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            account_id,
            course_id: Some(course_id),
            r#type: TransactionType::Payment,
            amount,
            created_at: now,
            expires_at,
        }
    }

    pub fn with_id(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            account_id: self.account_id,
            course_id: self.course_id,
            r#type: self.r#type,
            amount: self.amount,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Optional filters for listing an account's transactions, combined with AND.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionFilter {
    pub r#type: Option<TransactionType>,
    pub course_code: Option<String>,
    pub skip_expired: bool,
}

/// Read-only projection of a ledger entry.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct TransactionView {
    pub id: TransactionId,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub r#type: TransactionType,
    pub course_code: Option<String>,
    pub course_type: Option<CourseType>,
    pub amount: Decimal,
}
