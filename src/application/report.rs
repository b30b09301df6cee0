use crate::domain::account::AccountId;
use crate::domain::course::{CourseId, CourseType};
use crate::domain::ports::Stores;
use crate::domain::transaction::TransactionType;
use crate::error::{BillingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Payments of one account for one course over a period.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct PeriodTotal {
    pub email: String,
    pub course_code: String,
    pub course_name: String,
    pub course_type: CourseType,
    pub transactions_count: usize,
    pub total_amount: Decimal,
}

/// Sums payments created within `[from, to]` per account and course,
/// ordered by email then course code.
pub async fn period_report(
    stores: &Stores,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<PeriodTotal>> {
    if from > to {
        return Err(BillingError::ValidationError(
            "Report period starts after it ends".to_string(),
        ));
    }

    let mut buckets: BTreeMap<(AccountId, CourseId), (usize, Decimal)> = BTreeMap::new();
    for tx in stores.transactions.created_between(from, to).await? {
        if tx.r#type != TransactionType::Payment {
            continue;
        }
        if let Some(course_id) = tx.course_id {
            let bucket = buckets
                .entry((tx.account_id, course_id))
                .or_insert((0, Decimal::ZERO));
            bucket.0 += 1;
            bucket.1 = bucket.1.checked_add(tx.amount).ok_or_else(|| {
                BillingError::ValidationError(
                    "Period total exceeds the representable amount".to_string(),
                )
            })?;
        }
    }

    let mut totals = Vec::with_capacity(buckets.len());
    for ((account_id, course_id), (count, amount)) in buckets {
        let (Some(account), Some(course)) = (
            stores.accounts.get(account_id).await?,
            stores.courses.get(course_id).await?,
        ) else {
            continue;
        };
        totals.push(PeriodTotal {
            email: account.email,
            course_code: course.code,
            course_name: course.name,
            course_type: course.course_type,
            transactions_count: count,
            total_amount: amount,
        });
    }

    totals.sort_by(|a, b| {
        a.email
            .cmp(&b.email)
            .then_with(|| a.course_code.cmp(&b.course_code))
    });
    Ok(totals)
}
