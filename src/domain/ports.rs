use super::account::{Account, AccountId};
use super::course::{Course, CourseDraft, CourseId};
use super::transaction::{NewTransaction, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Registers an account with a zero balance. Fails with `Conflict` when
    /// the email is already taken.
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        roles: BTreeSet<String>,
    ) -> Result<Account>;
    async fn get(&self, account_id: AccountId) -> Result<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;
    async fn get_all(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Adds a course. Fails with `Conflict` when the code is already taken.
    async fn insert(&self, draft: CourseDraft) -> Result<Course>;
    /// Replaces the course with the same id. Fails with `Conflict` when the
    /// new code belongs to another course.
    async fn update(&self, course: Course) -> Result<()>;
    async fn get(&self, course_id: CourseId) -> Result<Option<Course>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Course>>;
    async fn get_all(&self) -> Result<Vec<Course>>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists the account's new balance and appends `tx` as one atomic unit.
    ///
    /// `account.version` must match the stored version, otherwise nothing is
    /// written and `Conflict` is returned. The stored version is incremented.
    async fn commit(&self, account: &Account, tx: NewTransaction) -> Result<Transaction>;
    /// All transactions of an account, ordered by creation time then id.
    async fn for_account(&self, account_id: AccountId) -> Result<Vec<Transaction>>;
    async fn for_account_and_course(
        &self,
        account_id: AccountId,
        course_id: CourseId,
    ) -> Result<Vec<Transaction>>;
    /// Transactions whose expiry falls within `[from, to]`, both inclusive.
    async fn expiring_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
    /// Transactions created within `[from, to]`, both inclusive.
    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
}

/// Outbound mail collaborator. A returned error is a transport failure.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type CourseStoreRef = Arc<dyn CourseStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type MailerRef = Arc<dyn Mailer>;

/// The set of persistence ports the services share.
#[derive(Clone)]
pub struct Stores {
    pub accounts: AccountStoreRef,
    pub courses: CourseStoreRef,
    pub transactions: TransactionStoreRef,
}

impl Stores {
    /// Uses one backend for every port, which is what makes
    /// [`TransactionStore::commit`] able to touch accounts atomically.
    pub fn shared<S>(store: S) -> Self
    where
        S: AccountStore + CourseStore + TransactionStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            accounts: store.clone(),
            courses: store.clone(),
            transactions: store,
        }
    }
}
