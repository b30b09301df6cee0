use crate::domain::account::{Account, AccountId};
use crate::domain::course::{Course, CourseDraft, CourseId};
use crate::domain::ports::{AccountStore, CourseStore, TransactionStore};
use crate::domain::transaction::{NewTransaction, Transaction, TransactionId};
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    courses: BTreeMap<CourseId, Course>,
    transactions: BTreeMap<TransactionId, Transaction>,
    next_account_id: AccountId,
    next_course_id: CourseId,
    next_transaction_id: TransactionId,
}

impl State {
    fn sorted(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
        transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        transactions
    }
}

/// A thread-safe in-memory store for accounts, courses and the ledger.
///
/// All three live behind one `RwLock` so a commit updates the balance and
/// appends the ledger entry under a single write guard.
/// Ideal for testing or for replaying operations without persistence.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        roles: BTreeSet<String>,
    ) -> Result<Account> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| a.email == email) {
            return Err(BillingError::Conflict(format!(
                "Account with email {email} already exists"
            )));
        }
        state.next_account_id += 1;
        let mut account = Account::new(state.next_account_id, email, password_hash);
        account.roles = roles;
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get(&self, account_id: AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&account_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().cloned().collect())
    }
}

#[async_trait]
impl CourseStore for InMemoryStore {
    async fn insert(&self, draft: CourseDraft) -> Result<Course> {
        draft.validate()?;
        let mut state = self.state.write().await;
        if state.courses.values().any(|c| c.code == draft.code) {
            return Err(BillingError::Conflict(format!(
                "Course with code {} already exists",
                draft.code
            )));
        }
        state.next_course_id += 1;
        let course = draft.into_course(state.next_course_id);
        state.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn update(&self, course: Course) -> Result<()> {
        course.validate()?;
        let mut state = self.state.write().await;
        if !state.courses.contains_key(&course.id) {
            return Err(BillingError::CourseNotFound(course.code));
        }
        if state
            .courses
            .values()
            .any(|c| c.code == course.code && c.id != course.id)
        {
            return Err(BillingError::Conflict(format!(
                "Course with code {} already exists",
                course.code
            )));
        }
        state.courses.insert(course.id, course);
        Ok(())
    }

    async fn get(&self, course_id: CourseId) -> Result<Option<Course>> {
        let state = self.state.read().await;
        Ok(state.courses.get(&course_id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Course>> {
        let state = self.state.read().await;
        Ok(state.courses.values().find(|c| c.code == code).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Course>> {
        let state = self.state.read().await;
        Ok(state.courses.values().cloned().collect())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn commit(&self, account: &Account, tx: NewTransaction) -> Result<Transaction> {
        let mut state = self.state.write().await;
        let stored_version = state
            .accounts
            .get(&account.id)
            .map(|a| a.version)
            .ok_or_else(|| BillingError::AccountNotFound(account.email.clone()))?;
        if stored_version != account.version {
            return Err(BillingError::Conflict(format!(
                "Account {} was modified concurrently",
                account.id
            )));
        }

        state.next_transaction_id += 1;
        let tx = tx.with_id(state.next_transaction_id);
        let mut updated = account.clone();
        updated.version += 1;
        state.accounts.insert(updated.id, updated);
        state.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn for_account(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(State::sorted(
            state
                .transactions
                .values()
                .filter(|t| t.account_id == account_id)
                .cloned()
                .collect(),
        ))
    }

    async fn for_account_and_course(
        &self,
        account_id: AccountId,
        course_id: CourseId,
    ) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(State::sorted(
            state
                .transactions
                .values()
                .filter(|t| t.account_id == account_id && t.course_id == Some(course_id))
                .cloned()
                .collect(),
        ))
    }

    async fn expiring_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(State::sorted(
            state
                .transactions
                .values()
                .filter(|t| t.expires_at.is_some_and(|e| e >= from && e <= to))
                .cloned()
                .collect(),
        ))
    }

    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(State::sorted(
            state
                .transactions
                .values()
                .filter(|t| t.created_at >= from && t.created_at <= to)
                .cloned()
                .collect(),
        ))
    }
}
