use crate::domain::account::{Account, AccountId};
use crate::domain::course::{Course, CourseDraft, CourseId};
use crate::domain::ports::{AccountStore, CourseStore, TransactionStore};
use crate::domain::transaction::{NewTransaction, Transaction};
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing accounts, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing the course catalog, keyed by course id.
pub const CF_COURSES: &str = "courses";
/// Column Family for the ledger, keyed by account id followed by transaction id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const SEQ_ACCOUNT: &[u8] = b"seq:account";
const SEQ_COURSE: &[u8] = b"seq:course";
const SEQ_TRANSACTION: &[u8] = b"seq:transaction";

/// A persistent store implementation using RocksDB.
///
/// Ledger keys are prefixed with the owning account id so an account's
/// history is a single prefix scan. Commits go through one `WriteBatch`, and
/// writers are serialized by an in-process mutex so the version check and the
/// batch cannot interleave.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| BillingError::internal(format!("Serialization error: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| BillingError::internal(format!("Deserialization error: {}", e)))
}

fn ledger_key(account_id: AccountId, tx_id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&account_id.to_be_bytes());
    key[8..].copy_from_slice(&tx_id.to_be_bytes());
    key
}

fn sorted(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
    transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    transactions
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ACCOUNTS, CF_COURSES, CF_TRANSACTIONS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| BillingError::internal(format!("{name} column family not found")))
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn get_value<T: DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads the next id of a sequence and stages its increment in `batch`.
    fn next_id(&self, batch: &mut WriteBatch, sequence: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, sequence)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| BillingError::internal("Corrupted id sequence"))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        batch.put_cf(cf, sequence, next.to_be_bytes());
        Ok(next)
    }
}

#[async_trait]
impl AccountStore for RocksDbStore {
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        roles: BTreeSet<String>,
    ) -> Result<Account> {
        let _guard = self.write_lock.lock().await;
        if self.find_by_email(email).await?.is_some() {
            return Err(BillingError::Conflict(format!(
                "Account with email {email} already exists"
            )));
        }

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_ACCOUNT)?;
        let mut account = Account::new(id, email, password_hash);
        account.roles = roles;
        batch.put_cf(self.cf(CF_ACCOUNTS)?, id.to_be_bytes(), encode(&account)?);
        self.db.write(batch)?;
        Ok(account)
    }

    async fn get(&self, account_id: AccountId) -> Result<Option<Account>> {
        self.get_value(CF_ACCOUNTS, &account_id.to_be_bytes())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts: Vec<Account> = self.scan(CF_ACCOUNTS)?;
        Ok(accounts.into_iter().find(|a| a.email == email))
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        self.scan(CF_ACCOUNTS)
    }
}

#[async_trait]
impl CourseStore for RocksDbStore {
    async fn insert(&self, draft: CourseDraft) -> Result<Course> {
        draft.validate()?;
        let _guard = self.write_lock.lock().await;
        if self.find_by_code(&draft.code).await?.is_some() {
            return Err(BillingError::Conflict(format!(
                "Course with code {} already exists",
                draft.code
            )));
        }

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_COURSE)?;
        let course = draft.into_course(id);
        batch.put_cf(self.cf(CF_COURSES)?, id.to_be_bytes(), encode(&course)?);
        self.db.write(batch)?;
        Ok(course)
    }

    async fn update(&self, course: Course) -> Result<()> {
        course.validate()?;
        let _guard = self.write_lock.lock().await;
        let courses: Vec<Course> = self.scan(CF_COURSES)?;
        if !courses.iter().any(|c| c.id == course.id) {
            return Err(BillingError::CourseNotFound(course.code));
        }
        if courses
            .iter()
            .any(|c| c.code == course.code && c.id != course.id)
        {
            return Err(BillingError::Conflict(format!(
                "Course with code {} already exists",
                course.code
            )));
        }
        self.db
            .put_cf(self.cf(CF_COURSES)?, course.id.to_be_bytes(), encode(&course)?)?;
        Ok(())
    }

    async fn get(&self, course_id: CourseId) -> Result<Option<Course>> {
        self.get_value(CF_COURSES, &course_id.to_be_bytes())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Course>> {
        let courses: Vec<Course> = self.scan(CF_COURSES)?;
        Ok(courses.into_iter().find(|c| c.code == code))
    }

    async fn get_all(&self) -> Result<Vec<Course>> {
        self.scan(CF_COURSES)
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn commit(&self, account: &Account, tx: NewTransaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let stored: Account = self
            .get_value(CF_ACCOUNTS, &account.id.to_be_bytes())?
            .ok_or_else(|| BillingError::AccountNotFound(account.email.clone()))?;
        if stored.version != account.version {
            return Err(BillingError::Conflict(format!(
                "Account {} was modified concurrently",
                account.id
            )));
        }

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_TRANSACTION)?;
        let tx = tx.with_id(id);
        let mut updated = account.clone();
        updated.version += 1;
        batch.put_cf(
            self.cf(CF_ACCOUNTS)?,
            updated.id.to_be_bytes(),
            encode(&updated)?,
        );
        batch.put_cf(
            self.cf(CF_TRANSACTIONS)?,
            ledger_key(tx.account_id, tx.id),
            encode(&tx)?,
        );
        self.db.write(batch)?;
        Ok(tx)
    }

    async fn for_account(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let prefix = account_id.to_be_bytes();
        let mut transactions = Vec::new();
        for item in self.db.prefix_iterator_cf(cf, prefix) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            transactions.push(decode(&value)?);
        }
        Ok(sorted(transactions))
    }

    async fn for_account_and_course(
        &self,
        account_id: AccountId,
        course_id: CourseId,
    ) -> Result<Vec<Transaction>> {
        let transactions = self.for_account(account_id).await?;
        Ok(transactions
            .into_iter()
            .filter(|t| t.course_id == Some(course_id))
            .collect())
    }

    async fn expiring_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        Ok(sorted(
            transactions
                .into_iter()
                .filter(|t| t.expires_at.is_some_and(|e| e >= from && e <= to))
                .collect(),
        ))
    }

    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        Ok(sorted(
            transactions
                .into_iter()
                .filter(|t| t.created_at >= from && t.created_at <= to)
                .collect(),
        ))
    }
}
