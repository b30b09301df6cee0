#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use course_billing::application::accounts::AccountDirectory;
use course_billing::application::catalog::CourseCatalog;
use course_billing::application::engine::PaymentEngine;
use course_billing::config::BillingConfig;
use course_billing::domain::account::{AccountIdentity, ROLE_SUPER_ADMIN};
use course_billing::domain::course::{CourseDraft, CourseType};
use course_billing::domain::ports::{Mailer, Stores};
use course_billing::domain::transaction::{Transaction, TransactionType};
use course_billing::error::{BillingError, Result};
use course_billing::infrastructure::in_memory::InMemoryStore;
use mockable::Clock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub const USER: &str = "user@example.com";
pub const ADMIN: &str = "admin@example.com";

/// Clock the tests move by hand.
#[derive(Clone)]
pub struct MutableClock(Arc<Mutex<DateTime<Utc>>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn advance(&self, delta: Duration) {
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Records every message; recipients in `failing` get a transport error.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    failing: HashSet<String>,
}

impl RecordingMailer {
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::default(),
            failing: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        if self.failing.contains(recipient) {
            return Err(BillingError::TransportFailure(format!(
                "mailbox {recipient} unavailable"
            )));
        }
        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct Harness {
    pub stores: Stores,
    pub clock: MutableClock,
    pub engine: Arc<PaymentEngine>,
    pub directory: AccountDirectory,
    pub catalog: CourseCatalog,
}

impl Harness {
    pub fn identity(&self, email: &str) -> AccountIdentity {
        AccountIdentity::new(email)
    }

    pub async fn balance(&self, email: &str) -> Decimal {
        self.stores
            .accounts
            .find_by_email(email)
            .await
            .unwrap()
            .unwrap()
            .balance
            .value()
    }

    pub async fn add_course(&self, code: &str, course_type: CourseType, price: Option<Decimal>) {
        let draft = CourseDraft {
            code: code.to_string(),
            name: code.to_uppercase(),
            course_type,
            price,
        };
        self.catalog
            .create_course(Some(&self.identity(ADMIN)), draft)
            .await
            .unwrap();
    }

    /// Registers `email` and funds it with `balance` through a deposit.
    pub async fn add_account(&self, email: &str, balance: Decimal) {
        self.directory
            .register(email, "hash", Vec::<String>::new())
            .await
            .unwrap();
        if balance > Decimal::ZERO {
            self.engine
                .deposit(Some(&self.identity(email)), balance)
                .await
                .unwrap();
        }
    }
}

/// Counts ledger entries of one type.
pub fn count_by_type(transactions: &[Transaction], r#type: TransactionType) -> usize {
    transactions.iter().filter(|tx| tx.r#type == r#type).count()
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 13, 12, 0, 0).unwrap()
}

/// In-memory stores with the fixture catalog, an admin and `USER` holding
/// a balance of 1000.
pub async fn harness() -> Harness {
    let stores = Stores::shared(InMemoryStore::new());
    let clock = MutableClock::new(start_time());
    let engine = Arc::new(
        PaymentEngine::new(stores.clone(), &BillingConfig::default())
            .with_clock(Arc::new(clock.clone())),
    );
    let directory = AccountDirectory::new(stores.accounts.clone());
    let catalog = CourseCatalog::new(stores.courses.clone(), stores.accounts.clone());

    directory
        .register(ADMIN, "hash", [ROLE_SUPER_ADMIN])
        .await
        .unwrap();

    let harness = Harness {
        stores,
        clock,
        engine,
        directory,
        catalog,
    };
    harness
        .add_course("nympydata", CourseType::Free, None)
        .await;
    harness
        .add_course("figmadesign", CourseType::Rent, Some(dec!(10)))
        .await;
    harness
        .add_course("molecularphysics", CourseType::Buy, Some(dec!(20)))
        .await;
    harness.add_account(USER, dec!(1000)).await;
    harness
}
