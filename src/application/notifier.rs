use crate::config::BillingConfig;
use crate::domain::ports::{MailerRef, Stores};
use crate::domain::transaction::TransactionType;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use mockable::{Clock, DefaultClock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const DIGEST_SUBJECT: &str = "Course rentals ending soon";

#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct ExpiringRental {
    pub course_code: String,
    pub course_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Every soon-expiring rental of one account.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct ExpiryDigest {
    pub email: String,
    pub rentals: Vec<ExpiringRental>,
}

impl ExpiryDigest {
    /// Plain-text mail body.
    pub fn render(&self) -> String {
        let mut body = String::from("The following course rentals end soon:\n");
        for rental in &self.rentals {
            body.push_str(&format!(
                "- {} ({}): ends {}\n",
                rental.course_name,
                rental.course_code,
                rental.expires_at.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        body
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FailedDelivery {
    pub email: String,
    pub error: String,
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct NotificationReport {
    pub sent: Vec<String>,
    pub failed: Vec<FailedDelivery>,
}

/// Batch job mailing one digest per account with rentals about to expire.
///
/// A delivery failure is logged and recorded for that account only; the rest
/// of the batch still goes out. Runs never overlap.
pub struct ExpiryNotifier {
    stores: Stores,
    mailer: MailerRef,
    clock: Arc<dyn Clock + Send + Sync>,
    window: Duration,
    running: Mutex<()>,
}

impl ExpiryNotifier {
    pub fn new(stores: Stores, mailer: MailerRef, config: &BillingConfig) -> Self {
        Self {
            stores,
            mailer,
            clock: Arc::new(DefaultClock),
            window: config.expiry_window(),
            running: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Rentals expiring within `[now, now + window]`, grouped by account
    /// email. Digests are ordered by email, rentals by expiry.
    pub async fn find_expiring(&self, window: Duration) -> Result<Vec<ExpiryDigest>> {
        let now = self.clock.utc();
        let transactions = self
            .stores
            .transactions
            .expiring_between(now, now + window)
            .await?;

        let mut emails = BTreeMap::new();
        let mut courses = BTreeMap::new();
        let mut grouped: BTreeMap<String, Vec<ExpiringRental>> = BTreeMap::new();

        for tx in transactions {
            let (Some(course_id), Some(expires_at)) = (tx.course_id, tx.expires_at) else {
                continue;
            };
            if tx.r#type != TransactionType::Payment {
                continue;
            }

            if !emails.contains_key(&tx.account_id) {
                let email = self
                    .stores
                    .accounts
                    .get(tx.account_id)
                    .await?
                    .map(|account| account.email);
                emails.insert(tx.account_id, email);
            }
            if !courses.contains_key(&course_id) {
                let course = self.stores.courses.get(course_id).await?;
                courses.insert(course_id, course);
            }

            let (Some(Some(email)), Some(Some(course))) =
                (emails.get(&tx.account_id), courses.get(&course_id))
            else {
                tracing::warn!(transaction_id = tx.id, "rental references a missing account or course");
                continue;
            };

            grouped.entry(email.clone()).or_default().push(ExpiringRental {
                course_code: course.code.clone(),
                course_name: course.name.clone(),
                expires_at,
            });
        }

        Ok(grouped
            .into_iter()
            .map(|(email, mut rentals)| {
                rentals.sort_by_key(|r| r.expires_at);
                ExpiryDigest { email, rentals }
            })
            .collect())
    }

    /// Sends this run's digests. Returns `None` if another run is in progress.
    pub async fn run(&self) -> Result<Option<NotificationReport>> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::warn!("expiry notification run already in progress, skipping");
            return Ok(None);
        };

        let digests = self.find_expiring(self.window).await?;
        let mut report = NotificationReport::default();

        for digest in digests {
            match self
                .mailer
                .send(&digest.email, DIGEST_SUBJECT, &digest.render())
                .await
            {
                Ok(()) => report.sent.push(digest.email),
                Err(e) => {
                    tracing::warn!(email = %digest.email, error = %e, "expiry digest not delivered");
                    report.failed.push(FailedDelivery {
                        email: digest.email,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            sent = report.sent.len(),
            failed = report.failed.len(),
            "expiry notification run finished"
        );
        Ok(Some(report))
    }

    /// Runs the notifier every `interval` until the task is aborted.
    pub fn spawn(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run().await {
                    tracing::error!(error = %e, "expiry notification run failed");
                }
            }
        })
    }
}
