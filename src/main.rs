use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use course_billing::application::accounts::AccountDirectory;
use course_billing::application::engine::PaymentEngine;
use course_billing::application::notifier::ExpiryNotifier;
use course_billing::application::report::period_report;
use course_billing::config::BillingConfig;
use course_billing::domain::account::AccountIdentity;
use course_billing::domain::ports::Stores;
use course_billing::domain::transaction::{TransactionFilter, TransactionType};
use course_billing::error::BillingError;
use course_billing::infrastructure::in_memory::InMemoryStore;
use course_billing::infrastructure::mail::LogMailer;
use course_billing::interfaces::csv::reader::{CourseReader, OperationKind, OperationReader};
use course_billing::interfaces::csv::writer::{AccountWriter, TransactionWriter};
use course_billing::telemetry::init_tracing;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: BillingConfig,

    #[command(subcommand)]
    command: Command,
}

/// Files loaded into the store before a command runs.
#[derive(Args)]
struct Seed {
    /// Course catalog CSV (code,name,type,price)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Operations CSV (op,email,course,amount) replayed in order
    #[arg(long)]
    ops: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Replay operations and print every account balance
    Replay {
        #[command(flatten)]
        seed: Seed,
    },
    /// Print the ledger of one account
    Transactions {
        #[command(flatten)]
        seed: Seed,

        #[arg(long)]
        email: String,

        #[arg(long = "type")]
        r#type: Option<TransactionType>,

        #[arg(long)]
        course_code: Option<String>,

        /// Leave out rentals whose window has closed
        #[arg(long)]
        skip_expired: bool,
    },
    /// Mail a digest to every account with rentals about to expire
    Notify {
        #[command(flatten)]
        seed: Seed,

        /// Keep running on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Print payment totals per account and course over a period
    Report {
        #[command(flatten)]
        seed: Seed,

        /// Period start, RFC 3339 (defaults to 30 days before --to)
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// Period end, RFC 3339 (defaults to now)
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
}

fn open_stores(config: &BillingConfig) -> Result<Stores> {
    match &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store = course_billing::infrastructure::rocksdb::RocksDbStore::open(db_path)
                .into_diagnostic()?;
            tracing::info!(path = %db_path.display(), "using RocksDB storage");
            Ok(Stores::shared(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Stores::shared(InMemoryStore::new()))
        }
        None => Ok(Stores::shared(InMemoryStore::new())),
    }
}

/// Loads the catalog, then replays operations. Row failures are logged and
/// skipped, like a rejected request would be.
async fn apply_seed(seed: &Seed, stores: &Stores, engine: &PaymentEngine) -> Result<()> {
    if let Some(path) = &seed.catalog {
        let file = File::open(path).into_diagnostic()?;
        for draft in CourseReader::new(file).courses() {
            let inserted = match draft {
                Ok(draft) => match draft.validate() {
                    Ok(()) => stores.courses.insert(draft).await,
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            if let Err(e) = inserted {
                tracing::warn!(error = %e, "catalog row skipped");
            }
        }
    }

    if let Some(path) = &seed.ops {
        let directory = AccountDirectory::new(stores.accounts.clone());
        let file = File::open(path).into_diagnostic()?;
        for op in OperationReader::new(file).operations() {
            let result = match op {
                Ok(op) => {
                    let identity = AccountIdentity::new(op.email.as_str());
                    match op.op {
                        OperationKind::Register => directory
                            .register(&op.email, "", Vec::<String>::new())
                            .await
                            .map(|_| ()),
                        OperationKind::Deposit => match op.deposit_amount() {
                            Ok(amount) => engine.deposit(Some(&identity), amount).await.map(|_| ()),
                            Err(e) => Err(e),
                        },
                        OperationKind::Pay => match op.course_code() {
                            Ok(code) => engine.pay(Some(&identity), code).await.map(|_| ()),
                            Err(e) => Err(e),
                        },
                    }
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, status = e.status_code(), "operation rejected");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config;
    init_tracing(&config.log_level, config.log_format);
    config.validate().into_diagnostic()?;

    let stores = open_stores(&config)?;
    let engine = PaymentEngine::new(stores.clone(), &config);

    match cli.command {
        Command::Replay { seed } => {
            apply_seed(&seed, &stores, &engine).await?;
            let accounts = stores.accounts.get_all().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = AccountWriter::new(stdout.lock());
            writer.write_accounts(accounts).into_diagnostic()?;
        }
        Command::Transactions {
            seed,
            email,
            r#type,
            course_code,
            skip_expired,
        } => {
            apply_seed(&seed, &stores, &engine).await?;
            let filter = TransactionFilter {
                r#type,
                course_code,
                skip_expired,
            };
            let identity = AccountIdentity::new(email.as_str());
            let views = engine
                .list_transactions(Some(&identity), &filter)
                .await
                .into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = TransactionWriter::new(stdout.lock());
            writer.write_transactions(&views).into_diagnostic()?;
        }
        Command::Notify { seed, watch } => {
            apply_seed(&seed, &stores, &engine).await?;
            let notifier = Arc::new(ExpiryNotifier::new(
                stores.clone(),
                Arc::new(LogMailer),
                &config,
            ));
            if watch {
                let handle = notifier.spawn(config.notify_interval());
                tokio::signal::ctrl_c().await.into_diagnostic()?;
                handle.abort();
            } else if let Some(report) = notifier.run().await.into_diagnostic()? {
                let stdout = io::stdout();
                let mut writer = csv::Writer::from_writer(stdout.lock());
                writer.write_record(["email", "status"]).into_diagnostic()?;
                for email in &report.sent {
                    writer.write_record([email.as_str(), "sent"]).into_diagnostic()?;
                }
                for failure in &report.failed {
                    writer
                        .write_record([failure.email.as_str(), "failed"])
                        .into_diagnostic()?;
                }
                writer.flush().into_diagnostic()?;
            }
        }
        Command::Report { seed, from, to } => {
            apply_seed(&seed, &stores, &engine).await?;
            let to = to.unwrap_or_else(Utc::now);
            let from = from.unwrap_or(to - Duration::days(30));
            let totals = period_report(&stores, from, to).await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = csv::Writer::from_writer(stdout.lock());
            for total in totals {
                writer
                    .serialize(total)
                    .map_err(BillingError::from)
                    .into_diagnostic()?;
            }
            writer.flush().into_diagnostic()?;
        }
    }

    Ok(())
}
