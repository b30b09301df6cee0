use crate::domain::account::Account;
use crate::domain::transaction::TransactionView;
use crate::error::Result;
use chrono::SecondsFormat;
use std::io::Write;

/// Writes account balances as `email,balance` rows.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: impl IntoIterator<Item = Account>) -> Result<()> {
        self.writer.write_record(["email", "balance"])?;
        for account in accounts {
            self.writer
                .write_record([account.email, account.balance.to_string()])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes ledger projections, one row per transaction.
pub struct TransactionWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TransactionWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_transactions(&mut self, views: &[TransactionView]) -> Result<()> {
        self.writer.write_record([
            "id",
            "created_at",
            "expires_at",
            "type",
            "course_code",
            "amount",
        ])?;
        for view in views {
            self.writer.write_record([
                view.id.to_string(),
                view.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                view.expires_at
                    .map(|e| e.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_default(),
                view.r#type.to_string(),
                view.course_code.clone().unwrap_or_default(),
                view.amount.normalize().to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
