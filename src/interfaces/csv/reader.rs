use crate::domain::course::CourseDraft;
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

fn reader_for<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Register,
    Deposit,
    Pay,
}

/// One row of an operations file: `op, email, course, amount`.
///
/// `course` is only read for `pay`, `amount` only for `deposit`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Operation {
    pub op: OperationKind,
    pub email: String,
    pub course: Option<String>,
    pub amount: Option<Decimal>,
}

impl Operation {
    pub fn course_code(&self) -> Result<&str> {
        self.course
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| BillingError::ValidationError("Payment missing course".to_string()))
    }

    pub fn deposit_amount(&self) -> Result<Decimal> {
        self.amount
            .ok_or_else(|| BillingError::ValidationError("Deposit missing amount".to_string()))
    }
}

/// Reads account operations from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and accepting short rows.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: reader_for(source),
        }
    }

    /// Lazily deserializes operations, one `Result` per row.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BillingError::from))
    }
}

/// Reads a course catalog (`code, name, type, price`) from a CSV source.
pub struct CourseReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CourseReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: reader_for(source),
        }
    }

    pub fn courses(self) -> impl Iterator<Item = Result<CourseDraft>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BillingError::from))
    }
}
