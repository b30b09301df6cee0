//! Application layer containing the billing use cases.
//!
//! `PaymentEngine` is the entry point for balance-affecting operations and
//! serializes them per account. The remaining services are read-mostly:
//! entitlement resolution, the course catalog, account lookup, the expiry
//! notifier batch job and the period report.

pub mod accounts;
pub mod catalog;
pub mod engine;
pub mod entitlement;
pub mod notifier;
pub mod report;
