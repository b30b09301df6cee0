//! Domain model: accounts, the course catalog, the ledger, and the ports
//! through which they are persisted and notifications are sent.

pub mod account;
pub mod course;
pub mod ports;
pub mod transaction;
