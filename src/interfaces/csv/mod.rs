//! CSV adapters used by the command-line binary: catalog and operation
//! readers, balance and ledger writers.

pub mod reader;
pub mod writer;
