//! Inbound adapters.

pub mod csv;
