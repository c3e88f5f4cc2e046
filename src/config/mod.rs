//! Configuration for the ledger core
//!
//! All tunable parameters live in an immutable [`ChainConfig`] constructed up
//! front and threaded into the mining engine, consensus coordinator, pool, and
//! ledger facade. There is no process-wide mutable configuration.

pub mod settings;

pub use settings::ChainConfig;
