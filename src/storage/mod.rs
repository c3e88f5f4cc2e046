//! Pending-transaction pool and durable block/stake storage

pub mod persistence;
pub mod pool;

pub use persistence::{InMemoryStore, Persistence, SledStore};
pub use pool::{RejectReason, TransactionPool};
