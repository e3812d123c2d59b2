//! Persistence gateway
//!
//! The contract the sync server consumes for durable orders and slot
//! occupancy. The ledger is only a projection; whatever implements this
//! trait owns the records.
//!
//! Two implementations ship here:
//! - [`MemoryGateway`] - in-process store for tests and demos
//! - [`SqliteGateway`] - SQLite-backed store used by the CLI

mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewOrder, OrderRow, TimeSlot};

pub use memory::MemoryGateway;
pub use sqlite::SqliteGateway;

/// Errors from the persistence store
#[derive(Debug, Error)]
pub enum GatewayError {
    /// SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store refused the write (the legacy store signaled this with a
    /// warning status on the response)
    #[error("store rejected the write: {0}")]
    Rejected(String),

    /// State update targeted an order id the store does not know
    #[error("unknown order id {0}")]
    UnknownOrder(i64),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Durable store for orders and slot occupancy
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Load the full day slot sequence, in chronological order
    async fn load_day_slots(&self) -> GatewayResult<Vec<TimeSlot>>;

    /// Persist a new order and its line items; returns the assigned id
    async fn save_order(&self, order: &NewOrder) -> GatewayResult<i64>;

    /// Durably mark the given slot labels occupied
    async fn save_occupied_slots(&self, labels: &[String]) -> GatewayResult<()>;

    /// Load all orders as flat rows, one per line item
    async fn load_orders(&self) -> GatewayResult<Vec<OrderRow>>;

    /// Update the lifecycle state of an order
    async fn save_order_state(&self, order_id: i64, state: &str) -> GatewayResult<()>;
}
