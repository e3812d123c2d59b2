//! prepsync Core Library
//!
//! This crate provides the core functionality for prepsync, a realtime
//! coordination server for pickup-time reservations at a single-location
//! fulfillment operation (originally a pizzeria click-and-collect
//! counter).
//!
//! # Architecture
//!
//! - **SlotLedger**: in-memory occupancy projection of the day's pickup
//!   slots; answers "where does an order of size N fit" under lead-time
//!   and contiguity constraints
//! - **PersistenceGateway**: durable store for orders and slot occupancy;
//!   the ledger is only a cache over it
//! - **RealtimeSyncServer**: WebSocket server owning the ledger and the
//!   live connection set; persists order events in strict sequence and
//!   fans resulting changes out to every client
//!
//! # Modules
//!
//! - `ledger`: slot occupancy and reservation logic
//! - `models`: orders, line items, slots, and order grouping
//! - `gateway`: persistence contract plus memory/SQLite adapters
//! - `server`: connection lifecycle, message routing, broadcast
//! - `config`: application configuration

pub mod config;
pub mod gateway;
pub mod ledger;
pub mod models;
pub mod server;

pub use config::Config;
pub use gateway::{GatewayError, MemoryGateway, PersistenceGateway, SqliteGateway};
pub use ledger::{LedgerError, SlotLedger};
pub use models::{group_orders, GroupedOrder, NewOrder, OrderItem, OrderRow, TimeSlot};
pub use server::{ClientMessage, ProtocolError, RealtimeSyncServer, ServerError, ServerMessage};
