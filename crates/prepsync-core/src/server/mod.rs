//! Realtime sync server
//!
//! Owns the live WebSocket connection set and the slot ledger, routes
//! inbound messages, coordinates the persistence gateway, and fans state
//! changes back out to every connected client.
//!
//! ## Protocol
//!
//! 1. Client connects; the ledger is reloaded from the store so the
//!    session starts from durable truth
//! 2. Client sends tagged JSON messages (`newOrder`, `getTimeSlots`,
//!    `getOrders`, `setState`)
//! 3. Queries get a targeted reply; order-affecting events are persisted
//!    first, then broadcast to all connections

mod message;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

pub use message::{ClientMessage, ProtocolError, ServerMessage};

use crate::gateway::{GatewayError, PersistenceGateway};
use crate::ledger::{lead_cutoff, SlotLedger};
use crate::models::{group_orders, NewOrder};

/// Errors that stop the accept loop
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to accept connection: {0}")]
    Accept(#[from] std::io::Error),
}

type ConnId = u64;

/// Realtime sync server over one slot ledger and one persistence store
pub struct RealtimeSyncServer {
    gateway: Arc<dyn PersistenceGateway>,
    ledger: Mutex<SlotLedger>,
    connections: Mutex<HashMap<ConnId, mpsc::UnboundedSender<Message>>>,
    next_conn_id: AtomicU64,
    lead_minutes: i64,
    now: fn() -> DateTime<Utc>,
}

impl RealtimeSyncServer {
    /// Create a server over the given store, with the configured minimum
    /// preparation notice in minutes
    pub fn new(gateway: Arc<dyn PersistenceGateway>, lead_minutes: i64) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            ledger: Mutex::new(SlotLedger::new()),
            connections: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            lead_minutes,
            now: Utc::now,
        })
    }

    /// Create a server with a fixed time source (used by tests)
    pub fn with_clock(
        gateway: Arc<dyn PersistenceGateway>,
        lead_minutes: i64,
        now: fn() -> DateTime<Utc>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            ledger: Mutex::new(SlotLedger::new()),
            connections: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            lead_minutes,
            now,
        })
    }

    /// Number of currently registered connections
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Accept WebSocket connections until the listener fails
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = listener.accept().await?;
            debug!("incoming connection from {addr}");
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                server.handle_connection(stream).await;
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(s) => s,
            Err(e) => {
                warn!("websocket handshake failed: {e}");
                return;
            }
        };

        // Every new session starts from durable truth; occupancy may have
        // drifted while this process was running.
        if let Err(e) = self.reload_ledger().await {
            error!("failed to reload slot ledger from store: {e}");
        }

        let (mut sink, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().await.insert(conn_id, tx);
        info!("connection {conn_id} registered");

        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.route(conn_id, &text).await {
                        // Malformed input never takes the connection down.
                        warn!("connection {conn_id}: {e}");
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("connection {conn_id} read error: {e}");
                    break;
                }
            }
        }

        self.connections.lock().await.remove(&conn_id);
        writer.abort();
        info!("connection {conn_id} closed");
    }

    /// Reload the ledger from the store, replacing all occupancy state
    async fn reload_ledger(&self) -> Result<(), GatewayError> {
        let slots = self.gateway.load_day_slots().await?;
        self.ledger.lock().await.load(slots);
        Ok(())
    }

    /// Dispatch one inbound frame
    async fn route(&self, conn_id: ConnId, text: &str) -> Result<(), ProtocolError> {
        match ClientMessage::decode(text)? {
            ClientMessage::NewOrder(order) => self.handle_new_order(&order).await,
            ClientMessage::GetTimeSlots(quantity) => {
                self.handle_get_time_slots(conn_id, quantity.unwrap_or(1))
                    .await
            }
            ClientMessage::GetOrders => self.handle_get_orders(conn_id).await,
            ClientMessage::SetState { id_order, state } => {
                self.handle_set_state(id_order, &state).await
            }
        }
        Ok(())
    }

    /// Persist the order, commit its slots, persist the occupancy, then
    /// tell every client to refresh.
    ///
    /// The four steps are strictly ordered; reordering them could leave an
    /// order durable while its slots still look free. Reservation runs as
    /// one check-and-commit step under the ledger lock, so two orders
    /// racing for the same run serialize and the loser is rejected.
    async fn handle_new_order(&self, order: &NewOrder) {
        let order_id = match self.gateway.save_order(order).await {
            Ok(id) => id,
            Err(e) => {
                error!("failed to persist new order: {e}");
                return;
            }
        };

        let changed = {
            let mut ledger = self.ledger.lock().await;
            match ledger.reserve(&order.time_slot, order.total_qty) {
                Ok(changed) => changed,
                Err(e) => {
                    // The order row is already durable; the booking is
                    // rejected and no client is notified.
                    error!("order {order_id} rejected by slot ledger: {e}");
                    return;
                }
            }
        };

        if let Err(e) = self.gateway.save_occupied_slots(&changed).await {
            // Unwind the reservation so the ledger never outruns durable
            // truth; the store still shows these slots free.
            error!("order {order_id}: failed to persist occupied slots: {e}");
            self.ledger.lock().await.release(&changed);
            return;
        }

        info!("order {order_id} committed slots {changed:?}");
        self.broadcast(&ServerMessage::UpdateSlotsRequired).await;
    }

    async fn handle_get_time_slots(&self, conn_id: ConnId, quantity: u32) {
        let cutoff = lead_cutoff((self.now)(), self.lead_minutes);
        let slots = self.ledger.lock().await.available_slots(quantity, &cutoff);
        self.send_to(conn_id, &ServerMessage::UpdateSlots(slots)).await;
    }

    async fn handle_get_orders(&self, conn_id: ConnId) {
        let rows = match self.gateway.load_orders().await {
            Ok(rows) => rows,
            Err(e) => {
                error!("failed to load orders from store: {e}");
                return;
            }
        };
        let grouped = group_orders(rows);
        self.send_to(conn_id, &ServerMessage::UpdateOrders(grouped))
            .await;
    }

    async fn handle_set_state(&self, id_order: i64, state: &str) {
        if let Err(e) = self.gateway.save_order_state(id_order, state).await {
            error!("failed to persist state of order {id_order}: {e}");
            return;
        }

        self.broadcast(&ServerMessage::UpdateState {
            id_order,
            state: state.to_string(),
        })
        .await;
    }

    /// Best-effort fan-out to every registered connection. A connection
    /// whose channel has closed is skipped; no retry, no acknowledgment.
    async fn broadcast(&self, msg: &ServerMessage) {
        let text = msg.encode();
        let connections = self.connections.lock().await;
        for (conn_id, tx) in connections.iter() {
            if tx.send(Message::Text(text.clone())).is_err() {
                debug!("connection {conn_id} gone, skipping broadcast");
            }
        }
    }

    /// Targeted reply to the connection that issued the request
    async fn send_to(&self, conn_id: ConnId, msg: &ServerMessage) {
        let connections = self.connections.lock().await;
        if let Some(tx) = connections.get(&conn_id) {
            if tx.send(Message::Text(msg.encode())).is_err() {
                debug!("connection {conn_id} gone, dropping reply");
            }
        }
    }
}
