//! In-memory persistence gateway
//!
//! Backs the test suite and the demo path. State lives behind a plain
//! mutex; no method awaits while holding it.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{GatewayError, GatewayResult, PersistenceGateway};
use crate::models::{NewOrder, OrderRow, TimeSlot};

#[derive(Debug, Default)]
struct MemoryState {
    slots: Vec<TimeSlot>,
    orders: Vec<(i64, NewOrder)>,
    next_id: i64,
    /// When set, the next write fails once (persistence-failure tests)
    fail_next_write: bool,
    /// When set, every occupancy write fails (ledger unwind tests)
    fail_occupancy_writes: bool,
}

/// Persistence gateway backed by process memory
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway pre-seeded with free slots for the given labels
    pub fn with_free_slots(labels: &[&str]) -> Self {
        let gateway = Self::new();
        {
            let mut state = gateway.state.lock().unwrap();
            state.slots = labels.iter().map(|l| TimeSlot::free(*l)).collect();
            state.next_id = 1;
        }
        gateway
    }

    /// Make the next write operation fail
    pub fn fail_next_write(&self) {
        self.state.lock().unwrap().fail_next_write = true;
    }

    /// Make every occupancy write fail (or succeed again)
    pub fn fail_occupancy_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_occupancy_writes = fail;
    }

    /// Labels currently marked occupied in the store
    pub fn occupied_labels(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.occupied)
            .map(|s| s.label.clone())
            .collect()
    }

    /// Number of orders persisted so far
    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }

    fn take_failure(state: &mut MemoryState) -> GatewayResult<()> {
        if state.fail_next_write {
            state.fail_next_write = false;
            return Err(GatewayError::Rejected("simulated store failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn load_day_slots(&self) -> GatewayResult<Vec<TimeSlot>> {
        Ok(self.state.lock().unwrap().slots.clone())
    }

    async fn save_order(&self, order: &NewOrder) -> GatewayResult<i64> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;

        if state.next_id == 0 {
            state.next_id = 1;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.orders.push((id, order.clone()));
        Ok(id)
    }

    async fn save_occupied_slots(&self, labels: &[String]) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::take_failure(&mut state)?;
        if state.fail_occupancy_writes {
            return Err(GatewayError::Rejected(
                "simulated occupancy write failure".into(),
            ));
        }

        for slot in &mut state.slots {
            if labels.contains(&slot.label) {
                slot.occupied = true;
            }
        }
        Ok(())
    }

    async fn load_orders(&self) -> GatewayResult<Vec<OrderRow>> {
        let state = self.state.lock().unwrap();
        let mut rows = Vec::new();
        for (id, order) in &state.orders {
            for item in &order.items {
                rows.push(OrderRow {
                    order_id: *id,
                    last_name: order.last_name.clone(),
                    first_name: order.first_name.clone(),
                    phone: order.phone.clone(),
                    state: order.state.clone(),
                    price: order.price,
                    time_slot: order.time_slot.clone(),
                    item_name: item.name.clone(),
                    item_qty: item.qty,
                });
            }
        }
        Ok(rows)
    }

    async fn save_order_state(&self, order_id: i64, state: &str) -> GatewayResult<()> {
        let mut inner = self.state.lock().unwrap();
        Self::take_failure(&mut inner)?;

        let order = inner
            .orders
            .iter_mut()
            .find(|(id, _)| *id == order_id)
            .ok_or(GatewayError::UnknownOrder(order_id))?;
        order.1.state = state.to_string();
        Ok(())
    }
}
