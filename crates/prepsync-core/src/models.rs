//! Data models for prepsync
//!
//! Defines the pickup slot, order, and wire-facing order structures.
//! Field renames follow the wire format the storefront clients already
//! speak (`idOrder`, `timeSlot`, `pizzas`, ...).

use serde::{Deserialize, Serialize};

/// A discrete pickup-time unit within one operating day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Zero-padded `HH:MM` label, unique within the day
    pub label: String,
    /// Whether a committed order occupies this slot
    pub occupied: bool,
}

impl TimeSlot {
    /// Create a free slot with the given label
    pub fn free(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            occupied: false,
        }
    }

    /// Create an occupied slot with the given label
    pub fn taken(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            occupied: true,
        }
    }
}

/// A single line item on an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub qty: u32,
}

/// Default lifecycle state for a freshly placed order
fn default_state() -> String {
    "pending".to_string()
}

/// An order as submitted by a client, before the store assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    pub phone: String,
    /// Requested pickup slot label
    #[serde(rename = "timeSlot")]
    pub time_slot: String,
    /// Total capacity units the order consumes (one per item prepared)
    #[serde(rename = "totalQty")]
    pub total_qty: u32,
    #[serde(rename = "pizzas")]
    pub items: Vec<OrderItem>,
    pub price: f64,
    #[serde(default = "default_state")]
    pub state: String,
}

/// One row of the flat order listing returned by the persistence store.
///
/// The store returns one row per line item; [`group_orders`] folds them
/// back into nested order objects.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub phone: String,
    pub state: String,
    pub price: f64,
    pub time_slot: String,
    pub item_name: String,
    pub item_qty: u32,
}

/// An order with its line items nested, as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedOrder {
    #[serde(rename = "idOrder")]
    pub id_order: i64,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    pub phone: String,
    pub state: String,
    pub price: f64,
    #[serde(rename = "timeSlot")]
    pub time_slot: String,
    #[serde(rename = "pizzas")]
    pub items: Vec<OrderItem>,
}

/// Group flat line-item rows into one entry per order id.
///
/// Rows sharing an `order_id` contribute to a single [`GroupedOrder`];
/// first-seen order of the ids is preserved.
pub fn group_orders(rows: Vec<OrderRow>) -> Vec<GroupedOrder> {
    let mut grouped: Vec<GroupedOrder> = Vec::new();

    for row in rows {
        let item = OrderItem {
            name: row.item_name,
            qty: row.item_qty,
        };

        match grouped.iter_mut().find(|o| o.id_order == row.order_id) {
            Some(order) => order.items.push(item),
            None => grouped.push(GroupedOrder {
                id_order: row.order_id,
                last_name: row.last_name,
                first_name: row.first_name,
                phone: row.phone,
                state: row.state,
                price: row.price,
                time_slot: row.time_slot,
                items: vec![item],
            }),
        }
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(order_id: i64, item_name: &str, item_qty: u32) -> OrderRow {
        OrderRow {
            order_id,
            last_name: "Doe".to_string(),
            first_name: "Jane".to_string(),
            phone: "0600000000".to_string(),
            state: "pending".to_string(),
            price: 24.0,
            time_slot: "12:30".to_string(),
            item_name: item_name.to_string(),
            item_qty,
        }
    }

    #[test]
    fn test_group_orders_merges_shared_id() {
        let rows = vec![row(1, "margherita", 1), row(1, "regina", 1)];

        let grouped = group_orders(rows);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].id_order, 1);
        assert_eq!(grouped[0].items.len(), 2);
        assert_eq!(grouped[0].items[0].name, "margherita");
        assert_eq!(grouped[0].items[1].name, "regina");
    }

    #[test]
    fn test_group_orders_keeps_distinct_ids_separate() {
        let rows = vec![row(1, "margherita", 2), row(2, "regina", 1)];

        let grouped = group_orders(rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].id_order, 1);
        assert_eq!(grouped[1].id_order, 2);
        assert_eq!(grouped[0].items.len(), 1);
        assert_eq!(grouped[1].items.len(), 1);
    }

    #[test]
    fn test_group_orders_preserves_first_seen_order() {
        let rows = vec![row(3, "a", 1), row(1, "b", 1), row(3, "c", 1)];

        let grouped = group_orders(rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].id_order, 3);
        assert_eq!(grouped[0].items.len(), 2);
        assert_eq!(grouped[1].id_order, 1);
    }

    #[test]
    fn test_new_order_wire_fields() {
        let json = r#"{
            "lastName": "Doe",
            "firstName": "Jane",
            "phone": "0600000000",
            "timeSlot": "12:30",
            "totalQty": 2,
            "pizzas": [{"name": "margherita", "qty": 2}],
            "price": 18.5
        }"#;

        let order: NewOrder = serde_json::from_str(json).unwrap();
        assert_eq!(order.time_slot, "12:30");
        assert_eq!(order.total_qty, 2);
        assert_eq!(order.state, "pending");
        assert_eq!(order.items[0].qty, 2);
    }
}
