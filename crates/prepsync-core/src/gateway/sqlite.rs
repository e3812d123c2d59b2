//! SQLite persistence gateway
//!
//! Durable store behind the sync server when run from the CLI. The
//! connection sits behind an async mutex; individual statements are
//! short-lived, so they run directly on the calling task.
//!
//! Tables:
//! - `time_slots` - one row per pickup slot, ordered by `position`
//! - `orders` - one row per order
//! - `order_items` - line items, children of orders

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use super::{GatewayError, GatewayResult, PersistenceGateway};
use crate::models::{NewOrder, OrderRow, TimeSlot};

/// Persistence gateway backed by a SQLite database
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> GatewayResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> GatewayResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> GatewayResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert the day's slot sequence if the slot table is empty.
    ///
    /// Returns true when the seed was applied.
    pub async fn seed_slots(&self, labels: &[String]) -> GatewayResult<bool> {
        let mut conn = self.conn.lock().await;

        let existing: i64 =
            conn.query_row("SELECT COUNT(*) FROM time_slots", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(false);
        }

        let tx = conn.transaction()?;
        for (position, label) in labels.iter().enumerate() {
            tx.execute(
                "INSERT INTO time_slots (position, label, occupied) VALUES (?1, ?2, 0)",
                params![position as i64, label],
            )?;
        }
        tx.commit()?;
        Ok(true)
    }

    /// Reset all slots to unoccupied (start-of-day maintenance)
    pub async fn clear_occupancy(&self) -> GatewayResult<()> {
        let conn = self.conn.lock().await;
        conn.execute("UPDATE time_slots SET occupied = 0", [])?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS time_slots (
            position INTEGER PRIMARY KEY,
            label TEXT UNIQUE NOT NULL,
            occupied INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            phone TEXT NOT NULL,
            state TEXT NOT NULL,
            price REAL NOT NULL,
            time_slot TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS order_items (
            order_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            qty INTEGER NOT NULL,
            FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_order_items_order_id
            ON order_items(order_id);
        "#,
    )
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn load_day_slots(&self) -> GatewayResult<Vec<TimeSlot>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT label, occupied FROM time_slots ORDER BY position")?;

        let slots = stmt
            .query_map([], |row| {
                Ok(TimeSlot {
                    label: row.get(0)?,
                    occupied: row.get::<_, i64>(1)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(slots)
    }

    async fn save_order(&self, order: &NewOrder) -> GatewayResult<i64> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO orders (last_name, first_name, phone, state, price, time_slot)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                order.last_name,
                order.first_name,
                order.phone,
                order.state,
                order.price,
                order.time_slot,
            ],
        )?;
        let order_id = tx.last_insert_rowid();

        for item in &order.items {
            tx.execute(
                "INSERT INTO order_items (order_id, name, qty) VALUES (?1, ?2, ?3)",
                params![order_id, item.name, item.qty],
            )?;
        }

        tx.commit()?;
        Ok(order_id)
    }

    async fn save_occupied_slots(&self, labels: &[String]) -> GatewayResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for label in labels {
            tx.execute(
                "UPDATE time_slots SET occupied = 1 WHERE label = ?1",
                params![label],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn load_orders(&self) -> GatewayResult<Vec<OrderRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"
            SELECT o.id, o.last_name, o.first_name, o.phone, o.state,
                   o.price, o.time_slot, i.name, i.qty
            FROM orders o
            JOIN order_items i ON i.order_id = o.id
            ORDER BY o.id, i.rowid
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(OrderRow {
                    order_id: row.get(0)?,
                    last_name: row.get(1)?,
                    first_name: row.get(2)?,
                    phone: row.get(3)?,
                    state: row.get(4)?,
                    price: row.get(5)?,
                    time_slot: row.get(6)?,
                    item_name: row.get(7)?,
                    item_qty: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    async fn save_order_state(&self, order_id: i64, state: &str) -> GatewayResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE orders SET state = ?1 WHERE id = ?2",
            params![state, order_id],
        )?;

        if changed == 0 {
            return Err(GatewayError::UnknownOrder(order_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{group_orders, OrderItem};

    fn order(time_slot: &str, items: Vec<OrderItem>) -> NewOrder {
        NewOrder {
            last_name: "Doe".to_string(),
            first_name: "Jane".to_string(),
            phone: "0600000000".to_string(),
            time_slot: time_slot.to_string(),
            total_qty: items.iter().map(|i| i.qty).sum(),
            items,
            price: 21.0,
            state: "pending".to_string(),
        }
    }

    fn labels(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[tokio::test]
    async fn test_seed_slots_only_once() {
        let gateway = SqliteGateway::open_in_memory().unwrap();

        assert!(gateway.seed_slots(&labels(&["12:00", "12:15"])).await.unwrap());
        assert!(!gateway.seed_slots(&labels(&["18:00"])).await.unwrap());

        let slots = gateway.load_day_slots().await.unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0], TimeSlot::free("12:00"));
        assert_eq!(slots[1], TimeSlot::free("12:15"));
    }

    #[tokio::test]
    async fn test_save_occupied_slots_round_trip() {
        let gateway = SqliteGateway::open_in_memory().unwrap();
        gateway
            .seed_slots(&labels(&["12:00", "12:15", "12:30"]))
            .await
            .unwrap();

        gateway
            .save_occupied_slots(&labels(&["12:15", "12:30"]))
            .await
            .unwrap();

        let slots = gateway.load_day_slots().await.unwrap();
        assert!(!slots[0].occupied);
        assert!(slots[1].occupied);
        assert!(slots[2].occupied);

        gateway.clear_occupancy().await.unwrap();
        let slots = gateway.load_day_slots().await.unwrap();
        assert!(slots.iter().all(|s| !s.occupied));
    }

    #[tokio::test]
    async fn test_load_orders_flat_rows_group_back() {
        let gateway = SqliteGateway::open_in_memory().unwrap();

        let id = gateway
            .save_order(&order(
                "12:30",
                vec![
                    OrderItem {
                        name: "margherita".to_string(),
                        qty: 1,
                    },
                    OrderItem {
                        name: "regina".to_string(),
                        qty: 2,
                    },
                ],
            ))
            .await
            .unwrap();

        let rows = gateway.load_orders().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.order_id == id));

        let grouped = group_orders(rows);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].items.len(), 2);
        assert_eq!(grouped[0].time_slot, "12:30");
    }

    #[tokio::test]
    async fn test_reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prepsync.db");

        {
            let gateway = SqliteGateway::open(&path).unwrap();
            gateway.seed_slots(&labels(&["12:00", "12:15"])).await.unwrap();
            gateway.save_occupied_slots(&labels(&["12:15"])).await.unwrap();
        }

        let gateway = SqliteGateway::open(&path).unwrap();
        let slots = gateway.load_day_slots().await.unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots[1].occupied);
    }

    #[tokio::test]
    async fn test_save_order_state() {
        let gateway = SqliteGateway::open_in_memory().unwrap();
        let id = gateway
            .save_order(&order(
                "12:30",
                vec![OrderItem {
                    name: "margherita".to_string(),
                    qty: 1,
                }],
            ))
            .await
            .unwrap();

        gateway.save_order_state(id, "ready").await.unwrap();
        let rows = gateway.load_orders().await.unwrap();
        assert_eq!(rows[0].state, "ready");

        let err = gateway.save_order_state(id + 100, "ready").await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownOrder(_)));
    }
}
