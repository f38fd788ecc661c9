//! SQLite storage implementation.
//!
//! Selections are normalized into their own tables keyed by order id and
//! position, so option lists keep their order across a round trip. All
//! queries run on the blocking thread pool.

use crate::{OrderStoreInterface, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use menu_types::{DrinkChoice, DrinkSize, Feedback, Order, OrderList, Selection};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const SCHEMA: &str = r#"
	PRAGMA journal_mode=WAL;
	CREATE TABLE IF NOT EXISTS order_list (
		id        TEXT PRIMARY KEY,
		created   TEXT NOT NULL,
		deadline  TEXT
	);
	CREATE TABLE IF NOT EXISTS orders (
		id          TEXT PRIMARY KEY,
		list_id     TEXT NOT NULL REFERENCES order_list(id) ON DELETE CASCADE,
		created     TEXT NOT NULL,
		creator     TEXT NOT NULL,
		edit_key    TEXT NOT NULL,
		drink_name  TEXT,
		drink_size  INTEGER
	);
	CREATE INDEX IF NOT EXISTS orders_by_list ON orders(list_id, created);
	CREATE TABLE IF NOT EXISTS order_item (
		order_id  TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
		position  INTEGER NOT NULL,
		item_id   TEXT NOT NULL,
		PRIMARY KEY (order_id, position)
	);
	CREATE TABLE IF NOT EXISTS order_item_variant (
		order_id  TEXT NOT NULL,
		position  INTEGER NOT NULL,
		idx       INTEGER NOT NULL,
		variant   TEXT NOT NULL,
		FOREIGN KEY (order_id, position) REFERENCES order_item(order_id, position) ON DELETE CASCADE
	);
	CREATE TABLE IF NOT EXISTS order_item_dip (
		order_id  TEXT NOT NULL,
		position  INTEGER NOT NULL,
		idx       INTEGER NOT NULL,
		dip       TEXT NOT NULL,
		FOREIGN KEY (order_id, position) REFERENCES order_item(order_id, position) ON DELETE CASCADE
	);
	CREATE TABLE IF NOT EXISTS feedback (
		id         TEXT PRIMARY KEY,
		timestamp  TEXT NOT NULL,
		kind       TEXT NOT NULL,
		message    TEXT NOT NULL,
		page       TEXT NOT NULL
	);
"#;

impl From<rusqlite::Error> for StorageError {
	fn from(err: rusqlite::Error) -> Self {
		StorageError::Database(err.to_string())
	}
}

/// Order store backed by a single SQLite database file.
#[derive(Clone)]
pub struct SqliteOrderStore {
	conn: Arc<Mutex<Connection>>,
}

impl SqliteOrderStore {
	/// Opens (creating if needed) the database at `path` and applies the schema.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(|e| {
				StorageError::Config(format!("cannot create {}: {}", parent.display(), e))
			})?;
		}

		let conn = Connection::open(path)?;
		conn.pragma_update(None, "foreign_keys", "ON")?;
		conn.execute_batch(SCHEMA)?;

		info!("Opened order database at {}", path.display());
		Ok(Self {
			conn: Arc::new(Mutex::new(conn)),
		})
	}

	async fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
	where
		F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
		T: Send + 'static,
	{
		let conn = self.conn.clone();
		tokio::task::spawn_blocking(move || {
			let mut guard = conn
				.lock()
				.map_err(|_| StorageError::Database("connection lock poisoned".to_string()))?;
			f(&mut guard)
		})
		.await
		.map_err(|e| StorageError::Database(format!("storage task failed: {}", e)))?
	}
}

fn insert_selections(tx: &Transaction<'_>, order_id: &str, items: &[Selection]) -> Result<(), StorageError> {
	for (position, item) in items.iter().enumerate() {
		let position = position as i64;
		tx.execute(
			"INSERT INTO order_item (order_id, position, item_id) VALUES (?1, ?2, ?3)",
			params![order_id, position, item.id],
		)?;
		for (idx, variant) in item.variants.iter().enumerate() {
			tx.execute(
				"INSERT INTO order_item_variant (order_id, position, idx, variant) VALUES (?1, ?2, ?3, ?4)",
				params![order_id, position, idx as i64, variant],
			)?;
		}
		for (idx, dip) in item.dips.iter().enumerate() {
			tx.execute(
				"INSERT INTO order_item_dip (order_id, position, idx, dip) VALUES (?1, ?2, ?3, ?4)",
				params![order_id, position, idx as i64, dip],
			)?;
		}
	}
	Ok(())
}

fn load_selections(conn: &Connection, order_id: &str) -> Result<Vec<Selection>, StorageError> {
	let mut items = conn.prepare(
		"SELECT position, item_id FROM order_item WHERE order_id = ?1 ORDER BY position",
	)?;
	let mut variants = conn.prepare(
		"SELECT variant FROM order_item_variant WHERE order_id = ?1 AND position = ?2 ORDER BY idx",
	)?;
	let mut dips = conn.prepare(
		"SELECT dip FROM order_item_dip WHERE order_id = ?1 AND position = ?2 ORDER BY idx",
	)?;

	let rows = items
		.query_map(params![order_id], |row| {
			Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
		})?
		.collect::<Result<Vec<_>, _>>()?;

	let mut selections = Vec::with_capacity(rows.len());
	for (position, id) in rows {
		selections.push(Selection {
			id,
			variants: variants
				.query_map(params![order_id, position], |row| row.get(0))?
				.collect::<Result<Vec<String>, _>>()?,
			dips: dips
				.query_map(params![order_id, position], |row| row.get(0))?
				.collect::<Result<Vec<String>, _>>()?,
		});
	}
	Ok(selections)
}

struct OrderRow {
	id: String,
	created: DateTime<Utc>,
	creator: String,
	edit_key: String,
	drink_name: Option<String>,
	drink_size: Option<u8>,
}

const ORDER_COLUMNS: &str = "id, created, creator, edit_key, drink_name, drink_size";

fn order_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRow> {
	Ok(OrderRow {
		id: row.get(0)?,
		created: row.get(1)?,
		creator: row.get(2)?,
		edit_key: row.get(3)?,
		drink_name: row.get(4)?,
		drink_size: row.get(5)?,
	})
}

fn hydrate_order(conn: &Connection, row: OrderRow) -> Result<Order, StorageError> {
	let drink = match row.drink_name {
		Some(name) => {
			let size = DrinkSize::try_from(row.drink_size.unwrap_or_default())
				.map_err(StorageError::Database)?;
			Some(DrinkChoice { name, size })
		}
		None => None,
	};

	Ok(Order {
		store_items: load_selections(conn, &row.id)?,
		id: row.id,
		created: row.created,
		creator: row.creator,
		drink,
		edit_key: row.edit_key,
	})
}

fn drink_columns(order: &Order) -> (Option<&str>, Option<u8>) {
	match &order.drink {
		Some(drink) => (Some(drink.name.as_str()), Some(u8::from(drink.size))),
		None => (None, None),
	}
}

#[async_trait]
impl OrderStoreInterface for SqliteOrderStore {
	async fn create_order_list(&self, list: &OrderList) -> Result<(), StorageError> {
		let list = list.clone();
		self.with_conn(move |conn| {
			conn.execute(
				"INSERT INTO order_list (id, created, deadline) VALUES (?1, ?2, ?3)",
				params![list.id, list.created, list.deadline],
			)?;
			Ok(())
		})
		.await
	}

	async fn get_order_list(&self, id: &str) -> Result<OrderList, StorageError> {
		let id = id.to_string();
		self.with_conn(move |conn| {
			conn.query_row(
				"SELECT id, created, deadline FROM order_list WHERE id = ?1",
				params![id],
				|row| {
					Ok(OrderList {
						id: row.get(0)?,
						created: row.get(1)?,
						deadline: row.get(2)?,
						orders: Vec::new(),
					})
				},
			)
			.optional()?
			.ok_or_else(|| StorageError::NotFound(format!("order list {}", id)))
		})
		.await
	}

	async fn delete_order_list(&self, id: &str) -> Result<(), StorageError> {
		let id = id.to_string();
		self.with_conn(move |conn| {
			let removed = conn.execute("DELETE FROM order_list WHERE id = ?1", params![id])?;
			debug!("Deleted order list {} ({} rows)", id, removed);
			Ok(())
		})
		.await
	}

	async fn create_order(&self, list_id: &str, order: &Order) -> Result<(), StorageError> {
		let list_id = list_id.to_string();
		let order = order.clone();
		self.with_conn(move |conn| {
			let tx = conn.transaction()?;
			let exists = tx
				.query_row(
					"SELECT 1 FROM order_list WHERE id = ?1",
					params![list_id],
					|_| Ok(()),
				)
				.optional()?;
			if exists.is_none() {
				return Err(StorageError::NotFound(format!("order list {}", list_id)));
			}

			let (drink_name, drink_size) = drink_columns(&order);
			tx.execute(
				"INSERT INTO orders (id, list_id, created, creator, edit_key, drink_name, drink_size)
				 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
				params![
					order.id,
					list_id,
					order.created,
					order.creator,
					order.edit_key,
					drink_name,
					drink_size
				],
			)?;
			insert_selections(&tx, &order.id, &order.store_items)?;
			tx.commit()?;
			Ok(())
		})
		.await
	}

	async fn get_orders(&self, list_id: &str) -> Result<Vec<Order>, StorageError> {
		let list_id = list_id.to_string();
		self.with_conn(move |conn| {
			let conn: &Connection = conn;
			let mut stmt = conn.prepare(&format!(
				"SELECT {} FROM orders WHERE list_id = ?1 ORDER BY created, rowid",
				ORDER_COLUMNS
			))?;
			let rows = stmt
				.query_map(params![list_id], order_row)?
				.collect::<Result<Vec<_>, _>>()?;
			rows.into_iter()
				.map(|row| hydrate_order(conn, row))
				.collect()
		})
		.await
	}

	async fn get_order(&self, list_id: &str, order_id: &str) -> Result<Order, StorageError> {
		let list_id = list_id.to_string();
		let order_id = order_id.to_string();
		self.with_conn(move |conn| {
			let row = conn
				.query_row(
					&format!(
						"SELECT {} FROM orders WHERE list_id = ?1 AND id = ?2",
						ORDER_COLUMNS
					),
					params![list_id, order_id],
					order_row,
				)
				.optional()?
				.ok_or_else(|| {
					StorageError::NotFound(format!("order {} in list {}", order_id, list_id))
				})?;
			hydrate_order(conn, row)
		})
		.await
	}

	async fn update_order(&self, list_id: &str, order: &Order) -> Result<(), StorageError> {
		let list_id = list_id.to_string();
		let order = order.clone();
		self.with_conn(move |conn| {
			let tx = conn.transaction()?;
			let (drink_name, drink_size) = drink_columns(&order);
			let updated = tx.execute(
				"UPDATE orders SET creator = ?1, drink_name = ?2, drink_size = ?3
				 WHERE list_id = ?4 AND id = ?5",
				params![order.creator, drink_name, drink_size, list_id, order.id],
			)?;
			if updated == 0 {
				return Err(StorageError::NotFound(format!(
					"order {} in list {}",
					order.id, list_id
				)));
			}

			tx.execute("DELETE FROM order_item WHERE order_id = ?1", params![order.id])?;
			insert_selections(&tx, &order.id, &order.store_items)?;
			tx.commit()?;
			Ok(())
		})
		.await
	}

	async fn delete_order(&self, list_id: &str, order_id: &str) -> Result<(), StorageError> {
		let list_id = list_id.to_string();
		let order_id = order_id.to_string();
		self.with_conn(move |conn| {
			conn.execute(
				"DELETE FROM orders WHERE list_id = ?1 AND id = ?2",
				params![list_id, order_id],
			)?;
			Ok(())
		})
		.await
	}

	async fn create_feedback(&self, feedback: &Feedback) -> Result<(), StorageError> {
		let feedback = feedback.clone();
		self.with_conn(move |conn| {
			conn.execute(
				"INSERT INTO feedback (id, timestamp, kind, message, page) VALUES (?1, ?2, ?3, ?4, ?5)",
				params![
					feedback.id,
					feedback.timestamp,
					feedback.kind,
					feedback.message,
					feedback.page
				],
			)?;
			Ok(())
		})
		.await
	}

	async fn list_feedback(&self) -> Result<Vec<Feedback>, StorageError> {
		self.with_conn(|conn| {
			let mut stmt = conn.prepare(
				"SELECT id, timestamp, kind, message, page FROM feedback ORDER BY timestamp, rowid",
			)?;
			let feedback = stmt
				.query_map([], |row| {
					Ok(Feedback {
						id: row.get(0)?,
						timestamp: row.get(1)?,
						kind: row.get(2)?,
						message: row.get(3)?,
						page: row.get(4)?,
					})
				})?
				.collect::<Result<Vec<_>, _>>()?;
			Ok(feedback)
		})
		.await
	}

	async fn clear_all(&self) -> Result<(), StorageError> {
		self.with_conn(|conn| {
			let tx = conn.transaction()?;
			tx.execute_batch(
				"DELETE FROM order_item_variant;
				 DELETE FROM order_item_dip;
				 DELETE FROM order_item;
				 DELETE FROM orders;
				 DELETE FROM order_list;
				 DELETE FROM feedback;",
			)?;
			tx.commit()?;
			info!("Cleared all stored orders and feedback");
			Ok(())
		})
		.await
	}
}
