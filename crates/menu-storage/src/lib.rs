//! Durable storage for order lists, orders and feedback.
//!
//! This crate provides the persistence interface the order lifecycle is
//! built on, with an in-memory backend for tests and ephemeral runs and a
//! SQLite backend for real deployments. Every mutating call is a single
//! unit of work: an order and all of its selections commit together or not
//! at all.

use async_trait::async_trait;
use menu_types::{Feedback, Order, OrderList};
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod sqlite;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested record is not found.
	#[error("Not found: {0}")]
	NotFound(String),
	/// Error that occurs in the database backend.
	#[error("Database error: {0}")]
	Database(String),
	/// Error that occurs when the backend is misconfigured.
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Trait defining the interface for order storage backends.
///
/// Lookups of single records fail with [`StorageError::NotFound`] when the
/// record is absent, so callers can tell a missing record from a failure.
#[async_trait]
pub trait OrderStoreInterface: Send + Sync {
	/// Persists a new order list. Its `orders` field is ignored.
	async fn create_order_list(&self, list: &OrderList) -> Result<(), StorageError>;

	/// Retrieves an order list without its orders.
	async fn get_order_list(&self, id: &str) -> Result<OrderList, StorageError>;

	/// Deletes an order list together with all of its orders.
	async fn delete_order_list(&self, id: &str) -> Result<(), StorageError>;

	/// Persists a new order in the given list.
	async fn create_order(&self, list_id: &str, order: &Order) -> Result<(), StorageError>;

	/// Retrieves all orders of a list, oldest first.
	async fn get_orders(&self, list_id: &str) -> Result<Vec<Order>, StorageError>;

	/// Retrieves a single order, including its edit key.
	async fn get_order(&self, list_id: &str, order_id: &str) -> Result<Order, StorageError>;

	/// Replaces the stored mutable fields of an existing order.
	async fn update_order(&self, list_id: &str, order: &Order) -> Result<(), StorageError>;

	/// Deletes a single order.
	async fn delete_order(&self, list_id: &str, order_id: &str) -> Result<(), StorageError>;

	/// Persists a feedback record.
	async fn create_feedback(&self, feedback: &Feedback) -> Result<(), StorageError>;

	/// Retrieves all feedback, oldest first.
	async fn list_feedback(&self) -> Result<Vec<Feedback>, StorageError>;

	/// Deletes every order list, order and feedback record.
	async fn clear_all(&self) -> Result<(), StorageError>;
}

/// Factory function to create an order store from configuration.
///
/// Configuration parameters for `sqlite`:
/// - `path`: database file (default: "./data/orders.sqlite")
pub fn create_store(
	store_type: &str,
	config: &toml::Value,
) -> Result<Arc<dyn OrderStoreInterface>, StorageError> {
	match store_type {
		"memory" => Ok(Arc::new(implementations::memory::MemoryOrderStore::new())),
		"sqlite" => {
			let path = config
				.get("path")
				.and_then(|v| v.as_str())
				.unwrap_or("./data/orders.sqlite");
			Ok(Arc::new(implementations::sqlite::SqliteOrderStore::open(
				path,
			)?))
		}
		other => Err(StorageError::Config(format!(
			"Unknown storage type: {}",
			other
		))),
	}
}
