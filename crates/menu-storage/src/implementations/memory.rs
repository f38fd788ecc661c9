//! In-memory storage implementation.
//!
//! Orders live next to the list they belong to, so creating an order and
//! deleting its list can never interleave into an orphaned order.

use crate::{OrderStoreInterface, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use menu_types::{Feedback, Order, OrderList};
use std::sync::Arc;
use tokio::sync::RwLock;

struct ListEntry {
	list: OrderList,
	orders: Vec<Order>,
}

/// In-memory order store.
#[derive(Clone, Default)]
pub struct MemoryOrderStore {
	lists: Arc<DashMap<String, ListEntry>>,
	feedback: Arc<RwLock<Vec<Feedback>>>,
}

impl MemoryOrderStore {
	pub fn new() -> Self {
		Self::default()
	}
}

fn list_not_found(id: &str) -> StorageError {
	StorageError::NotFound(format!("order list {}", id))
}

fn order_not_found(list_id: &str, order_id: &str) -> StorageError {
	StorageError::NotFound(format!("order {} in list {}", order_id, list_id))
}

#[async_trait]
impl OrderStoreInterface for MemoryOrderStore {
	async fn create_order_list(&self, list: &OrderList) -> Result<(), StorageError> {
		let mut list = list.clone();
		list.orders.clear();
		self.lists.insert(
			list.id.clone(),
			ListEntry {
				list,
				orders: Vec::new(),
			},
		);
		Ok(())
	}

	async fn get_order_list(&self, id: &str) -> Result<OrderList, StorageError> {
		self.lists
			.get(id)
			.map(|entry| entry.list.clone())
			.ok_or_else(|| list_not_found(id))
	}

	async fn delete_order_list(&self, id: &str) -> Result<(), StorageError> {
		self.lists.remove(id);
		Ok(())
	}

	async fn create_order(&self, list_id: &str, order: &Order) -> Result<(), StorageError> {
		let mut entry = self
			.lists
			.get_mut(list_id)
			.ok_or_else(|| list_not_found(list_id))?;
		entry.orders.push(order.clone());
		Ok(())
	}

	async fn get_orders(&self, list_id: &str) -> Result<Vec<Order>, StorageError> {
		Ok(self
			.lists
			.get(list_id)
			.map(|entry| entry.orders.clone())
			.unwrap_or_default())
	}

	async fn get_order(&self, list_id: &str, order_id: &str) -> Result<Order, StorageError> {
		self.lists
			.get(list_id)
			.and_then(|entry| entry.orders.iter().find(|o| o.id == order_id).cloned())
			.ok_or_else(|| order_not_found(list_id, order_id))
	}

	async fn update_order(&self, list_id: &str, order: &Order) -> Result<(), StorageError> {
		let mut entry = self
			.lists
			.get_mut(list_id)
			.ok_or_else(|| order_not_found(list_id, &order.id))?;
		let stored = entry
			.orders
			.iter_mut()
			.find(|o| o.id == order.id)
			.ok_or_else(|| order_not_found(list_id, &order.id))?;

		stored.creator = order.creator.clone();
		stored.store_items = order.store_items.clone();
		stored.drink = order.drink.clone();
		Ok(())
	}

	async fn delete_order(&self, list_id: &str, order_id: &str) -> Result<(), StorageError> {
		if let Some(mut entry) = self.lists.get_mut(list_id) {
			entry.orders.retain(|o| o.id != order_id);
		}
		Ok(())
	}

	async fn create_feedback(&self, feedback: &Feedback) -> Result<(), StorageError> {
		self.feedback.write().await.push(feedback.clone());
		Ok(())
	}

	async fn list_feedback(&self) -> Result<Vec<Feedback>, StorageError> {
		let mut all = self.feedback.read().await.clone();
		all.sort_by_key(|f| f.timestamp);
		Ok(all)
	}

	async fn clear_all(&self) -> Result<(), StorageError> {
		self.lists.clear();
		self.feedback.write().await.clear();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::conformance;

	#[tokio::test]
	async fn test_memory_store_conformance() {
		let store = MemoryOrderStore::new();
		conformance::exercise(&store).await;
	}

	#[tokio::test]
	async fn test_clones_share_state() {
		let store = MemoryOrderStore::new();
		let clone = store.clone();

		let list = OrderList::new(None);
		store.create_order_list(&list).await.unwrap();
		clone
			.create_order(&list.id, &conformance::order("erin"))
			.await
			.unwrap();

		assert_eq!(store.get_orders(&list.id).await.unwrap().len(), 1);
	}
}
