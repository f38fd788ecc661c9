//! Order list and order lifecycle.
//!
//! An order list is open while its deadline is absent or in the future.
//! Orders are validated structurally and against the current catalog before
//! they are persisted. Mutating or deleting an order requires the edit key
//! handed out once at creation; reads are not gated.

use crate::catalog::CatalogService;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use menu_order::validate_selections;
use menu_storage::OrderStoreInterface;
use menu_types::{Feedback, FeedbackDraft, Order, OrderDraft, OrderList, OrderReceipt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

pub struct OrderManager {
	store: Arc<dyn OrderStoreInterface>,
	catalog: Arc<CatalogService>,
}

/// Compares edit keys without short-circuiting on the first differing byte.
fn keys_match(stored: &str, provided: &str) -> bool {
	let (a, b) = (stored.as_bytes(), provided.as_bytes());
	if a.len() != b.len() {
		return false;
	}
	a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl OrderManager {
	pub fn new(store: Arc<dyn OrderStoreInterface>, catalog: Arc<CatalogService>) -> Self {
		Self { store, catalog }
	}

	#[instrument(skip(self))]
	pub async fn create_order_list(
		&self,
		deadline: Option<DateTime<Utc>>,
	) -> Result<OrderList, CoreError> {
		let list = OrderList::new(deadline);
		self.store.create_order_list(&list).await?;
		info!("Created order list {}", list.id);
		Ok(list)
	}

	/// Loads an order list with its orders populated.
	pub async fn get_order_list(&self, list_id: &str) -> Result<OrderList, CoreError> {
		let mut list = self.store.get_order_list(list_id).await?;
		list.orders = self.store.get_orders(list_id).await?;
		Ok(list)
	}

	/// Loads the orders of a list, failing if the list does not exist.
	pub async fn get_orders(&self, list_id: &str) -> Result<Vec<Order>, CoreError> {
		Ok(self.get_order_list(list_id).await?.orders)
	}

	pub async fn get_order(&self, list_id: &str, order_id: &str) -> Result<Order, CoreError> {
		Ok(self.store.get_order(list_id, order_id).await?)
	}

	pub async fn delete_order_list(&self, list_id: &str) -> Result<(), CoreError> {
		self.store.delete_order_list(list_id).await?;
		info!("Deleted order list {}", list_id);
		Ok(())
	}

	/// Creates an order in an open list.
	///
	/// The returned receipt is the only place the new edit key is exposed.
	#[instrument(skip(self, draft), fields(creator = %draft.creator))]
	pub async fn create_order(
		&self,
		list_id: &str,
		draft: OrderDraft,
	) -> Result<OrderReceipt, CoreError> {
		let list = self.store.get_order_list(list_id).await?;
		if list.is_closed_at(Utc::now()) {
			debug!("Rejecting order for closed list {}", list_id);
			return Err(CoreError::DeadlineExceeded(list_id.to_string()));
		}

		self.validate_draft(&draft).await?;

		let order = Order::from_draft(draft);
		self.store.create_order(list_id, &order).await?;
		info!("Created order {} in list {}", order.id, list_id);

		Ok(OrderReceipt::from(order))
	}

	/// Replaces creator, selections and drink of an existing order.
	#[instrument(skip(self, edit_key, draft))]
	pub async fn update_order(
		&self,
		list_id: &str,
		order_id: &str,
		edit_key: &str,
		draft: OrderDraft,
	) -> Result<Order, CoreError> {
		let mut order = self.authorize(list_id, order_id, edit_key).await?;

		self.validate_draft(&draft).await?;

		order.apply(draft);
		self.store.update_order(list_id, &order).await?;
		info!("Updated order {} in list {}", order.id, list_id);

		Ok(order)
	}

	#[instrument(skip(self, edit_key))]
	pub async fn delete_order(
		&self,
		list_id: &str,
		order_id: &str,
		edit_key: &str,
	) -> Result<(), CoreError> {
		self.authorize(list_id, order_id, edit_key).await?;
		self.store.delete_order(list_id, order_id).await?;
		info!("Deleted order {} in list {}", order_id, list_id);
		Ok(())
	}

	/// Loads the order, then checks the edit key.
	async fn authorize(
		&self,
		list_id: &str,
		order_id: &str,
		edit_key: &str,
	) -> Result<Order, CoreError> {
		let order = self.store.get_order(list_id, order_id).await?;
		if !keys_match(&order.edit_key, edit_key) {
			warn!("Edit key mismatch for order {}", order_id);
			return Err(CoreError::AccessDenied);
		}
		Ok(order)
	}

	async fn validate_draft(&self, draft: &OrderDraft) -> Result<(), CoreError> {
		draft.validate()?;
		let catalog = self.catalog.get_catalog().await?;
		validate_selections(&catalog, &draft.store_items)?;
		Ok(())
	}

	pub async fn submit_feedback(&self, draft: FeedbackDraft) -> Result<Feedback, CoreError> {
		draft.validate()?;
		let feedback = Feedback::from_draft(draft);
		self.store.create_feedback(&feedback).await?;
		info!("Stored {} feedback from {}", feedback.kind, feedback.page);
		Ok(feedback)
	}

	pub async fn list_feedback(&self) -> Result<Vec<Feedback>, CoreError> {
		Ok(self.store.list_feedback().await?)
	}

	/// Removes every order list, order and feedback record.
	pub async fn clear_all(&self) -> Result<(), CoreError> {
		self.store.clear_all().await?;
		warn!("All order data has been cleared");
		Ok(())
	}
}
