//! Order list and order types.
//!
//! Orders reference catalog items by id together with the chosen variant
//! and dip names. Structural rules (required fields, uniqueness) are
//! declared with `validator` derives; membership of the chosen names in the
//! catalog is checked separately against a catalog snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::{Validate, ValidationError};

/// A shared list that collects orders until its deadline passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderList {
	pub id: String,
	pub created: DateTime<Utc>,
	/// Orders are only accepted before this instant, if set.
	pub deadline: Option<DateTime<Utc>>,
	/// Populated on read; never persisted inline.
	#[serde(default)]
	pub orders: Vec<Order>,
}

impl OrderList {
	/// Creates a new, empty order list with a fresh id.
	pub fn new(deadline: Option<DateTime<Utc>>) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			created: Utc::now(),
			deadline,
			orders: Vec::new(),
		}
	}

	/// Returns true once the deadline lies before `now`.
	pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
		matches!(self.deadline, Some(deadline) if deadline < now)
	}
}

/// Size of an ordered drink, encoded as `0` (small) or `1` (large).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DrinkSize {
	#[default]
	Small,
	Large,
}

impl TryFrom<u8> for DrinkSize {
	type Error = String;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(DrinkSize::Small),
			1 => Ok(DrinkSize::Large),
			other => Err(format!("invalid drink size {}, expected 0 or 1", other)),
		}
	}
}

impl From<DrinkSize> for u8 {
	fn from(size: DrinkSize) -> Self {
		match size {
			DrinkSize::Small => 0,
			DrinkSize::Large => 1,
		}
	}
}

/// The drink chosen with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DrinkChoice {
	#[validate(length(min = 1, message = "drink name is required"))]
	pub name: String,
	#[serde(default)]
	pub size: DrinkSize,
}

/// A chosen store item plus the variant and dip names picked for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Selection {
	#[validate(length(min = 1, message = "store item id is required"))]
	pub id: String,
	#[serde(default)]
	#[validate(custom(function = "unique_names"))]
	pub variants: Vec<String>,
	#[serde(default)]
	#[validate(custom(function = "unique_names"))]
	pub dips: Vec<String>,
}

/// The client-supplied, mutable part of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OrderDraft {
	#[validate(custom(function = "not_blank"))]
	pub creator: String,
	#[serde(default)]
	#[validate(length(min = 1, message = "at least one store item is required"), nested)]
	pub store_items: Vec<Selection>,
	#[serde(default)]
	#[validate(nested)]
	pub drink: Option<DrinkChoice>,
}

/// A persisted order.
///
/// The edit key is never serialized; it leaves the service exactly once,
/// wrapped in an [`OrderReceipt`] when the order is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	pub id: String,
	pub created: DateTime<Utc>,
	pub creator: String,
	pub store_items: Vec<Selection>,
	pub drink: Option<DrinkChoice>,
	#[serde(skip)]
	pub edit_key: String,
}

impl Order {
	/// Builds a new order from a draft, generating id, timestamp and edit key.
	pub fn from_draft(draft: OrderDraft) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			created: Utc::now(),
			creator: draft.creator,
			store_items: draft.store_items,
			drink: draft.drink,
			edit_key: uuid::Uuid::new_v4().to_string(),
		}
	}

	/// Overwrites the mutable fields with the draft's values.
	///
	/// Id, creation timestamp and edit key stay untouched.
	pub fn apply(&mut self, draft: OrderDraft) {
		self.creator = draft.creator;
		self.store_items = draft.store_items;
		self.drink = draft.drink;
	}
}

/// Response for a freshly created order, the only one carrying the edit key.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
	#[serde(flatten)]
	pub order: Order,
	#[serde(rename = "editKey")]
	pub edit_key: String,
}

impl From<Order> for OrderReceipt {
	fn from(order: Order) -> Self {
		let edit_key = order.edit_key.clone();
		Self { order, edit_key }
	}
}

fn unique_names(names: &[String]) -> Result<(), ValidationError> {
	let mut seen = HashSet::new();
	if names.iter().all(|name| seen.insert(name.as_str())) {
		Ok(())
	} else {
		Err(ValidationError::new("unique").with_message("names must be unique".into()))
	}
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
	if value.trim().is_empty() {
		return Err(ValidationError::new("required").with_message("creator is required".into()));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;

	fn draft() -> OrderDraft {
		OrderDraft {
			creator: "alice".into(),
			store_items: vec![Selection {
				id: "pizza".into(),
				variants: vec!["extra cheese".into()],
				dips: vec!["garlic".into()],
			}],
			drink: Some(DrinkChoice {
				name: "cola".into(),
				size: DrinkSize::Large,
			}),
		}
	}

	#[test]
	fn test_valid_draft() {
		assert!(draft().validate().is_ok());
	}

	#[test]
	fn test_blank_creator_rejected() {
		let mut d = draft();
		d.creator = "   ".into();
		let errors = d.validate().unwrap_err();
		assert!(errors.field_errors().contains_key("creator"));
	}

	#[test]
	fn test_empty_selection_list_rejected() {
		let mut d = draft();
		d.store_items.clear();
		let errors = d.validate().unwrap_err();
		assert!(errors.field_errors().contains_key("store_items"));
	}

	#[test]
	fn test_duplicate_dips_rejected() {
		let mut d = draft();
		d.store_items[0].dips = vec!["garlic".into(), "garlic".into()];
		assert!(d.validate().is_err());
	}

	#[test]
	fn test_drink_size_encoding() {
		let json = serde_json::to_value(DrinkChoice {
			name: "water".into(),
			size: DrinkSize::Large,
		})
		.unwrap();
		assert_eq!(json["size"], 1);

		let parsed: Result<DrinkChoice, _> =
			serde_json::from_str(r#"{"name":"water","size":2}"#);
		assert!(parsed.is_err());
	}

	#[test]
	fn test_edit_key_only_in_receipt() {
		let order = Order::from_draft(draft());
		assert!(!order.edit_key.is_empty());

		let plain = serde_json::to_value(&order).unwrap();
		assert!(plain.get("edit_key").is_none());
		assert!(plain.get("editKey").is_none());

		let receipt = serde_json::to_value(OrderReceipt::from(order.clone())).unwrap();
		assert_eq!(receipt["editKey"], order.edit_key.as_str());
		assert_eq!(receipt["id"], order.id.as_str());
	}

	#[test]
	fn test_apply_keeps_identity() {
		let mut order = Order::from_draft(draft());
		let (id, created, key) = (order.id.clone(), order.created, order.edit_key.clone());

		let mut update = draft();
		update.creator = "bob".into();
		update.drink = None;
		order.apply(update);

		assert_eq!(order.id, id);
		assert_eq!(order.created, created);
		assert_eq!(order.edit_key, key);
		assert_eq!(order.creator, "bob");
		assert!(order.drink.is_none());
	}

	#[test]
	fn test_deadline_state() {
		let now = Utc::now();
		assert!(!OrderList::new(None).is_closed_at(now));
		assert!(OrderList::new(Some(now - Duration::seconds(1))).is_closed_at(now));
		assert!(!OrderList::new(Some(now + Duration::hours(1))).is_closed_at(now));
	}
}
