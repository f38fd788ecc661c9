//! Catalog types describing the scraped store menu.
//!
//! A catalog is treated as one atomic snapshot. It is persisted in a binary
//! format by the snapshot cache, so these types avoid serde attributes that
//! only make sense for self-describing formats.

use serde::{Deserialize, Serialize};

/// The full scraped menu: categories of store items plus drinks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
	/// Ordered categories as they appear in the store.
	pub categories: Vec<Category>,
	/// Drinks offered alongside store items.
	pub drinks: Vec<Drink>,
}

/// A named group of store items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
	pub id: String,
	pub name: String,
	pub items: Vec<StoreItem>,
}

/// A single orderable item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItem {
	/// Identifier, unique within one catalog snapshot.
	pub id: String,
	pub title: String,
	pub description: String,
	/// Price as displayed by the store, e.g. "7,50 €".
	pub price: String,
	/// Selectable variants of this item.
	pub variants: Vec<Variant>,
	/// Names of the dips that may be added to this item.
	pub dips: Vec<String>,
}

/// A named variant of a store item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
	pub name: String,
	pub description: String,
}

/// A drink offered by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drink {
	pub name: String,
	pub description: String,
	pub price: String,
}

impl Catalog {
	/// Looks up a store item by id across all categories.
	///
	/// Categories are scanned in order and the first match wins.
	pub fn find_item(&self, id: &str) -> Option<&StoreItem> {
		self.categories
			.iter()
			.flat_map(|category| category.items.iter())
			.find(|item| item.id == id)
	}

	/// Total number of store items over all categories.
	pub fn item_count(&self) -> usize {
		self.categories.iter().map(|c| c.items.len()).sum()
	}
}

impl StoreItem {
	/// Returns true if the item offers a variant with the given name.
	pub fn has_variant(&self, name: &str) -> bool {
		self.variants.iter().any(|v| v.name == name)
	}

	/// Returns true if the item offers a dip with the given name.
	pub fn has_dip(&self, name: &str) -> bool {
		self.dips.iter().any(|d| d == name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(id: &str, title: &str) -> StoreItem {
		StoreItem {
			id: id.to_string(),
			title: title.to_string(),
			..Default::default()
		}
	}

	#[test]
	fn test_find_item_first_match_wins() {
		let catalog = Catalog {
			categories: vec![
				Category {
					id: "a".into(),
					name: "A".into(),
					items: vec![item("pizza", "first")],
				},
				Category {
					id: "b".into(),
					name: "B".into(),
					items: vec![item("pizza", "second"), item("pasta", "pasta")],
				},
			],
			drinks: vec![],
		};

		assert_eq!(catalog.find_item("pizza").unwrap().title, "first");
		assert_eq!(catalog.find_item("pasta").unwrap().title, "pasta");
		assert!(catalog.find_item("salad").is_none());
		assert_eq!(catalog.item_count(), 3);
	}

	#[test]
	fn test_variant_and_dip_membership() {
		let pizza = StoreItem {
			variants: vec![Variant {
				name: "extra cheese".into(),
				description: String::new(),
			}],
			dips: vec!["garlic".into()],
			..item("pizza", "Pizza")
		};

		assert!(pizza.has_variant("extra cheese"));
		assert!(!pizza.has_variant("pineapple"));
		assert!(pizza.has_dip("garlic"));
		assert!(!pizza.has_dip("ketchup"));
	}

	#[test]
	fn test_json_field_names() {
		let json = serde_json::to_value(Catalog {
			categories: vec![Category {
				id: "c".into(),
				name: "C".into(),
				items: vec![item("i", "I")],
			}],
			drinks: vec![],
		})
		.unwrap();

		assert_eq!(json["categories"][0]["items"][0]["id"], "i");
		assert!(json["drinks"].as_array().unwrap().is_empty());
	}
}
