//! Order validation against a catalog snapshot.
//!
//! Validation is a pure function of a catalog and the proposed selections:
//! it performs no I/O and never mutates its inputs. Every selection must
//! reference an existing store item, and every chosen variant and dip must
//! be offered by that item.

use menu_types::{Catalog, Selection, StoreItem};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during order validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
	/// The referenced store item does not exist in the catalog.
	#[error("Invalid store item ID: {0}")]
	InvalidStoreItem(String),
	/// Some chosen variants are not offered by the store item.
	#[error("Invalid variants: {}", .0.join(", "))]
	InvalidVariants(Vec<String>),
	/// Some chosen dips are not offered by the store item.
	#[error("Invalid dips: {}", .0.join(", "))]
	InvalidDips(Vec<String>),
	/// Both variants and dips contain names the store item does not offer.
	#[error("Invalid variants: {}; invalid dips: {}", .variants.join(", "), .dips.join(", "))]
	InvalidOptions {
		variants: Vec<String>,
		dips: Vec<String>,
	},
}

impl OrderError {
	/// The offending names carried by this error, if any.
	pub fn details(&self) -> Vec<String> {
		match self {
			OrderError::InvalidStoreItem(id) => vec![id.clone()],
			OrderError::InvalidVariants(names) | OrderError::InvalidDips(names) => names.clone(),
			OrderError::InvalidOptions { variants, dips } => {
				variants.iter().chain(dips.iter()).cloned().collect()
			}
		}
	}
}

/// Lookup table from store item id to item.
///
/// When ids are duplicated across categories the first occurrence in
/// catalog order wins, matching [`Catalog::find_item`].
pub struct CatalogIndex<'a> {
	items: HashMap<&'a str, &'a StoreItem>,
}

impl<'a> CatalogIndex<'a> {
	pub fn new(catalog: &'a Catalog) -> Self {
		let mut items = HashMap::new();
		for item in catalog.categories.iter().flat_map(|c| c.items.iter()) {
			items.entry(item.id.as_str()).or_insert(item);
		}
		Self { items }
	}

	pub fn get(&self, id: &str) -> Option<&'a StoreItem> {
		self.items.get(id).copied()
	}
}

/// Validates every selection against the catalog.
///
/// Selections are checked in order and the first failing one determines
/// the error. An unknown item id stops immediately; otherwise both the
/// variant and the dip check run so the caller learns every offending name.
pub fn validate_selections(catalog: &Catalog, selections: &[Selection]) -> Result<(), OrderError> {
	let index = CatalogIndex::new(catalog);
	for selection in selections {
		validate_selection(&index, selection)?;
	}
	Ok(())
}

/// Validates one selection against an index.
pub fn validate_selection(index: &CatalogIndex<'_>, selection: &Selection) -> Result<(), OrderError> {
	let item = index
		.get(&selection.id)
		.ok_or_else(|| OrderError::InvalidStoreItem(selection.id.clone()))?;

	let invalid_variants: Vec<String> = selection
		.variants
		.iter()
		.filter(|name| !item.has_variant(name))
		.cloned()
		.collect();

	let invalid_dips: Vec<String> = selection
		.dips
		.iter()
		.filter(|name| !item.has_dip(name))
		.cloned()
		.collect();

	match (invalid_variants.is_empty(), invalid_dips.is_empty()) {
		(true, true) => Ok(()),
		(false, true) => Err(OrderError::InvalidVariants(invalid_variants)),
		(true, false) => Err(OrderError::InvalidDips(invalid_dips)),
		(false, false) => {
			debug!("Selection {} has invalid variants and dips", selection.id);
			Err(OrderError::InvalidOptions {
				variants: invalid_variants,
				dips: invalid_dips,
			})
		}
	}
}
