//! HTML scraping catalog source.
//!
//! The store lists its categories in a `<select name="target">` on the shop
//! page; every category has its own page with one `div.formbody` form per
//! item. One category can be designated as the drinks category, whose items
//! are reported as drinks instead of store items.

use crate::{CatalogSourceInterface, SourceError};
use async_trait::async_trait;
use menu_types::{Catalog, Category, Drink, StoreItem, Variant};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://hermans-cafe.de";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";
const DEFAULT_IGNORE_CATEGORIES: [&str; 2] = ["shop", "allergene-zusatzstoffe"];
const DEFAULT_DRINKS_CATEGORY: &str = "getraenke";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CATEGORY_SELECT: &str = "select.select[name=target]";
const ITEM_FORM: &str = "div.formbody";
const ITEM_ID: &str = "input[type=hidden][name=FORM_SUBMIT]";
const ITEM_TITLE: &str = "h3[itemprop=name]";
const ITEM_DESCRIPTION: &str = "div.description";
const ITEM_PRICE: &str = "div.price[itemprop=price]";
const ITEM_VARIANT: &str = "select[name*=variant] option";
const ITEM_DIP: &str = "input[type=checkbox][name*=dip]";

/// Catalog source scraping the store's web shop.
pub struct HttpCatalogSource {
	client: Client,
	base_url: String,
	ignore_categories: Vec<String>,
	drinks_category: Option<String>,
}

impl HttpCatalogSource {
	/// Creates a source from its configuration table.
	///
	/// Configuration parameters:
	/// - `base_url`: store root (default: the café's web shop)
	/// - `user_agent`: user agent header sent with every request
	/// - `ignore_categories`: category ids to skip
	/// - `drinks_category`: category id whose items are drinks; empty disables
	/// - `timeout_secs`: per-request timeout (default: 30)
	pub fn from_config(config: &toml::Value) -> Result<Self, SourceError> {
		let base_url = config
			.get("base_url")
			.and_then(|v| v.as_str())
			.unwrap_or(DEFAULT_BASE_URL)
			.trim_end_matches('/')
			.to_string();

		let user_agent = config
			.get("user_agent")
			.and_then(|v| v.as_str())
			.unwrap_or(DEFAULT_USER_AGENT);

		let ignore_categories = match config.get("ignore_categories").and_then(|v| v.as_array()) {
			Some(values) => values
				.iter()
				.filter_map(|v| v.as_str())
				.map(str::to_string)
				.collect(),
			None => DEFAULT_IGNORE_CATEGORIES
				.iter()
				.map(|s| s.to_string())
				.collect(),
		};

		let drinks_category = config
			.get("drinks_category")
			.and_then(|v| v.as_str())
			.unwrap_or(DEFAULT_DRINKS_CATEGORY);
		let drinks_category = (!drinks_category.is_empty()).then(|| drinks_category.to_string());

		let timeout_secs = config
			.get("timeout_secs")
			.and_then(|v| v.as_integer())
			.map(|v| v.max(1) as u64)
			.unwrap_or(DEFAULT_TIMEOUT_SECS);

		let client = Client::builder()
			.user_agent(user_agent)
			.timeout(Duration::from_secs(timeout_secs))
			.build()
			.map_err(|e| SourceError::Config(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			base_url,
			ignore_categories,
			drinks_category,
		})
	}

	async fn get_page(&self, path: &str) -> Result<String, SourceError> {
		let url = format!("{}/{}", self.base_url, path);
		debug!("Fetching {}", url);

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| SourceError::Http(format!("request to {} failed: {}", url, e)))?;

		if !response.status().is_success() {
			return Err(SourceError::Http(format!(
				"request to {} failed with status {}",
				url,
				response.status()
			)));
		}

		response
			.text()
			.await
			.map_err(|e| SourceError::Http(format!("failed to read body of {}: {}", url, e)))
	}
}

#[async_trait]
impl CatalogSourceInterface for HttpCatalogSource {
	fn name(&self) -> &str {
		"http"
	}

	async fn fetch_catalog(&self) -> Result<Catalog, SourceError> {
		let shop = self.get_page("shop").await?;
		let listed = parse_categories(&shop, &self.ignore_categories)?;

		let mut catalog = Catalog::default();
		for mut category in listed {
			let page = self.get_page(&category.id).await?;
			let items = parse_items(&page)?;

			if self.drinks_category.as_deref() == Some(category.id.as_str()) {
				catalog.drinks.extend(items.into_iter().map(|item| Drink {
					name: item.title,
					description: item.description,
					price: item.price,
				}));
			} else {
				category.items = items;
				catalog.categories.push(category);
			}
		}

		info!(
			"Scraped {} categories with {} items and {} drinks",
			catalog.categories.len(),
			catalog.item_count(),
			catalog.drinks.len()
		);
		Ok(catalog)
	}
}

fn selector(css: &str) -> Result<Selector, SourceError> {
	Selector::parse(css).map_err(|e| SourceError::Parse(format!("bad selector {}: {:?}", css, e)))
}

fn text_of(element: ElementRef<'_>) -> String {
	element.text().collect::<String>().trim().to_string()
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> String {
	scope.select(selector).next().map(text_of).unwrap_or_default()
}

/// Extracts the category list from the shop page, without items.
pub fn parse_categories(html: &str, ignore: &[String]) -> Result<Vec<Category>, SourceError> {
	let document = Html::parse_document(html);
	let select = selector(CATEGORY_SELECT)?;
	let option = selector("option")?;

	let Some(list) = document.select(&select).next() else {
		return Err(SourceError::Parse(
			"shop page contains no category list".to_string(),
		));
	};

	Ok(list
		.select(&option)
		.filter_map(|opt| {
			let id = opt.value().attr("value")?.trim();
			if id.is_empty() || ignore.iter().any(|ignored| ignored == id) {
				return None;
			}
			Some(Category {
				id: id.to_string(),
				name: text_of(opt),
				items: Vec::new(),
			})
		})
		.collect())
}

/// Extracts all store items from a category page.
///
/// Forms without a title are skipped.
pub fn parse_items(html: &str) -> Result<Vec<StoreItem>, SourceError> {
	let document = Html::parse_document(html);
	let form = selector(ITEM_FORM)?;
	let id = selector(ITEM_ID)?;
	let title = selector(ITEM_TITLE)?;
	let description = selector(ITEM_DESCRIPTION)?;
	let price = selector(ITEM_PRICE)?;
	let variant = selector(ITEM_VARIANT)?;
	let dip = selector(ITEM_DIP)?;

	let mut items = Vec::new();
	for body in document.select(&form) {
		let item_title = first_text(body, &title);
		if item_title.is_empty() {
			continue;
		}

		let variants = body
			.select(&variant)
			.filter_map(|opt| {
				let name = opt.value().attr("value")?.trim();
				(!name.is_empty()).then(|| Variant {
					name: name.to_string(),
					description: text_of(opt),
				})
			})
			.collect();

		let mut dips: Vec<String> = Vec::new();
		for input in body.select(&dip) {
			if let Some(name) = input.value().attr("value").map(str::trim) {
				if !name.is_empty() && !dips.iter().any(|d| d == name) {
					dips.push(name.to_string());
				}
			}
		}

		items.push(StoreItem {
			id: body
				.select(&id)
				.next()
				.and_then(|input| input.value().attr("value"))
				.unwrap_or_default()
				.to_string(),
			title: item_title,
			description: first_text(body, &description),
			price: first_text(body, &price),
			variants,
			dips,
		});
	}

	Ok(items)
}
