//! Core engine of the menu ordering system.
//!
//! This crate ties the catalog cache, the catalog source, the order
//! validator and the order store together. [`CatalogService`] owns refresh
//! and hydration of the cached catalog, [`OrderManager`] implements the order
//! list and order lifecycle on top of it, and [`MenuEngine`] owns both plus
//! the background refresh task.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod orders;

pub use catalog::{surprise_category, CatalogService, DEFAULT_REFRESH_INTERVAL};
pub use engine::{EngineBuilder, MenuEngine};
pub use error::{CoreError, ErrorKind};
pub use lifecycle::{LifecycleManager, LifecycleState};
pub use orders::OrderManager;
