//! Shared data model for the menu ordering system.
//!
//! This crate defines the catalog scraped from the store, the order lists
//! and orders users submit against it, and feedback records. Every other
//! crate in the workspace speaks in these types.

pub mod catalog;
pub mod feedback;
pub mod order;

pub use catalog::*;
pub use feedback::*;
pub use order::*;
