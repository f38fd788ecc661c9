// menu-core/src/error.rs

use menu_cache::CacheError;
use menu_order::OrderError;
use menu_source::SourceError;
use menu_storage::StorageError;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

#[derive(Error, Debug)]
pub enum CoreError {
	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Deadline exceeded: order list {0} no longer accepts orders")]
	DeadlineExceeded(String),

	#[error("Invalid edit key: access denied")]
	AccessDenied,

	#[error("Validation failed: {}", .0.join("; "))]
	ValidationFailed(Vec<String>),

	#[error(transparent)]
	InvalidOrder(#[from] OrderError),

	#[error("Scrape failed: {0}")]
	ScrapeFailed(#[from] SourceError),

	#[error("Storing catalog failed: {0}")]
	StoreFailed(#[from] CacheError),

	#[error("Storage error: {0}")]
	Storage(StorageError),

	#[error("Configuration error: {0}")]
	Configuration(String),

	#[error("Lifecycle error: {0}")]
	Lifecycle(String),
}

/// Coarse classification of a [`CoreError`] for the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	NotFound,
	BadRequest,
	Forbidden,
	Conflict,
	Internal,
}

impl ErrorKind {
	/// Stable machine-readable code.
	pub fn code(self) -> &'static str {
		match self {
			Self::NotFound => "NOT_FOUND",
			Self::BadRequest => "BAD_REQUEST",
			Self::Forbidden => "FORBIDDEN",
			Self::Conflict => "CONFLICT",
			Self::Internal => "INTERNAL",
		}
	}
}

impl CoreError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::NotFound(_) => ErrorKind::NotFound,
			Self::ValidationFailed(_) | Self::InvalidOrder(_) => ErrorKind::BadRequest,
			Self::AccessDenied => ErrorKind::Forbidden,
			Self::DeadlineExceeded(_) => ErrorKind::Conflict,
			Self::ScrapeFailed(_)
			| Self::StoreFailed(_)
			| Self::Storage(_)
			| Self::Configuration(_)
			| Self::Lifecycle(_) => ErrorKind::Internal,
		}
	}

	/// Offending names or field messages carried by client-input errors.
	pub fn details(&self) -> Option<Vec<String>> {
		match self {
			Self::ValidationFailed(messages) => Some(messages.clone()),
			Self::InvalidOrder(err) => Some(err.details()),
			_ => None,
		}
	}
}

impl From<StorageError> for CoreError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(what) => CoreError::NotFound(what),
			other => CoreError::Storage(other),
		}
	}
}

impl From<ValidationErrors> for CoreError {
	fn from(errors: ValidationErrors) -> Self {
		let mut messages = Vec::new();
		flatten_validation_errors("", &errors, &mut messages);
		messages.sort();
		CoreError::ValidationFailed(messages)
	}
}

/// Collects `path: message` lines from nested validation errors.
fn flatten_validation_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
	for (field, kind) in errors.errors() {
		let path = if prefix.is_empty() {
			field.to_string()
		} else {
			format!("{}.{}", prefix, field)
		};

		match kind {
			ValidationErrorsKind::Field(list) => {
				for error in list {
					let message = error
						.message
						.as_ref()
						.map(|m| m.to_string())
						.unwrap_or_else(|| error.code.to_string());
					out.push(format!("{}: {}", path, message));
				}
			}
			ValidationErrorsKind::Struct(inner) => flatten_validation_errors(&path, inner, out),
			ValidationErrorsKind::List(items) => {
				for (index, inner) in items {
					flatten_validation_errors(&format!("{}[{}]", path, index), inner, out);
				}
			}
		}
	}
}
