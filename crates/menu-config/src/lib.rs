//! Configuration for the menu service.
//!
//! Configuration is read from a TOML file in which `${VAR}` references are
//! replaced with environment values before parsing. A handful of common
//! settings can then be overridden through prefixed environment variables,
//! and the result is validated before it is handed to the service.

use thiserror::Error;

pub mod duration;
pub mod loader;
pub mod types;

pub use duration::parse_duration;
pub use loader::ConfigLoader;
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("Invalid duration: {0:?}")]
	InvalidDuration(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}
