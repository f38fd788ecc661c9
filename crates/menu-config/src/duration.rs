//! Duration strings of the form `168h`, `1h30m` or `1.5s`.
//!
//! A string is a sequence of decimal numbers, each with an optional fraction
//! and a unit suffix. Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m`
//! and `h`. A bare `0` is also accepted.

use crate::ConfigError;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const COMPONENT: &str = r"^(\d+\.?\d*|\.\d+)(ns|us|µs|ms|s|m|h)";

static COMPONENT_RE: OnceLock<Regex> = OnceLock::new();

fn component_re() -> &'static Regex {
	COMPONENT_RE
		.get_or_init(|| Regex::new(COMPONENT).expect("duration component pattern is valid"))
}

fn unit_nanos(unit: &str) -> f64 {
	match unit {
		"ns" => 1.0,
		"us" | "µs" => 1e3,
		"ms" => 1e6,
		"s" => 1e9,
		"m" => 60.0 * 1e9,
		_ => 3600.0 * 1e9,
	}
}

/// Parses a duration string.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
	let invalid = || ConfigError::InvalidDuration(input.to_string());

	let trimmed = input.trim();
	if trimmed == "0" {
		return Ok(Duration::ZERO);
	}
	if trimmed.is_empty() {
		return Err(invalid());
	}

	let component = component_re();
	let mut rest = trimmed;
	let mut nanos = 0f64;
	while !rest.is_empty() {
		let caps = component.captures(rest).ok_or_else(invalid)?;
		let value: f64 = caps[1].parse().map_err(|_| invalid())?;
		nanos += value * unit_nanos(&caps[2]);
		rest = &rest[caps[0].len()..];
	}

	if !nanos.is_finite() || nanos > u64::MAX as f64 {
		return Err(invalid());
	}
	Ok(Duration::from_nanos(nanos.round() as u64))
}
