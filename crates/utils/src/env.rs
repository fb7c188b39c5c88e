// Copyright 2025 Irreducible Inc.
//! Helpers for reading configuration from the process environment.

use std::str::FromStr;

/// Parses the environment variable `name` into `T`.
///
/// Returns `Ok(None)` when the variable is unset or empty and `Err` with the raw value when it is
/// set but does not parse.
pub fn parse_env_var<T: FromStr>(name: &str) -> Result<Option<T>, String> {
	match std::env::var(name) {
		Ok(value) if value.trim().is_empty() => Ok(None),
		Ok(value) => value.trim().parse().map(Some).map_err(|_| value),
		Err(_) => Ok(None),
	}
}
