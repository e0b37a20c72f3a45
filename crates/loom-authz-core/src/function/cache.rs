// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide cache of compiled regular expressions.
//!
//! Pattern-based built-ins are called once per policy row, usually with the
//! same handful of patterns, so compiled regexes are kept by source text.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::Regex;

use crate::error::FunctionError;

/// Maximum number of cached patterns before the cache is reset.
const CAPACITY: usize = 1024;

static PATTERNS: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

/// Returns the compiled form of `pattern`, compiling and caching it on a miss.
pub(crate) fn compiled(pattern: &str) -> Result<Regex, FunctionError> {
	let cache = PATTERNS.get_or_init(|| RwLock::new(HashMap::new()));

	if let Some(regex) = cache.read().get(pattern) {
		return Ok(regex.clone());
	}

	let regex = Regex::new(pattern).map_err(|e| FunctionError::InvalidPattern {
		pattern: pattern.to_string(),
		message: e.to_string(),
	})?;

	let mut patterns = cache.write();
	if patterns.len() >= CAPACITY {
		patterns.clear();
	}
	patterns.insert(pattern.to_string(), regex.clone());
	Ok(regex)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn compiles_and_reuses_pattern() {
		let first = compiled("^/users/[0-9]+$").unwrap();
		let second = compiled("^/users/[0-9]+$").unwrap();
		assert_eq!(first.as_str(), second.as_str());
		assert!(second.is_match("/users/42"));
	}

	#[test]
	fn invalid_pattern_reports_source() {
		let err = compiled("(unclosed").unwrap_err();
		assert!(matches!(
			err,
			FunctionError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"
		));
	}
}
