// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Serialize;

use crate::store::Rule;

/// Outcome of an enforcement call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Decision {
	pub allowed: bool,
	/// Policy rows that fixed the decision, in evaluation order.
	///
	/// Evaluation stops as soon as the decision cannot change, so this is the
	/// deciding prefix of the matches rather than every matching row. Empty
	/// when no row was needed, e.g. a deny-override check with no deny match.
	pub explain: Vec<Rule>,
}

impl Decision {
	pub fn allow() -> Self {
		Self {
			allowed: true,
			explain: Vec::new(),
		}
	}

	pub fn deny() -> Self {
		Self::default()
	}
}

/// Selects the matcher (and through it the request, policy and effect
/// sections) an enforcement call runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforceContext {
	pub matcher: String,
}

impl Default for EnforceContext {
	fn default() -> Self {
		Self::new("")
	}
}

impl EnforceContext {
	/// Context for the sections sharing `suffix`: `""` gives `m`, `"2"` gives `m2`.
	pub fn new(suffix: &str) -> Self {
		Self {
			matcher: format!("m{suffix}"),
		}
	}

	pub fn for_matcher(matcher: impl Into<String>) -> Self {
		Self {
			matcher: matcher.into(),
		}
	}
}
