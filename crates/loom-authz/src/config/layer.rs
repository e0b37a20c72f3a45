// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by one source.

use serde::{Deserialize, Serialize};

use super::sections::{EnforcerConfigLayer, ModelConfigLayer};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthzConfigLayer {
	pub enforcer: Option<EnforcerConfigLayer>,
	pub model: Option<ModelConfigLayer>,
}

impl AuthzConfigLayer {
	/// Overlays `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: Self) {
		merge_option(&mut self.enforcer, other.enforcer, EnforcerConfigLayer::merge);
		merge_option(&mut self.model, other.model, ModelConfigLayer::merge);
	}
}

fn merge_option<T>(target: &mut Option<T>, source: Option<T>, merge: fn(&mut T, T)) {
	if let Some(source) = source {
		match target {
			Some(existing) => merge(existing, source),
			None => *target = Some(source),
		}
	}
}
