// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enforcer runtime switches.

use loom_authz_core::DEFAULT_MAX_HIERARCHY_LEVEL;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnforcerConfigLayer {
	pub enabled: Option<bool>,
	pub auto_build_role_links: Option<bool>,
	pub max_hierarchy_level: Option<u32>,
	pub log_decisions: Option<bool>,
}

impl EnforcerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.auto_build_role_links.is_some() {
			self.auto_build_role_links = other.auto_build_role_links;
		}
		if other.max_hierarchy_level.is_some() {
			self.max_hierarchy_level = other.max_hierarchy_level;
		}
		if other.log_decisions.is_some() {
			self.log_decisions = other.log_decisions;
		}
	}

	pub fn finalize(self) -> EnforcerConfig {
		EnforcerConfig {
			enabled: self.enabled.unwrap_or(true),
			auto_build_role_links: self.auto_build_role_links.unwrap_or(true),
			max_hierarchy_level: self
				.max_hierarchy_level
				.unwrap_or(DEFAULT_MAX_HIERARCHY_LEVEL as u32),
			log_decisions: self.log_decisions.unwrap_or(false),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnforcerConfig {
	/// When false every enforcement call is allowed without evaluation.
	pub enabled: bool,
	/// Rebuild role graphs after every grouping-rule mutation.
	pub auto_build_role_links: bool,
	/// Maximum depth of a role inheritance walk.
	pub max_hierarchy_level: u32,
	/// Emit an `info` event for every decision.
	pub log_decisions: bool,
}

impl Default for EnforcerConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			auto_build_role_links: true,
			max_hierarchy_level: DEFAULT_MAX_HIERARCHY_LEVEL as u32,
			log_decisions: false,
		}
	}
}
