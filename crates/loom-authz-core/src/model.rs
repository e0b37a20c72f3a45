// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured access-control model.
//!
//! A [`Model`] is already-parsed data: field lists for request and policy
//! definitions, role relation definitions, and the matcher and effect
//! expressions. Sections are keyed by name (`r`, `r2`, `p`, `g`, `g2`, `m`,
//! `e`, ...). The TOML form uses the section tables `request_definition`,
//! `policy_definition`, `role_definition`, `policy_effect` and `matchers`.
//!
//! Section pairing: matcher `mX` binds to `rX`, `pX` and `eX`, falling back to
//! `r`, `p` and `e` when the suffixed section does not exist.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};

/// Name of the policy field that carries a row's effect tag.
pub const EFFECT_FIELD: &str = "eft";

/// Name of the policy field that carries a row's integer priority.
pub const PRIORITY_FIELD: &str = "priority";

/// Declarative model: request/policy shapes, role relations, matcher and effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
	#[serde(rename = "request_definition", default)]
	pub requests: BTreeMap<String, Vec<String>>,
	#[serde(rename = "policy_definition", default)]
	pub policies: BTreeMap<String, Vec<String>>,
	#[serde(rename = "role_definition", default)]
	pub roles: BTreeMap<String, RoleDefinition>,
	#[serde(rename = "policy_effect", default)]
	pub effects: BTreeMap<String, String>,
	#[serde(rename = "matchers", default)]
	pub matchers: BTreeMap<String, String>,
}

/// Definition of one role relation (`g`, `g2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
	/// Number of columns in a grouping rule: child, parent, then domains.
	#[serde(default = "default_arity")]
	pub arity: usize,
	/// Registered predicate used to match role names as patterns.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role_matching: Option<String>,
	/// Registered predicate used to match domains as patterns.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain_matching: Option<String>,
}

fn default_arity() -> usize {
	2
}

impl Default for RoleDefinition {
	fn default() -> Self {
		Self::new(default_arity())
	}
}

impl RoleDefinition {
	pub fn new(arity: usize) -> Self {
		Self {
			arity,
			role_matching: None,
			domain_matching: None,
		}
	}

	pub fn with_role_matching(mut self, function: impl Into<String>) -> Self {
		self.role_matching = Some(function.into());
		self
	}

	pub fn with_domain_matching(mut self, function: impl Into<String>) -> Self {
		self.domain_matching = Some(function.into());
		self
	}

	/// Number of domain columns after child and parent.
	pub fn domain_count(&self) -> usize {
		self.arity.saturating_sub(2)
	}
}

/// The request, policy and effect sections a matcher is evaluated with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionBinding {
	pub request: String,
	pub policy: String,
	pub effect: String,
	pub matcher: String,
}

impl Model {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_request<I, S>(mut self, key: impl Into<String>, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self
			.requests
			.insert(key.into(), fields.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_policy<I, S>(mut self, key: impl Into<String>, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self
			.policies
			.insert(key.into(), fields.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_role(mut self, key: impl Into<String>, definition: RoleDefinition) -> Self {
		self.roles.insert(key.into(), definition);
		self
	}

	pub fn with_effect(mut self, key: impl Into<String>, expression: impl Into<String>) -> Self {
		self.effects.insert(key.into(), expression.into());
		self
	}

	pub fn with_matcher(mut self, key: impl Into<String>, expression: impl Into<String>) -> Self {
		self.matchers.insert(key.into(), expression.into());
		self
	}

	pub fn request_fields(&self, key: &str) -> Option<&[String]> {
		self.requests.get(key).map(Vec::as_slice)
	}

	pub fn policy_fields(&self, key: &str) -> Option<&[String]> {
		self.policies.get(key).map(Vec::as_slice)
	}

	pub fn role(&self, key: &str) -> Option<&RoleDefinition> {
		self.roles.get(key)
	}

	/// Index of a named field within a policy definition.
	pub fn policy_field_index(&self, key: &str, field: &str) -> Option<usize> {
		self
			.policies
			.get(key)
			.and_then(|fields| fields.iter().position(|f| f == field))
	}

	/// Resolves the sections matcher `matcher` is evaluated with.
	pub fn binding(&self, matcher: &str) -> Result<SectionBinding> {
		if !self.matchers.contains_key(matcher) {
			return Err(AuthzError::model_config(format!(
				"matcher section `{matcher}` is not defined"
			)));
		}
		let suffix = section_suffix(matcher, 'm').ok_or_else(|| {
			AuthzError::model_config(format!("`{matcher}` is not a matcher section name"))
		})?;

		let request = paired_key(&self.requests, 'r', suffix)?;
		let policy = paired_key(&self.policies, 'p', suffix)?;
		let effect = paired_key(&self.effects, 'e', suffix)?;

		Ok(SectionBinding {
			request,
			policy,
			effect,
			matcher: matcher.to_string(),
		})
	}

	/// Checks the model's structural rules.
	///
	/// The matcher expressions themselves are validated when compiled.
	pub fn validate(&self) -> Result<()> {
		for (section, key) in [
			("request_definition", "r"),
			("policy_definition", "p"),
			("policy_effect", "e"),
			("matchers", "m"),
		] {
			let present = match key {
				"r" => self.requests.contains_key(key),
				"p" => self.policies.contains_key(key),
				"e" => self.effects.contains_key(key),
				_ => self.matchers.contains_key(key),
			};
			if !present {
				return Err(AuthzError::model_config(format!(
					"missing `{key}` in [{section}]"
				)));
			}
		}

		for (key, fields) in &self.requests {
			check_key(key, 'r')?;
			check_fields(key, fields)?;
		}
		for (key, fields) in &self.policies {
			check_key(key, 'p')?;
			check_fields(key, fields)?;
		}
		for (key, definition) in &self.roles {
			check_key(key, 'g')?;
			if definition.arity < 2 {
				return Err(AuthzError::model_config(format!(
					"role definition `{key}` needs at least 2 columns, has {}",
					definition.arity
				)));
			}
		}
		for key in self.effects.keys() {
			check_key(key, 'e')?;
		}
		for key in self.matchers.keys() {
			check_key(key, 'm')?;
			self.binding(key)?;
		}

		Ok(())
	}
}

fn section_suffix(key: &str, letter: char) -> Option<&str> {
	let suffix = key.strip_prefix(letter)?;
	suffix
		.chars()
		.all(|c| c.is_ascii_digit())
		.then_some(suffix)
}

fn check_key(key: &str, letter: char) -> Result<()> {
	match section_suffix(key, letter) {
		Some(_) => Ok(()),
		None => Err(AuthzError::model_config(format!(
			"section name `{key}` must be `{letter}` optionally followed by digits"
		))),
	}
}

fn check_fields(key: &str, fields: &[String]) -> Result<()> {
	if fields.is_empty() {
		return Err(AuthzError::model_config(format!(
			"definition `{key}` declares no fields"
		)));
	}
	let mut seen = HashSet::new();
	for field in fields {
		if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
			return Err(AuthzError::model_config(format!(
				"definition `{key}` has invalid field name `{field}`"
			)));
		}
		if !seen.insert(field.as_str()) {
			return Err(AuthzError::model_config(format!(
				"definition `{key}` declares field `{field}` twice"
			)));
		}
	}
	Ok(())
}

fn paired_key<V>(sections: &BTreeMap<String, V>, letter: char, suffix: &str) -> Result<String> {
	let suffixed = format!("{letter}{suffix}");
	if sections.contains_key(&suffixed) {
		return Ok(suffixed);
	}
	let base = letter.to_string();
	if sections.contains_key(&base) {
		return Ok(base);
	}
	Err(AuthzError::model_config(format!(
		"no `{suffixed}` or `{base}` section to pair with `m{suffix}`"
	)))
}
