// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy and grouping-rule management on [`Enforcer`].
//!
//! Every write validates the rule's column count against the model, applies
//! the change under the store's write lock, re-sorts sections that carry a
//! `priority` field, and rebuilds role graphs after grouping-rule changes
//! when auto-build is on. Batch writes are all-or-nothing.
//!
//! Unprefixed methods act on `p` or `g`; `*_named_*` methods take the
//! section key.

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use loom_authz_core::{AuthzError, CompiledMatcher, NoRoleLinks, Result, Scope, PRIORITY_FIELD};
use tracing::debug;

use crate::enforcer::Enforcer;
use crate::store::{matches_filter, PolicyStore, Rule};

fn owned<T: AsRef<str>>(rule: &[T]) -> Rule {
	rule.iter().map(|field| field.as_ref().to_string()).collect()
}

/// Owned copies of a batch with duplicates removed, first occurrence kept.
fn owned_batch<R, T>(rules: &[R]) -> Vec<Rule>
where
	R: AsRef<[T]>,
	T: AsRef<str>,
{
	let mut seen = HashSet::new();
	rules
		.iter()
		.map(|rule| owned(rule.as_ref()))
		.filter(|rule| seen.insert(rule.clone()))
		.collect()
}

impl<S: PolicyStore> Enforcer<S> {
	/// Column count of a policy or grouping section.
	fn section_arity(&self, section: &str) -> Result<usize> {
		let model = self.model();
		if let Some(fields) = model.policy_fields(section) {
			return Ok(fields.len());
		}
		if let Some(definition) = model.role(section) {
			return Ok(definition.arity);
		}
		Err(AuthzError::model_config(format!(
			"`{section}` is not a policy or role section of the model"
		)))
	}

	fn check_rule(&self, section: &str, rule: &[String]) -> Result<()> {
		let expected = self.section_arity(section)?;
		if rule.len() != expected {
			return Err(AuthzError::Arity {
				section: section.to_string(),
				expected,
				actual: rule.len(),
			});
		}
		Ok(())
	}

	fn check_rules(&self, section: &str, rules: &[Rule]) -> Result<()> {
		rules.iter().try_for_each(|rule| self.check_rule(section, rule))
	}

	/// Applies `apply` to the store; it returns its result and whether
	/// anything changed.
	fn write<T>(&self, section: &str, apply: impl FnOnce(&mut S) -> (T, bool)) -> Result<T> {
		let (result, changed, model) = {
			let mut store = self.store.write();
			let model = self.model();
			let (result, changed) = apply(&mut *store);
			if changed {
				if let Some(index) = model.policy_field_index(section, PRIORITY_FIELD) {
					store.sort_by_priority(section, index);
				}
			}
			(result, changed, model)
		};

		if changed {
			debug!(section, "policy changed");
			if model.role(section).is_some() && self.auto_build_role_links.load(Ordering::Acquire) {
				self.build_role_links()?;
			}
		}
		Ok(result)
	}

	pub fn get_policy(&self) -> Vec<Rule> {
		self.get_named_policy("p")
	}

	pub fn get_named_policy(&self, section: &str) -> Vec<Rule> {
		self.store.read().rules(section).to_vec()
	}

	/// Rules whose fields from `field_index` on equal `values`; `""` matches any value.
	pub fn get_filtered_policy<T: AsRef<str>>(&self, field_index: usize, values: &[T]) -> Vec<Rule> {
		self.get_filtered_named_policy("p", field_index, values)
	}

	pub fn get_filtered_named_policy<T: AsRef<str>>(
		&self,
		section: &str,
		field_index: usize,
		values: &[T],
	) -> Vec<Rule> {
		let values = owned(values);
		self.store
			.read()
			.rules(section)
			.iter()
			.filter(|rule| matches_filter(rule, field_index, &values))
			.cloned()
			.collect()
	}

	/// Rules of `section` for which `expression` holds.
	///
	/// The expression is compiled like a matcher but may only reference the
	/// section's own fields, e.g. `keyMatch2(p.obj, '/data/*')`.
	pub fn get_filtered_named_policy_with_matcher(
		&self,
		section: &str,
		expression: &str,
	) -> Result<Vec<Rule>> {
		let state = self.state.load();
		let fields = state.model.policy_fields(section).ok_or_else(|| {
			AuthzError::model_config(format!("`{section}` is not a policy section of the model"))
		})?;
		let filter =
			CompiledMatcher::compile(expression, &Scope::policy_only(section, fields, &state.functions))?;

		let no_request: &[&str] = &[];
		let store = self.store.read();
		let mut matched = Vec::new();
		for rule in store.rules(section) {
			if filter.evaluate(no_request, rule, &NoRoleLinks)? {
				matched.push(rule.clone());
			}
		}
		Ok(matched)
	}

	pub fn has_policy<T: AsRef<str>>(&self, rule: &[T]) -> bool {
		self.has_named_policy("p", rule)
	}

	pub fn has_named_policy<T: AsRef<str>>(&self, section: &str, rule: &[T]) -> bool {
		self.store.read().has_rule(section, &owned(rule))
	}

	/// Adds one rule. Returns `false` if it already exists.
	pub fn add_policy<T: AsRef<str>>(&self, rule: &[T]) -> Result<bool> {
		self.add_named_policy("p", rule)
	}

	pub fn add_named_policy<T: AsRef<str>>(&self, section: &str, rule: &[T]) -> Result<bool> {
		let rule = owned(rule);
		self.check_rule(section, &rule)?;
		self.write(section, |store| {
			let added = store.add_rule(section, rule);
			(added, added)
		})
	}

	/// Adds every rule or none. Returns `false` without changes if any rule
	/// already exists; repeats within the batch count once.
	pub fn add_policies<R, T>(&self, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.add_named_policies("p", rules)
	}

	pub fn add_named_policies<R, T>(&self, section: &str, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		let rules = owned_batch(rules);
		self.check_rules(section, &rules)?;
		self.write(section, |store| {
			if rules.is_empty() || rules.iter().any(|rule| store.has_rule(section, rule)) {
				return (false, false);
			}
			for rule in rules {
				store.add_rule(section, rule);
			}
			(true, true)
		})
	}

	/// Adds the rules that do not exist yet. Returns whether any was added.
	pub fn add_policies_ex<R, T>(&self, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.add_named_policies_ex("p", rules)
	}

	pub fn add_named_policies_ex<R, T>(&self, section: &str, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		let rules = owned_batch(rules);
		self.check_rules(section, &rules)?;
		self.write(section, |store| {
			let mut added = false;
			for rule in rules {
				added |= store.add_rule(section, rule);
			}
			(added, added)
		})
	}

	/// Removes one rule. Returns `false` if it did not exist.
	pub fn remove_policy<T: AsRef<str>>(&self, rule: &[T]) -> Result<bool> {
		self.remove_named_policy("p", rule)
	}

	pub fn remove_named_policy<T: AsRef<str>>(&self, section: &str, rule: &[T]) -> Result<bool> {
		let rule = owned(rule);
		self.check_rule(section, &rule)?;
		self.write(section, |store| {
			let removed = store.remove_rule(section, &rule);
			(removed, removed)
		})
	}

	/// Removes every rule or none. Returns `false` without changes if any
	/// rule is missing.
	pub fn remove_policies<R, T>(&self, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.remove_named_policies("p", rules)
	}

	pub fn remove_named_policies<R, T>(&self, section: &str, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		let rules = owned_batch(rules);
		self.check_rules(section, &rules)?;
		self.write(section, |store| {
			if rules.is_empty() || !rules.iter().all(|rule| store.has_rule(section, rule)) {
				return (false, false);
			}
			for rule in &rules {
				store.remove_rule(section, rule);
			}
			(true, true)
		})
	}

	/// Removes rules matching a field filter. Returns whether any was removed.
	pub fn remove_filtered_policy<T: AsRef<str>>(&self, field_index: usize, values: &[T]) -> Result<bool> {
		self.remove_filtered_named_policy("p", field_index, values)
	}

	pub fn remove_filtered_named_policy<T: AsRef<str>>(
		&self,
		section: &str,
		field_index: usize,
		values: &[T],
	) -> Result<bool> {
		let arity = self.section_arity(section)?;
		let values = owned(values);
		let end = field_index.checked_add(values.len()).unwrap_or(usize::MAX);
		if values.is_empty() || end > arity {
			return Err(AuthzError::Arity {
				section: section.to_string(),
				expected: arity,
				actual: end,
			});
		}
		self.write(section, |store| {
			let removed = !store.remove_filtered(section, field_index, &values).is_empty();
			(removed, removed)
		})
	}

	/// Replaces `old` with `new` in place. Returns `false` if `old` is missing
	/// or `new` already exists.
	pub fn update_policy<T: AsRef<str>>(&self, old: &[T], new: &[T]) -> Result<bool> {
		self.update_named_policy("p", old, new)
	}

	pub fn update_named_policy<T: AsRef<str>>(&self, section: &str, old: &[T], new: &[T]) -> Result<bool> {
		let (old, new) = (owned(old), owned(new));
		self.check_rule(section, &old)?;
		self.check_rule(section, &new)?;
		self.write(section, |store| {
			let updated = store.update_rule(section, &old, new);
			(updated, updated)
		})
	}

	/// Replaces `old[i]` with `new[i]` for every `i`, or changes nothing.
	pub fn update_policies<R, T>(&self, old: &[R], new: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.update_named_policies("p", old, new)
	}

	pub fn update_named_policies<R, T>(&self, section: &str, old: &[R], new: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		if old.len() != new.len() {
			return Ok(false);
		}
		let old: Vec<Rule> = old.iter().map(|rule| owned(rule.as_ref())).collect();
		let new: Vec<Rule> = new.iter().map(|rule| owned(rule.as_ref())).collect();
		self.check_rules(section, &old)?;
		self.check_rules(section, &new)?;

		self.write(section, |store| {
			let mut applied: Vec<(&Rule, &Rule)> = Vec::new();
			for (old, new) in old.iter().zip(&new) {
				if !store.update_rule(section, old, new.clone()) {
					for (old, new) in applied.into_iter().rev() {
						store.update_rule(section, new, old.clone());
					}
					return (false, false);
				}
				applied.push((old, new));
			}
			(true, true)
		})
	}

	pub fn get_grouping_policy(&self) -> Vec<Rule> {
		self.get_named_grouping_policy("g")
	}

	pub fn get_named_grouping_policy(&self, section: &str) -> Vec<Rule> {
		self.get_named_policy(section)
	}

	pub fn get_filtered_grouping_policy<T: AsRef<str>>(&self, field_index: usize, values: &[T]) -> Vec<Rule> {
		self.get_filtered_named_policy("g", field_index, values)
	}

	pub fn get_filtered_named_grouping_policy<T: AsRef<str>>(
		&self,
		section: &str,
		field_index: usize,
		values: &[T],
	) -> Vec<Rule> {
		self.get_filtered_named_policy(section, field_index, values)
	}

	pub fn has_grouping_policy<T: AsRef<str>>(&self, rule: &[T]) -> bool {
		self.has_named_policy("g", rule)
	}

	pub fn has_named_grouping_policy<T: AsRef<str>>(&self, section: &str, rule: &[T]) -> bool {
		self.has_named_policy(section, rule)
	}

	pub fn add_grouping_policy<T: AsRef<str>>(&self, rule: &[T]) -> Result<bool> {
		self.add_named_policy("g", rule)
	}

	pub fn add_named_grouping_policy<T: AsRef<str>>(&self, section: &str, rule: &[T]) -> Result<bool> {
		self.add_named_policy(section, rule)
	}

	pub fn add_grouping_policies<R, T>(&self, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.add_named_policies("g", rules)
	}

	pub fn add_named_grouping_policies<R, T>(&self, section: &str, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.add_named_policies(section, rules)
	}

	pub fn add_grouping_policies_ex<R, T>(&self, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.add_named_policies_ex("g", rules)
	}

	pub fn remove_grouping_policy<T: AsRef<str>>(&self, rule: &[T]) -> Result<bool> {
		self.remove_named_policy("g", rule)
	}

	pub fn remove_named_grouping_policy<T: AsRef<str>>(&self, section: &str, rule: &[T]) -> Result<bool> {
		self.remove_named_policy(section, rule)
	}

	pub fn remove_grouping_policies<R, T>(&self, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.remove_named_policies("g", rules)
	}

	pub fn remove_named_grouping_policies<R, T>(&self, section: &str, rules: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.remove_named_policies(section, rules)
	}

	pub fn remove_filtered_grouping_policy<T: AsRef<str>>(&self, field_index: usize, values: &[T]) -> Result<bool> {
		self.remove_filtered_named_policy("g", field_index, values)
	}

	pub fn remove_filtered_named_grouping_policy<T: AsRef<str>>(
		&self,
		section: &str,
		field_index: usize,
		values: &[T],
	) -> Result<bool> {
		self.remove_filtered_named_policy(section, field_index, values)
	}

	pub fn update_grouping_policy<T: AsRef<str>>(&self, old: &[T], new: &[T]) -> Result<bool> {
		self.update_named_policy("g", old, new)
	}

	pub fn update_named_grouping_policy<T: AsRef<str>>(
		&self,
		section: &str,
		old: &[T],
		new: &[T],
	) -> Result<bool> {
		self.update_named_policy(section, old, new)
	}

	pub fn update_grouping_policies<R, T>(&self, old: &[R], new: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.update_named_policies("g", old, new)
	}

	pub fn update_named_grouping_policies<R, T>(&self, section: &str, old: &[R], new: &[R]) -> Result<bool>
	where
		R: AsRef<[T]>,
		T: AsRef<str>,
	{
		self.update_named_policies(section, old, new)
	}

	/// Removes every policy and grouping rule and rebuilds the role graphs.
	pub fn clear_policy(&self) -> Result<()> {
		self.store.write().clear();
		debug!("cleared all policy");
		self.build_role_links()
	}

	/// Distinct `sub` values of the `p` rules, in first-seen order.
	pub fn get_all_subjects(&self) -> Vec<String> {
		self.get_all_named_subjects("p")
	}

	pub fn get_all_named_subjects(&self, section: &str) -> Vec<String> {
		self.distinct_named_field(section, "sub")
	}

	pub fn get_all_objects(&self) -> Vec<String> {
		self.get_all_named_objects("p")
	}

	pub fn get_all_named_objects(&self, section: &str) -> Vec<String> {
		self.distinct_named_field(section, "obj")
	}

	pub fn get_all_actions(&self) -> Vec<String> {
		self.get_all_named_actions("p")
	}

	pub fn get_all_named_actions(&self, section: &str) -> Vec<String> {
		self.distinct_named_field(section, "act")
	}

	/// Distinct parent roles of the `g` rules, in first-seen order.
	pub fn get_all_roles(&self) -> Vec<String> {
		self.get_all_named_roles("g")
	}

	pub fn get_all_named_roles(&self, section: &str) -> Vec<String> {
		self.distinct_field(section, 1)
	}

	fn distinct_named_field(&self, section: &str, field: &str) -> Vec<String> {
		match self.model().policy_field_index(section, field) {
			Some(index) => self.distinct_field(section, index),
			None => Vec::new(),
		}
	}

	fn distinct_field(&self, section: &str, index: usize) -> Vec<String> {
		let store = self.store.read();
		let mut seen = HashSet::new();
		let mut values = Vec::new();
		for value in store.rules(section).iter().filter_map(|rule| rule.get(index)) {
			if seen.insert(value.as_str()) {
				values.push(value.clone());
			}
		}
		values
	}

	/// Roles `user` holds directly through `g`, sorted.
	pub fn get_roles_for_user(&self, user: &str, domains: &[&str]) -> Vec<String> {
		self.with_role_graph("g", |graph| graph.get_roles(user, domains))
	}

	/// Users holding `role` directly through `g`, sorted.
	pub fn get_users_for_role(&self, role: &str, domains: &[&str]) -> Vec<String> {
		self.with_role_graph("g", |graph| graph.get_users(role, domains))
	}

	/// Every role `user` reaches through `g`, sorted.
	pub fn get_implicit_roles_for_user(&self, user: &str, domains: &[&str]) -> Vec<String> {
		self.with_role_graph("g", |graph| graph.get_implicit_roles(user, domains))
	}

	/// Every user reaching `role` through `g`, sorted.
	pub fn get_implicit_users_for_role(&self, role: &str, domains: &[&str]) -> Vec<String> {
		self.with_role_graph("g", |graph| graph.get_implicit_users(role, domains))
	}

	/// Whether `user` holds `role` directly.
	pub fn has_role_for_user(&self, user: &str, role: &str, domains: &[&str]) -> bool {
		self.get_roles_for_user(user, domains)
			.iter()
			.any(|held| held == role)
	}

	/// Adds the `g` rule `user, role, domains...`.
	pub fn add_role_for_user(&self, user: &str, role: &str, domains: &[&str]) -> Result<bool> {
		self.add_grouping_policy(&grouping_rule(user, role, domains))
	}

	/// Removes the `g` rule `user, role, domains...`.
	pub fn delete_role_for_user(&self, user: &str, role: &str, domains: &[&str]) -> Result<bool> {
		self.remove_grouping_policy(&grouping_rule(user, role, domains))
	}

	/// `p` rules whose first field is `user`.
	pub fn get_permissions_for_user(&self, user: &str) -> Vec<Rule> {
		self.get_filtered_policy(0, &[user])
	}

	fn with_role_graph(
		&self,
		relation: &str,
		query: impl FnOnce(&loom_authz_core::RoleGraph) -> Vec<String>,
	) -> Vec<String> {
		let state = self.state.load();
		state.roles.get(relation).map(query).unwrap_or_default()
	}
}

fn grouping_rule<'a>(user: &'a str, role: &'a str, domains: &[&'a str]) -> Vec<&'a str> {
	let mut rule = vec![user, role];
	rule.extend_from_slice(domains);
	rule
}
