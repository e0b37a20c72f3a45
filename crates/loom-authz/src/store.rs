// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy storage.
//!
//! A store holds rules per section key (`p`, `p2`, `g`, ...) in a stable
//! order. It is synchronous and knows nothing about the model; the enforcer
//! validates rule shapes before writing.

use std::collections::{BTreeMap, HashSet};

/// One stored policy or grouping rule.
pub type Rule = Vec<String>;

pub trait PolicyStore: Send + Sync {
	/// Rules of `section` in evaluation order. Unknown sections are empty.
	fn rules(&self, section: &str) -> &[Rule];

	/// Section keys that currently hold at least one rule.
	fn sections(&self) -> Vec<String>;

	/// Appends `rule`. Returns `false` without changes if it already exists.
	fn add_rule(&mut self, section: &str, rule: Rule) -> bool;

	/// Removes `rule`. Returns whether it existed.
	fn remove_rule(&mut self, section: &str, rule: &[String]) -> bool;

	/// Replaces `old` with `new` at the same position.
	///
	/// Returns `false` without changes if `old` is missing or `new` already
	/// exists as a different rule.
	fn update_rule(&mut self, section: &str, old: &[String], new: Rule) -> bool;

	/// Removes every rule whose fields starting at `field_index` equal
	/// `values`; an empty value matches anything. Returns the removed rules.
	fn remove_filtered(&mut self, section: &str, field_index: usize, values: &[String]) -> Vec<Rule>;

	/// Removes all rules of all sections.
	fn clear(&mut self);

	fn has_rule(&self, section: &str, rule: &[String]) -> bool {
		self.rules(section).iter().any(|r| r.as_slice() == rule)
	}

	/// Reorders `section` by the integer at `priority_index`, lowest first,
	/// keeping stored order for ties and sorting unparsable values last.
	///
	/// The priority effect decides on the first matching row, so stores that
	/// do not already return ranked sections in this order must implement it.
	fn sort_by_priority(&mut self, _section: &str, _priority_index: usize) {}
}

/// Whether `rule` matches a field filter, `""` acting as a wildcard.
pub fn matches_filter(rule: &[String], field_index: usize, values: &[String]) -> bool {
	values.iter().enumerate().all(|(offset, value)| {
		value.is_empty()
			|| rule
				.get(field_index + offset)
				.is_some_and(|field| field == value)
	})
}

#[derive(Debug, Clone, Default)]
struct Section {
	rules: Vec<Rule>,
	index: HashSet<Rule>,
}

/// In-memory store keeping insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryPolicyStore {
	sections: BTreeMap<String, Section>,
}

impl MemoryPolicyStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a store from `(section, rule)` pairs, dropping duplicates.
	pub fn from_rules<I, K>(rules: I) -> Self
	where
		I: IntoIterator<Item = (K, Rule)>,
		K: Into<String>,
	{
		let mut store = Self::new();
		for (section, rule) in rules {
			store.add_rule(&section.into(), rule);
		}
		store
	}

	pub fn len(&self) -> usize {
		self.sections.values().map(|s| s.rules.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl PolicyStore for MemoryPolicyStore {
	fn rules(&self, section: &str) -> &[Rule] {
		self.sections
			.get(section)
			.map(|s| s.rules.as_slice())
			.unwrap_or(&[])
	}

	fn sections(&self) -> Vec<String> {
		self.sections
			.iter()
			.filter(|(_, s)| !s.rules.is_empty())
			.map(|(key, _)| key.clone())
			.collect()
	}

	fn add_rule(&mut self, section: &str, rule: Rule) -> bool {
		let entry = self.sections.entry(section.to_string()).or_default();
		if !entry.index.insert(rule.clone()) {
			return false;
		}
		entry.rules.push(rule);
		true
	}

	fn remove_rule(&mut self, section: &str, rule: &[String]) -> bool {
		let Some(entry) = self.sections.get_mut(section) else {
			return false;
		};
		if !entry.index.remove(rule) {
			return false;
		}
		entry.rules.retain(|r| r.as_slice() != rule);
		true
	}

	fn update_rule(&mut self, section: &str, old: &[String], new: Rule) -> bool {
		let Some(entry) = self.sections.get_mut(section) else {
			return false;
		};
		if old == new.as_slice() {
			return entry.index.contains(old);
		}
		if !entry.index.contains(old) || entry.index.contains(&new) {
			return false;
		}
		let Some(position) = entry.rules.iter().position(|r| r.as_slice() == old) else {
			return false;
		};
		entry.index.remove(old);
		entry.index.insert(new.clone());
		entry.rules[position] = new;
		true
	}

	fn remove_filtered(&mut self, section: &str, field_index: usize, values: &[String]) -> Vec<Rule> {
		let Some(entry) = self.sections.get_mut(section) else {
			return Vec::new();
		};
		let (removed, kept): (Vec<Rule>, Vec<Rule>) = entry
			.rules
			.drain(..)
			.partition(|rule| matches_filter(rule, field_index, values));
		entry.rules = kept;
		for rule in &removed {
			entry.index.remove(rule);
		}
		removed
	}

	fn clear(&mut self) {
		self.sections.clear();
	}

	fn sort_by_priority(&mut self, section: &str, priority_index: usize) {
		if let Some(entry) = self.sections.get_mut(section) {
			entry.rules.sort_by_key(|rule| {
				rule.get(priority_index)
					.and_then(|p| p.parse::<i64>().ok())
					.unwrap_or(i64::MAX)
			});
		}
	}
}
