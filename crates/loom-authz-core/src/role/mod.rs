// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role graphs for every role relation of a model.

mod graph;

use std::collections::BTreeMap;

use tracing::debug;

pub use graph::{RoleGraph, DEFAULT_MAX_HIERARCHY_LEVEL};

use crate::error::{AuthzError, Result};
use crate::function::{FunctionRegistry, MatchFn};
use crate::matcher::RoleLinks;
use crate::model::RoleDefinition;

/// One [`RoleGraph`] per role relation (`g`, `g2`, ...).
///
/// Built in one pass from the full set of grouping rules; never edited in
/// place once shared with readers.
#[derive(Debug, Clone, Default)]
pub struct RoleGraphs {
	graphs: BTreeMap<String, RoleGraph>,
}

impl RoleGraphs {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds graphs for `definitions` from grouping `rules` keyed by relation.
	///
	/// Rules for relations the model does not define are ignored. A rule whose
	/// column count differs from its definition is an [`AuthzError::Arity`].
	pub fn build(
		definitions: &BTreeMap<String, RoleDefinition>,
		rules: &BTreeMap<String, Vec<Vec<String>>>,
		functions: &FunctionRegistry,
		max_hierarchy_level: usize,
	) -> Result<Self> {
		let mut graphs = BTreeMap::new();

		for (relation, definition) in definitions {
			let mut graph = RoleGraph::new(max_hierarchy_level);
			if let Some(name) = &definition.role_matching {
				graph = graph.with_role_matching(resolve_match_fn(functions, relation, name)?);
			}
			if let Some(name) = &definition.domain_matching {
				graph = graph.with_domain_matching(resolve_match_fn(functions, relation, name)?);
			}

			for rule in rules.get(relation).into_iter().flatten() {
				if rule.len() != definition.arity {
					return Err(AuthzError::Arity {
						section: relation.clone(),
						expected: definition.arity,
						actual: rule.len(),
					});
				}
				let domains: Vec<&str> = rule[2..].iter().map(String::as_str).collect();
				graph.add_link(&rule[0], &rule[1], &domains);
			}

			debug!(
				relation = relation.as_str(),
				links = graph.link_count(),
				"built role graph"
			);
			graphs.insert(relation.clone(), graph);
		}

		Ok(Self { graphs })
	}

	pub fn get(&self, relation: &str) -> Option<&RoleGraph> {
		self.graphs.get(relation)
	}

	pub fn get_mut(&mut self, relation: &str) -> Option<&mut RoleGraph> {
		self.graphs.get_mut(relation)
	}

	pub fn relations(&self) -> impl Iterator<Item = &str> {
		self.graphs.keys().map(String::as_str)
	}
}

impl RoleLinks for RoleGraphs {
	fn has_link(&self, relation: &str, name1: &str, name2: &str, domains: &[&str]) -> bool {
		self.graphs
			.get(relation)
			.is_some_and(|graph| graph.has_link(name1, name2, domains))
	}
}

fn resolve_match_fn(functions: &FunctionRegistry, relation: &str, name: &str) -> Result<MatchFn> {
	functions.match_fn(name).ok_or_else(|| {
		AuthzError::model_config(format!(
			"role relation `{relation}` uses `{name}`, which is not a registered predicate"
		))
	})
}
