// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role inheritance graph for a single relation.
//!
//! Names are interned into an arena; edges are stored per domain tuple as
//! parent and child adjacency lists over arena ids. Queries walk the graph
//! breadth-first with a visited set, so cycles in the edge set are harmless.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::function::MatchFn;

/// Default bound on the number of inheritance hops a query follows.
pub const DEFAULT_MAX_HIERARCHY_LEVEL: usize = 10;

#[derive(Debug, Clone, Default)]
struct Adjacency {
	parents: HashMap<usize, Vec<usize>>,
	children: HashMap<usize, Vec<usize>>,
}

impl Adjacency {
	fn link_count(&self) -> usize {
		self.parents.values().map(Vec::len).sum()
	}
}

#[derive(Clone)]
pub struct RoleGraph {
	max_hierarchy_level: usize,
	role_matching: Option<MatchFn>,
	domain_matching: Option<MatchFn>,
	names: Vec<String>,
	ids: HashMap<String, usize>,
	domains: HashMap<Vec<String>, Adjacency>,
}

impl Default for RoleGraph {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_HIERARCHY_LEVEL)
	}
}

impl fmt::Debug for RoleGraph {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RoleGraph")
			.field("max_hierarchy_level", &self.max_hierarchy_level)
			.field("role_matching", &self.role_matching.is_some())
			.field("domain_matching", &self.domain_matching.is_some())
			.field("names", &self.names.len())
			.field("links", &self.link_count())
			.finish()
	}
}

impl RoleGraph {
	pub fn new(max_hierarchy_level: usize) -> Self {
		Self {
			max_hierarchy_level,
			role_matching: None,
			domain_matching: None,
			names: Vec::new(),
			ids: HashMap::new(),
			domains: HashMap::new(),
		}
	}

	/// Treats stored role names as patterns matched by `matcher(name, pattern)`.
	pub fn with_role_matching(mut self, matcher: MatchFn) -> Self {
		self.role_matching = Some(matcher);
		self
	}

	/// Treats stored domains as patterns matched by `matcher(domain, pattern)`.
	pub fn with_domain_matching(mut self, matcher: MatchFn) -> Self {
		self.domain_matching = Some(matcher);
		self
	}

	pub fn max_hierarchy_level(&self) -> usize {
		self.max_hierarchy_level
	}

	/// Records that `child` inherits `parent` within `domains`.
	pub fn add_link(&mut self, child: &str, parent: &str, domains: &[&str]) {
		let child = self.intern(child);
		let parent = self.intern(parent);
		let adjacency = self.domains.entry(domain_key(domains)).or_default();

		let parents = adjacency.parents.entry(child).or_default();
		if !parents.contains(&parent) {
			parents.push(parent);
			adjacency.children.entry(parent).or_default().push(child);
		}
	}

	/// Removes a link. Returns whether it existed.
	pub fn delete_link(&mut self, child: &str, parent: &str, domains: &[&str]) -> bool {
		let (Some(&child), Some(&parent)) = (self.ids.get(child), self.ids.get(parent)) else {
			return false;
		};
		let Some(adjacency) = self.domains.get_mut(&domain_key(domains)) else {
			return false;
		};

		let removed = remove_edge(&mut adjacency.parents, child, parent);
		if removed {
			remove_edge(&mut adjacency.children, parent, child);
		}
		removed
	}

	/// Whether `name1` reaches `name2` by following inheritance edges.
	///
	/// A name always has a link to itself. Traversal stops after
	/// `max_hierarchy_level` hops.
	pub fn has_link(&self, name1: &str, name2: &str, domains: &[&str]) -> bool {
		if name1 == name2 || self.role_matches(name1, name2) {
			return true;
		}

		let adjacencies = self.adjacencies(domains);
		if adjacencies.is_empty() {
			return false;
		}

		let mut frontier = self.matching_ids(name1);
		let mut visited: HashSet<usize> = frontier.iter().copied().collect();

		for _ in 0..self.max_hierarchy_level {
			let mut next = Vec::new();
			for id in frontier {
				for adjacency in &adjacencies {
					for &parent in adjacency.parents.get(&id).into_iter().flatten() {
						if self.name_matches(name2, parent) {
							return true;
						}
						for alias in self.matching_ids(&self.names[parent]) {
							if visited.insert(alias) {
								next.push(alias);
							}
						}
					}
				}
			}
			if next.is_empty() {
				break;
			}
			frontier = next;
		}

		false
	}

	/// Roles `name` directly inherits, sorted.
	pub fn get_roles(&self, name: &str, domains: &[&str]) -> Vec<String> {
		self.neighbours(name, domains, |adjacency| &adjacency.parents)
	}

	/// Names that directly inherit `name`, sorted.
	pub fn get_users(&self, name: &str, domains: &[&str]) -> Vec<String> {
		self.neighbours(name, domains, |adjacency| &adjacency.children)
	}

	/// Every role `name` inherits, directly or transitively, sorted.
	pub fn get_implicit_roles(&self, name: &str, domains: &[&str]) -> Vec<String> {
		self.closure(name, domains, |adjacency| &adjacency.parents)
	}

	/// Every name that inherits `name`, directly or transitively, sorted.
	pub fn get_implicit_users(&self, name: &str, domains: &[&str]) -> Vec<String> {
		self.closure(name, domains, |adjacency| &adjacency.children)
	}

	pub fn clear(&mut self) {
		self.names.clear();
		self.ids.clear();
		self.domains.clear();
	}

	pub fn link_count(&self) -> usize {
		self.domains.values().map(Adjacency::link_count).sum()
	}

	fn intern(&mut self, name: &str) -> usize {
		if let Some(&id) = self.ids.get(name) {
			return id;
		}
		let id = self.names.len();
		self.names.push(name.to_string());
		self.ids.insert(name.to_string(), id);
		id
	}

	fn role_matches(&self, name: &str, pattern: &str) -> bool {
		self.role_matching
			.as_ref()
			.is_some_and(|matcher| matcher(name, pattern))
	}

	fn name_matches(&self, name: &str, id: usize) -> bool {
		let stored = &self.names[id];
		stored == name || self.role_matches(name, stored)
	}

	/// Arena ids standing for `name`: its own id plus stored patterns it matches.
	fn matching_ids(&self, name: &str) -> Vec<usize> {
		let mut ids: Vec<usize> = self.ids.get(name).copied().into_iter().collect();
		if self.role_matching.is_some() {
			ids.extend(
				self.names
					.iter()
					.enumerate()
					.filter(|(_, stored)| stored.as_str() != name && self.role_matches(name, stored))
					.map(|(id, _)| id),
			);
		}
		ids
	}

	/// Adjacency lists whose domain tuple covers `domains`.
	fn adjacencies(&self, domains: &[&str]) -> Vec<&Adjacency> {
		match &self.domain_matching {
			None => self.domains.get(&domain_key(domains)).into_iter().collect(),
			Some(matcher) => self
				.domains
				.iter()
				.filter(|(stored, _)| {
					stored.len() == domains.len()
						&& stored
							.iter()
							.zip(domains)
							.all(|(pattern, domain)| pattern == domain || matcher(domain, pattern))
				})
				.map(|(_, adjacency)| adjacency)
				.collect(),
		}
	}

	fn neighbours<F>(&self, name: &str, domains: &[&str], edges: F) -> Vec<String>
	where
		F: Fn(&Adjacency) -> &HashMap<usize, Vec<usize>>,
	{
		let Some(&id) = self.ids.get(name) else {
			return Vec::new();
		};
		let found: BTreeSet<&str> = self
			.adjacencies(domains)
			.into_iter()
			.flat_map(|adjacency| edges(adjacency).get(&id).into_iter().flatten())
			.map(|&other| self.names[other].as_str())
			.collect();
		found.into_iter().map(str::to_string).collect()
	}

	fn closure<F>(&self, name: &str, domains: &[&str], edges: F) -> Vec<String>
	where
		F: Fn(&Adjacency) -> &HashMap<usize, Vec<usize>>,
	{
		let Some(&start) = self.ids.get(name) else {
			return Vec::new();
		};
		let adjacencies = self.adjacencies(domains);
		let mut visited = HashSet::from([start]);
		let mut frontier = vec![start];
		let mut found = BTreeSet::new();

		for _ in 0..self.max_hierarchy_level {
			let mut next = Vec::new();
			for id in frontier {
				for adjacency in &adjacencies {
					for &other in edges(adjacency).get(&id).into_iter().flatten() {
						if visited.insert(other) {
							found.insert(self.names[other].as_str());
							next.push(other);
						}
					}
				}
			}
			if next.is_empty() {
				break;
			}
			frontier = next;
		}

		found.into_iter().map(str::to_string).collect()
	}
}

fn domain_key(domains: &[&str]) -> Vec<String> {
	domains.iter().map(|d| d.to_string()).collect()
}

fn remove_edge(edges: &mut HashMap<usize, Vec<usize>>, from: usize, to: usize) -> bool {
	let Some(targets) = edges.get_mut(&from) else {
		return false;
	};
	let Some(position) = targets.iter().position(|&t| t == to) else {
		return false;
	};
	targets.remove(position);
	if targets.is_empty() {
		edges.remove(&from);
	}
	true
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::function::key_match;
	use proptest::prelude::*;

	fn chain(names: &[&str]) -> RoleGraph {
		let mut graph = RoleGraph::default();
		for pair in names.windows(2) {
			graph.add_link(pair[0], pair[1], &[]);
		}
		graph
	}

	#[test]
	fn self_link_always_holds() {
		let graph = RoleGraph::default();
		assert!(graph.has_link("alice", "alice", &[]));
		assert!(!graph.has_link("alice", "bob", &[]));
	}

	#[test]
	fn transitive_link() {
		let graph = chain(&["a", "b", "c"]);
		assert!(graph.has_link("a", "c", &[]));
		assert!(!graph.has_link("c", "a", &[]));
	}

	#[test]
	fn cycle_terminates() {
		let mut graph = chain(&["a", "b", "c"]);
		graph.add_link("c", "a", &[]);
		assert!(graph.has_link("a", "c", &[]));
		assert!(graph.has_link("c", "b", &[]));
		assert!(!graph.has_link("a", "z", &[]));
	}

	#[test]
	fn hierarchy_level_bounds_depth() {
		let names: Vec<String> = (0..6).map(|i| format!("r{i}")).collect();
		let refs: Vec<&str> = names.iter().map(String::as_str).collect();
		let mut graph = RoleGraph::new(3);
		for pair in refs.windows(2) {
			graph.add_link(pair[0], pair[1], &[]);
		}
		assert!(graph.has_link("r0", "r3", &[]));
		assert!(!graph.has_link("r0", "r4", &[]));
	}

	#[test]
	fn domain_isolation() {
		let mut graph = RoleGraph::default();
		graph.add_link("alice", "admin", &["d1"]);
		assert!(graph.has_link("alice", "admin", &["d1"]));
		assert!(!graph.has_link("alice", "admin", &["d2"]));
		assert!(!graph.has_link("alice", "admin", &[]));
	}

	#[test]
	fn domain_pattern_matching() {
		let matcher: MatchFn = Arc::new(|a: &str, b: &str| key_match(a, b));
		let mut graph = RoleGraph::default().with_domain_matching(matcher);
		graph.add_link("alice", "admin", &["tenant/*"]);
		assert!(graph.has_link("alice", "admin", &["tenant/acme"]));
		assert!(!graph.has_link("alice", "admin", &["other/acme"]));
	}

	#[test]
	fn role_pattern_matching() {
		let matcher: MatchFn = Arc::new(|a: &str, b: &str| key_match(a, b));
		let mut graph = RoleGraph::default().with_role_matching(matcher);
		graph.add_link("/book/*", "book_reader", &[]);
		graph.add_link("alice", "/book/1", &[]);
		assert!(graph.has_link("/book/42", "book_reader", &[]));
		assert!(graph.has_link("alice", "book_reader", &[]));
		assert!(!graph.has_link("/pen/1", "book_reader", &[]));
	}

	#[test]
	fn delete_link_reports_presence() {
		let mut graph = chain(&["a", "b"]);
		assert!(graph.delete_link("a", "b", &[]));
		assert!(!graph.delete_link("a", "b", &[]));
		assert!(!graph.delete_link("x", "y", &[]));
		assert!(!graph.has_link("a", "b", &[]));
	}

	#[test]
	fn direct_and_implicit_queries() {
		let mut graph = chain(&["alice", "editor", "viewer"]);
		graph.add_link("bob", "editor", &[]);
		assert_eq!(graph.get_roles("alice", &[]), vec!["editor"]);
		assert_eq!(graph.get_users("editor", &[]), vec!["alice", "bob"]);
		assert_eq!(graph.get_implicit_roles("alice", &[]), vec!["editor", "viewer"]);
		assert_eq!(
			graph.get_implicit_users("viewer", &[]),
			vec!["alice", "bob", "editor"]
		);
		assert!(graph.get_roles("nobody", &[]).is_empty());
	}

	#[test]
	fn duplicate_links_are_collapsed() {
		let mut graph = chain(&["a", "b"]);
		graph.add_link("a", "b", &[]);
		assert_eq!(graph.link_count(), 1);
	}

	#[test]
	fn clear_removes_everything() {
		let mut graph = chain(&["a", "b", "c"]);
		graph.clear();
		assert_eq!(graph.link_count(), 0);
		assert!(!graph.has_link("a", "c", &[]));
	}

	proptest! {
		#[test]
		fn chain_is_transitive_with_back_edge(len in 2usize..9) {
			let names: Vec<String> = (0..len).map(|i| format!("n{i}")).collect();
			let refs: Vec<&str> = names.iter().map(String::as_str).collect();
			let mut graph = chain(&refs);
			graph.add_link(refs[len - 1], refs[0], &[]);
			for i in 0..len {
				for j in 0..len {
					prop_assert!(graph.has_link(refs[i], refs[j], &[]));
				}
			}
		}

		#[test]
		fn rebuild_is_idempotent(edges in proptest::collection::vec((0u8..6, 0u8..6), 0..20)) {
			let build = || {
				let mut graph = RoleGraph::default();
				for (a, b) in &edges {
					graph.add_link(&format!("n{a}"), &format!("n{b}"), &[]);
				}
				graph
			};
			let first = build();
			let second = build();
			for a in 0..6 {
				for b in 0..6 {
					let (x, y) = (format!("n{a}"), format!("n{b}"));
					prop_assert_eq!(first.has_link(&x, &y, &[]), second.has_link(&x, &y, &[]));
				}
			}
		}

		#[test]
		fn links_never_leak_across_domains(
			edges in proptest::collection::vec((0u8..5, 0u8..5), 1..15),
		) {
			let mut graph = RoleGraph::default();
			for (a, b) in &edges {
				graph.add_link(&format!("n{a}"), &format!("n{b}"), &["d1"]);
			}
			for a in 0..5 {
				for b in 0..5 {
					if a != b {
						let (x, y) = (format!("n{a}"), format!("n{b}"));
						prop_assert!(!graph.has_link(&x, &y, &["d2"]));
					}
				}
			}
		}
	}
}
