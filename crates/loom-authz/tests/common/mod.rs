// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures for the loom-authz integration tests.

#![allow(dead_code)]

use loom_authz::{Enforcer, MemoryPolicyStore, Model, RoleDefinition, Rule};
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn rule(fields: &[&str]) -> Rule {
	fields.iter().map(|s| s.to_string()).collect()
}

pub fn rules(rows: &[&[&str]]) -> Vec<Rule> {
	rows.iter().map(|row| rule(row)).collect()
}

pub fn sorted(mut rows: Vec<Rule>) -> Vec<Rule> {
	rows.sort();
	rows
}

pub fn basic_model() -> Model {
	Model::new()
		.with_request("r", ["sub", "obj", "act"])
		.with_policy("p", ["sub", "obj", "act"])
		.with_effect("e", "some(where (p.eft == allow))")
		.with_matcher("m", "r.sub == p.sub && r.obj == p.obj && r.act == p.act")
}

pub fn rbac_model() -> Model {
	basic_model()
		.with_role("g", RoleDefinition::new(2))
		.with_matcher("m", "g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act")
}

pub fn rbac_with_domains_model() -> Model {
	Model::new()
		.with_request("r", ["sub", "dom", "obj", "act"])
		.with_policy("p", ["sub", "dom", "obj", "act"])
		.with_role("g", RoleDefinition::new(3))
		.with_effect("e", "some(where (p.eft == allow))")
		.with_matcher(
			"m",
			"g(r.sub, p.sub, r.dom) && r.dom == p.dom && r.obj == p.obj && r.act == p.act",
		)
}

pub fn rbac_with_deny_model() -> Model {
	Model::new()
		.with_request("r", ["sub", "obj", "act"])
		.with_policy("p", ["sub", "obj", "act", "eft"])
		.with_role("g", RoleDefinition::new(2))
		.with_effect(
			"e",
			"some(where (p.eft == allow)) && !some(where (p.eft == deny))",
		)
		.with_matcher("m", "g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act")
}

pub fn priority_model() -> Model {
	Model::new()
		.with_request("r", ["sub", "obj", "act"])
		.with_policy("p", ["sub", "obj", "act", "eft"])
		.with_role("g", RoleDefinition::new(2))
		.with_effect("e", "priority(p.eft) || deny")
		.with_matcher("m", "g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act")
}

/// The classic RBAC fixture: two direct grants, one role with two grants.
pub fn rbac_policy() -> MemoryPolicyStore {
	MemoryPolicyStore::from_rules([
		("p", rule(&["alice", "data1", "read"])),
		("p", rule(&["bob", "data2", "write"])),
		("p", rule(&["data2_admin", "data2", "read"])),
		("p", rule(&["data2_admin", "data2", "write"])),
		("g", rule(&["alice", "data2_admin"])),
	])
}

pub fn rbac_enforcer() -> Enforcer {
	init_tracing();
	Enforcer::builder(rbac_model())
		.with_store(rbac_policy())
		.build()
		.expect("rbac enforcer")
}
