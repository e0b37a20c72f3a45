// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end enforcement scenarios.

mod common;

use common::{
	basic_model, init_tracing, priority_model, rbac_enforcer, rbac_model, rbac_with_deny_model,
	rbac_with_domains_model, rule,
};
use loom_authz::{
	AuthzError, EnforceContext, Enforcer, MemoryPolicyStore, Model, RoleDefinition,
};

fn enforcer_with(model: Model, rows: &[(&str, &[&str])]) -> Enforcer {
	init_tracing();
	let store = MemoryPolicyStore::from_rules(rows.iter().map(|(section, fields)| (*section, rule(fields))));
	Enforcer::builder(model)
		.with_store(store)
		.build()
		.expect("enforcer")
}

#[test]
fn test_basic_acl() {
	let e = enforcer_with(basic_model(), &[("p", &["alice", "data1", "read"])]);
	assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
	assert!(!e.enforce(&["bob", "data1", "read"]).unwrap());
}

/// A subject gets a role's permissions without any policy row naming it.
#[test]
fn test_role_inheritance() {
	let e = rbac_enforcer();
	assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
	assert!(e.enforce(&["alice", "data2", "read"]).unwrap());
	assert!(e.enforce(&["alice", "data2", "write"]).unwrap());
	assert!(!e.enforce(&["alice", "data1", "write"]).unwrap());
	assert!(!e.enforce(&["bob", "data1", "read"]).unwrap());
	assert!(e.enforce(&["bob", "data2", "write"]).unwrap());
	assert!(!e.enforce(&["bob", "data2", "read"]).unwrap());
}

#[test]
fn test_role_added_at_runtime() {
	let e = enforcer_with(rbac_model(), &[("p", &["data2_admin", "data2", "read"])]);
	assert!(!e.enforce(&["alice", "data2", "read"]).unwrap());
	e.add_grouping_policy(&["alice", "data2_admin"]).unwrap();
	assert!(e.enforce(&["alice", "data2", "read"]).unwrap());
}

/// Cycles in the grouping rules must neither hang nor break reachability.
#[test]
fn test_role_cycle_terminates() {
	let e = enforcer_with(
		rbac_model(),
		&[
			("p", &["c", "data1", "read"]),
			("g", &["a", "b"]),
			("g", &["b", "c"]),
			("g", &["c", "a"]),
		],
	);
	assert!(e.enforce(&["a", "data1", "read"]).unwrap());
	assert!(e.enforce(&["b", "data1", "read"]).unwrap());
	assert!(!e.enforce(&["d", "data1", "read"]).unwrap());
	assert_eq!(e.get_implicit_roles_for_user("a", &[]), vec!["b", "c"]);
}

#[test]
fn test_hierarchy_depth_is_bounded() {
	init_tracing();
	let store = MemoryPolicyStore::from_rules([
		("p", rule(&["r3", "data1", "read"])),
		("g", rule(&["u", "r1"])),
		("g", rule(&["r1", "r2"])),
		("g", rule(&["r2", "r3"])),
	]);
	let shallow = Enforcer::builder(rbac_model())
		.with_store(store.clone())
		.with_max_hierarchy_level(2)
		.build()
		.unwrap();
	assert!(!shallow.enforce(&["u", "data1", "read"]).unwrap());
	assert!(shallow.enforce(&["r1", "data1", "read"]).unwrap());

	let deep = Enforcer::builder(rbac_model()).with_store(store).build().unwrap();
	assert!(deep.enforce(&["u", "data1", "read"]).unwrap());
}

#[test]
fn test_domain_isolation() {
	let e = enforcer_with(
		rbac_with_domains_model(),
		&[
			("p", &["admin", "domain1", "data1", "read"]),
			("p", &["admin", "domain2", "data2", "read"]),
			("g", &["alice", "admin", "domain1"]),
			("g", &["bob", "admin", "domain2"]),
		],
	);
	assert!(e.enforce(&["alice", "domain1", "data1", "read"]).unwrap());
	assert!(!e.enforce(&["alice", "domain2", "data2", "read"]).unwrap());
	assert!(e.enforce(&["bob", "domain2", "data2", "read"]).unwrap());
	assert!(!e.enforce(&["bob", "domain1", "data1", "read"]).unwrap());

	assert_eq!(e.get_roles_for_user("alice", &["domain1"]), vec!["admin"]);
	assert!(e.get_roles_for_user("alice", &["domain2"]).is_empty());
	assert_eq!(e.get_users_for_role("admin", &["domain2"]), vec!["bob"]);
}

#[test]
fn test_domain_pattern_matching() {
	let model = rbac_with_domains_model()
		.with_role("g", RoleDefinition::new(3).with_domain_matching("keyMatch"));
	let e = enforcer_with(
		model,
		&[
			("p", &["admin", "tenant/acme", "data1", "read"]),
			("p", &["admin", "other", "data1", "read"]),
			("g", &["alice", "admin", "tenant/*"]),
		],
	);
	assert!(e.enforce(&["alice", "tenant/acme", "data1", "read"]).unwrap());
	assert!(!e.enforce(&["alice", "other", "data1", "read"]).unwrap());
}

#[test]
fn test_role_pattern_matching() {
	let model = Model::new()
		.with_request("r", ["sub", "obj", "act"])
		.with_policy("p", ["sub", "obj", "act"])
		.with_role("g2", RoleDefinition::new(2).with_role_matching("keyMatch2"))
		.with_effect("e", "some(where (p.eft == allow))")
		.with_matcher("m", "r.sub == p.sub && g2(r.obj, p.obj) && r.act == p.act");
	let e = enforcer_with(
		model,
		&[
			("p", &["alice", "book_group", "read"]),
			("g2", &["/book/:id", "book_group"]),
		],
	);
	assert!(e.enforce(&["alice", "/book/1", "read"]).unwrap());
	assert!(e.enforce(&["alice", "/book/42", "read"]).unwrap());
	assert!(!e.enforce(&["alice", "/pen/1", "read"]).unwrap());
}

/// A matching deny wins regardless of where it sits relative to the allow.
#[test]
fn test_allow_and_deny() {
	for rows in [
		[
			("p", &["alice", "data1", "read", "allow"][..]),
			("p", &["deny_group", "data1", "read", "deny"][..]),
		],
		[
			("p", &["deny_group", "data1", "read", "deny"][..]),
			("p", &["alice", "data1", "read", "allow"][..]),
		],
	] {
		let mut all = rows.to_vec();
		all.push(("g", &["alice", "deny_group"][..]));
		all.push(("p", &["bob", "data1", "read", "allow"][..]));
		let e = enforcer_with(rbac_with_deny_model(), &all);
		assert!(!e.enforce(&["alice", "data1", "read"]).unwrap());
		assert!(e.enforce(&["bob", "data1", "read"]).unwrap());
	}
}

#[test]
fn test_deny_override() {
	let model = rbac_with_deny_model().with_effect("e", "!some(where (p.eft == deny))");
	let e = enforcer_with(model, &[("p", &["alice", "data1", "write", "deny"])]);
	assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
	assert!(e.enforce(&["nobody", "data9", "read"]).unwrap());
	let decision = e.enforce_ex(&["alice", "data1", "write"]).unwrap();
	assert!(!decision.allowed);
	assert_eq!(decision.explain, vec![rule(&["alice", "data1", "write", "deny"])]);
}

/// Equal priority: the first stored row decides.
#[test]
fn test_priority_first_row_wins() {
	let e = enforcer_with(
		priority_model(),
		&[
			("p", &["alice", "data1", "read", "deny"]),
			("p", &["data1_group", "data1", "read", "allow"]),
			("g", &["alice", "data1_group"]),
		],
	);
	assert!(!e.enforce(&["alice", "data1", "read"]).unwrap());

	e.remove_policy(&["alice", "data1", "read", "deny"]).unwrap();
	assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
}

#[test]
fn test_priority_field_orders_rows() {
	let model = Model::new()
		.with_request("r", ["sub", "obj", "act"])
		.with_policy("p", ["priority", "sub", "obj", "act", "eft"])
		.with_role("g", RoleDefinition::new(2))
		.with_effect("e", "priority(p.eft) || deny")
		.with_matcher("m", "g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act");
	let e = enforcer_with(
		model,
		&[
			("p", &["10", "data1_deny_group", "data1", "read", "deny"]),
			("p", &["1", "alice", "data1", "read", "allow"]),
			("g", &["alice", "data1_deny_group"]),
		],
	);
	let decision = e.enforce_ex(&["alice", "data1", "read"]).unwrap();
	assert!(decision.allowed);
	assert_eq!(decision.explain, vec![rule(&["1", "alice", "data1", "read", "allow"])]);
}

/// Once the highest-priority match decides, lower rows are never evaluated,
/// so a malformed row further down cannot turn the decision into an error.
#[test]
fn test_priority_stops_at_deciding_row() {
	let model = Model::new()
		.with_request("r", ["sub", "ip"])
		.with_policy("p", ["priority", "sub", "cidr", "eft"])
		.with_effect("e", "priority(p.eft) || deny")
		.with_matcher("m", "r.sub == p.sub && ipMatch(r.ip, p.cidr)");
	let e = enforcer_with(
		model,
		&[
			("p", &["2", "alice", "garbage", "deny"]),
			("p", &["1", "alice", "10.0.0.0/8", "allow"]),
		],
	);
	let decision = e.enforce_ex(&["alice", "10.1.2.3"]).unwrap();
	assert!(decision.allowed);
	assert_eq!(decision.explain, vec![rule(&["1", "alice", "10.0.0.0/8", "allow"])]);
	// Outside the allowed block the malformed row is reached and reported.
	assert!(matches!(
		e.enforce(&["alice", "192.168.0.1"]),
		Err(AuthzError::Eval(_))
	));
}

fn ranked_model(rank_field: &str, matcher: &str) -> Model {
	Model::new()
		.with_request("r", ["sub", "obj", "act"])
		.with_policy("p", ["sub", "obj", "act", "eft", rank_field])
		.with_effect("e", "priority(p.eft) || deny")
		.with_matcher("m", matcher)
}

/// A rejected model must leave both the decision and the row order alone.
#[test]
fn test_failed_reload_keeps_row_order() {
	const MATCHER: &str = "r.sub == p.sub && r.obj == p.obj && r.act == p.act";
	let rows = [
		rule(&["alice", "data1", "read", "deny", "5"]),
		rule(&["alice", "data1", "read", "allow", "1"]),
	];
	let e = enforcer_with(
		ranked_model("rank", MATCHER),
		&[("p", &["alice", "data1", "read", "deny", "5"]), ("p", &["alice", "data1", "read", "allow", "1"])],
	);
	assert!(!e.enforce(&["alice", "data1", "read"]).unwrap());

	assert!(matches!(
		e.load_model(ranked_model("priority", "r.sub ==")),
		Err(AuthzError::Syntax { .. })
	));
	assert!(!e.enforce(&["alice", "data1", "read"]).unwrap());
	assert_eq!(e.get_policy(), rows.to_vec());

	// A valid reload with a priority field reorders the rows.
	e.load_model(ranked_model("priority", MATCHER)).unwrap();
	assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
	assert_eq!(e.get_policy(), vec![rows[1].clone(), rows[0].clone()]);
}

#[test]
fn test_threshold_effect() {
	let model = rbac_model().with_effect("e", "count(where (p.eft == allow)) >= 2");
	let e = enforcer_with(
		model,
		&[
			("p", &["alice", "data1", "read"]),
			("p", &["reader", "data1", "read"]),
			("p", &["bob", "data1", "read"]),
			("g", &["alice", "reader"]),
		],
	);
	assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
	assert!(!e.enforce(&["bob", "data1", "read"]).unwrap());
}

#[test]
fn test_indeterminate_effect_never_matches() {
	let e = enforcer_with(
		rbac_with_deny_model(),
		&[("p", &["alice", "data1", "read", "maybe"])],
	);
	assert!(!e.enforce(&["alice", "data1", "read"]).unwrap());
}

#[test]
fn test_restful_matching() {
	let model = basic_model().with_matcher(
		"m",
		"r.sub == p.sub && keyMatch2(r.obj, p.obj) && regexMatch(r.act, p.act)",
	);
	let e = enforcer_with(
		model,
		&[
			("p", &["alice", "/alice_data/:resource", "GET"]),
			("p", &["bob", "/bob_data/*", "(GET)|(POST)"]),
		],
	);
	assert!(e.enforce(&["alice", "/alice_data/hello", "GET"]).unwrap());
	assert!(!e.enforce(&["alice", "/alice_data/hello", "POST"]).unwrap());
	assert!(!e.enforce(&["alice", "/bob_data/hello", "GET"]).unwrap());
	assert!(e.enforce(&["bob", "/bob_data/a/b", "POST"]).unwrap());
	assert!(!e.enforce(&["bob", "/bob_data/a/b", "DELETE"]).unwrap());
}

#[test]
fn test_superuser_and_in_operator() {
	let model = basic_model().with_matcher(
		"m",
		"r.sub == 'root' || (r.sub == p.sub && r.obj == p.obj && r.act in ('read', 'list'))",
	);
	let e = enforcer_with(model, &[("p", &["alice", "data1", "ignored"])]);
	assert!(e.enforce(&["root", "anything", "delete"]).unwrap());
	assert!(e.enforce(&["alice", "data1", "list"]).unwrap());
	assert!(!e.enforce(&["alice", "data1", "write"]).unwrap());
}

/// Numeric strings compare by value; exact equality stays textual.
#[test]
fn test_numeric_comparison() {
	let model = Model::new()
		.with_request("r", ["sub", "level"])
		.with_policy("p", ["sub", "min_level"])
		.with_effect("e", "some(where (p.eft == allow))")
		.with_matcher("m", "r.sub == p.sub && r.level >= p.min_level");
	let e = enforcer_with(model, &[("p", &["alice", "9"])]);
	assert!(e.enforce(&["alice", "10"]).unwrap());
	assert!(e.enforce(&["alice", "9"]).unwrap());
	assert!(!e.enforce(&["alice", "8.5"]).unwrap());

	let exact = basic_model().with_matcher("m", "r.sub == p.sub && r.obj == p.obj");
	let e = enforcer_with(exact, &[("p", &["alice", "10", "read"])]);
	assert!(e.enforce(&["alice", "10", "read"]).unwrap());
	assert!(!e.enforce(&["alice", "10.0", "read"]).unwrap());
}

#[test]
fn test_multiple_sections() {
	let model = rbac_model()
		.with_request("r2", ["sub", "obj"])
		.with_policy("p2", ["sub", "obj"])
		.with_matcher("m2", "r2.sub == p2.sub && keyMatch(r2.obj, p2.obj)");
	let e = enforcer_with(
		model,
		&[("p", &["alice", "data1", "read"]), ("p2", &["bob", "/files/*"])],
	);
	let second = EnforceContext::new("2");
	assert!(e.enforce_with_context(&second, &["bob", "/files/report"]).unwrap());
	assert!(!e.enforce_with_context(&second, &["alice", "/files/report"]).unwrap());
	assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
	assert!(matches!(
		e.enforce_with_context(&second, &["bob", "/files/report", "read"]),
		Err(AuthzError::Arity { .. })
	));
}

#[test]
fn test_explain_lists_deciding_row() {
	let e = rbac_enforcer();
	let decision = e.enforce_ex(&["alice", "data2", "write"]).unwrap();
	assert!(decision.allowed);
	assert_eq!(decision.explain, vec![rule(&["data2_admin", "data2", "write"])]);

	let decision = e.enforce_ex(&["alice", "data3", "write"]).unwrap();
	assert!(!decision.allowed);
	assert!(decision.explain.is_empty());
}

#[test]
fn test_unregistered_function_fails_compile() {
	let model = basic_model().with_matcher("m", "customMatch(r.obj, p.obj)");
	assert!(matches!(Enforcer::new(model), Err(AuthzError::ModelConfig(_))));
}

#[test]
fn test_rebuild_is_idempotent() {
	let e = rbac_enforcer();
	let probe = [
		("alice", "data2_admin"),
		("bob", "data2_admin"),
		("alice", "alice"),
		("data2_admin", "alice"),
	];
	let before: Vec<bool> = probe
		.iter()
		.map(|(a, b)| e.get_implicit_roles_for_user(a, &[]).iter().any(|r| r == b) || a == b)
		.collect();
	e.build_role_links().unwrap();
	e.build_role_links().unwrap();
	let after: Vec<bool> = probe
		.iter()
		.map(|(a, b)| e.get_implicit_roles_for_user(a, &[]).iter().any(|r| r == b) || a == b)
		.collect();
	assert_eq!(before, after);
	assert_eq!(before, vec![true, false, true, false]);
}
