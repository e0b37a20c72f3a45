// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Readers running against one enforcer while writers mutate it.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};

use common::{rbac_enforcer, rbac_model};

/// Enforce calls see either the old or the new role graph, never an error
/// or a half-built state, while grouping rules churn.
#[test]
fn test_enforce_during_role_rebuilds() {
	let e = rbac_enforcer();
	let done = AtomicBool::new(false);

	std::thread::scope(|scope| {
		for _ in 0..4 {
			scope.spawn(|| {
				while !done.load(Ordering::Acquire) {
					// alice's direct grant never changes.
					assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
					// bob's role-derived grant flips with the churn below.
					let _ = e.enforce(&["bob", "data2", "read"]).unwrap();
					assert!(!e.enforce(&["mallory", "data2", "read"]).unwrap());
				}
			});
		}

		scope.spawn(|| {
			for _ in 0..200 {
				e.add_grouping_policy(&["bob", "data2_admin"]).unwrap();
				assert!(e.enforce(&["bob", "data2", "read"]).unwrap());
				e.remove_grouping_policy(&["bob", "data2_admin"]).unwrap();
				assert!(!e.enforce(&["bob", "data2", "read"]).unwrap());
			}
			done.store(true, Ordering::Release);
		});
	});

	assert!(!e.has_grouping_policy(&["bob", "data2_admin"]));
}

#[test]
fn test_enforce_during_model_reloads() {
	let e = rbac_enforcer();
	let done = AtomicBool::new(false);
	let strict = rbac_model().with_matcher("m", "r.sub == p.sub && r.obj == p.obj && r.act == p.act");

	std::thread::scope(|scope| {
		for _ in 0..4 {
			scope.spawn(|| {
				while !done.load(Ordering::Acquire) {
					assert!(e.enforce(&["alice", "data1", "read"]).unwrap());
				}
			});
		}

		scope.spawn(|| {
			for _ in 0..50 {
				e.load_model(strict.clone()).unwrap();
				assert!(!e.enforce(&["alice", "data2", "read"]).unwrap());
				e.load_model(rbac_model()).unwrap();
				assert!(e.enforce(&["alice", "data2", "read"]).unwrap());
			}
			done.store(true, Ordering::Release);
		});
	});
}

#[test]
fn test_independent_enforcers() {
	let first = rbac_enforcer();
	let second = rbac_enforcer();
	first.add_grouping_policy(&["bob", "data2_admin"]).unwrap();
	assert!(first.enforce(&["bob", "data2", "read"]).unwrap());
	assert!(!second.enforce(&["bob", "data2", "read"]).unwrap());
}
