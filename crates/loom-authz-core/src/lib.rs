// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enforcement core for the Loom authorization engine.
//!
//! This crate holds the pieces that run on every authorization check. It
//! performs no I/O; policy storage and the enforcer live in `loom-authz`.
//!
//! # Overview
//!
//! - [`Model`]: request and policy shapes, role relations, matcher and effect
//! - [`FunctionRegistry`]: functions callable from matchers (`keyMatch`,
//!   `regexMatch`, `ipMatch`, ...) plus host-registered ones
//! - [`CompiledMatcher`]: a matcher expression resolved against a model,
//!   evaluated once per policy row
//! - [`RoleGraphs`]: role inheritance per relation, optionally per domain
//! - [`Effector`]: folds per-row outcomes into the final decision
//! - [`Snapshot`]: build-then-swap cell so readers never see a half-built state
//!
//! # Example
//!
//! ```
//! use loom_authz_core::{
//!     CompiledMatcher, Effector, FunctionRegistry, Model, NoRoleLinks, RowOutcome, Scope,
//! };
//!
//! let model = Model::new()
//!     .with_request("r", ["sub", "obj", "act"])
//!     .with_policy("p", ["sub", "obj", "act"])
//!     .with_effect("e", "some(where (p.eft == allow))")
//!     .with_matcher("m", "r.sub == p.sub && keyMatch(r.obj, p.obj) && r.act == p.act");
//! model.validate().unwrap();
//!
//! let functions = FunctionRegistry::new();
//! let scope = Scope {
//!     request_key: "r",
//!     request_fields: model.request_fields("r").unwrap(),
//!     policy_key: "p",
//!     policy_fields: model.policy_fields("p").unwrap(),
//!     roles: &model.roles,
//!     functions: &functions,
//! };
//! let matcher = CompiledMatcher::compile(&model.matchers["m"], &scope).unwrap();
//! let effector = Effector::parse(&model.effects["e"]).unwrap();
//!
//! let rows = [["alice", "/data/*", "read"], ["bob", "/data/*", "write"]];
//! let request = ["alice", "/data/report", "read"];
//! let (allowed, explain) = effector
//!     .combine(rows.iter().map(|row| {
//!         matcher
//!             .evaluate(&request, row, &NoRoleLinks)
//!             .map(RowOutcome::allow)
//!     }))
//!     .unwrap();
//! assert!(allowed);
//! assert_eq!(explain, vec![0]);
//! ```

pub mod effect;
pub mod error;
pub mod function;
pub mod matcher;
pub mod model;
pub mod role;
pub mod snapshot;
pub mod value;

pub use effect::{EffectKind, Effector, RowEffect, RowOutcome};
pub use error::{AuthzError, EvalError, FunctionError, Result};
pub use function::{Function, FunctionRegistry, MatchFn};
pub use matcher::{CompiledMatcher, MatcherParser, NoRoleLinks, RoleLinks, Scope};
pub use model::{Model, RoleDefinition, SectionBinding, EFFECT_FIELD, PRIORITY_FIELD};
pub use role::{RoleGraph, RoleGraphs, DEFAULT_MAX_HIERARCHY_LEVEL};
pub use snapshot::Snapshot;
pub use value::Value;
