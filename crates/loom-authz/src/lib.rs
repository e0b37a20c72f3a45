// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Embeddable policy enforcer with role inheritance.
//!
//! This crate provides:
//! - [`Enforcer`]: decides requests against a model and a policy store
//! - [`PolicyStore`] with the in-memory [`MemoryPolicyStore`]
//! - Policy and grouping-rule management on the enforcer
//! - Layered configuration (`LOOM_AUTHZ_*`, `/etc/loom/authz.toml`) and TOML
//!   model loading
//!
//! # Usage
//!
//! ```
//! use loom_authz::{Enforcer, Model, RoleDefinition};
//!
//! let model = Model::new()
//!     .with_request("r", ["sub", "obj", "act"])
//!     .with_policy("p", ["sub", "obj", "act"])
//!     .with_role("g", RoleDefinition::new(2))
//!     .with_effect("e", "some(where (p.eft == allow))")
//!     .with_matcher("m", "g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act");
//!
//! let enforcer = Enforcer::new(model).unwrap();
//! enforcer.add_policy(&["data2_admin", "data2", "read"]).unwrap();
//! enforcer.add_grouping_policy(&["alice", "data2_admin"]).unwrap();
//!
//! assert!(enforcer.enforce(&["alice", "data2", "read"]).unwrap());
//! assert!(!enforcer.enforce(&["bob", "data2", "read"]).unwrap());
//! ```

pub mod config;
pub mod decision;
pub mod enforcer;
mod management;
pub mod store;

pub use config::{load_config, load_config_with_file, load_enforcer, load_model_file, AuthzConfig, ConfigError};
pub use decision::{Decision, EnforceContext};
pub use enforcer::{Enforcer, EnforcerBuilder};
pub use store::{MemoryPolicyStore, PolicyStore, Rule};

pub use loom_authz_core::{
	AuthzError, EvalError, Function, FunctionError, FunctionRegistry, Model, Result, RoleDefinition,
};
