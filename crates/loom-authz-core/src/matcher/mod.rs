// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Matcher expressions: parsing, compilation against a model, evaluation.

pub mod ast;
mod compile;
mod eval;
pub mod parser;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use compile::{CompiledMatcher, Scope};
pub use parser::MatcherParser;

/// Role-link test used by `g(...)`-style calls inside a matcher.
pub trait RoleLinks {
	/// Whether `name1` inherits `name2` through `relation`, within `domains`.
	fn has_link(&self, relation: &str, name1: &str, name2: &str, domains: &[&str]) -> bool;
}

/// Links for expressions compiled without role relations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoleLinks;

impl RoleLinks for NoRoleLinks {
	fn has_link(&self, _relation: &str, name1: &str, name2: &str, _domains: &[&str]) -> bool {
		name1 == name2
	}
}
