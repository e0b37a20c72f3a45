// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolves a parsed expression against a model scope.
//!
//! Every identifier becomes a field index and every call becomes either a
//! role-link test or a handle to a registered function, so evaluation never
//! looks anything up by name.

use std::collections::BTreeMap;

use tracing::debug;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::parser::MatcherParser;
use crate::error::{AuthzError, Result};
use crate::function::{Function, FunctionRegistry};
use crate::model::RoleDefinition;

/// Names a matcher may refer to.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
	/// Section key bound to `r`-style references, e.g. `r` or `r2`.
	pub request_key: &'a str,
	pub request_fields: &'a [String],
	/// Section key bound to `p`-style references, e.g. `p` or `p2`.
	pub policy_key: &'a str,
	pub policy_fields: &'a [String],
	pub roles: &'a BTreeMap<String, RoleDefinition>,
	pub functions: &'a FunctionRegistry,
}

impl<'a> Scope<'a> {
	/// Scope for expressions that only see policy fields, such as row filters.
	pub fn policy_only(
		policy_key: &'a str,
		policy_fields: &'a [String],
		functions: &'a FunctionRegistry,
	) -> Self {
		Self {
			request_key: "",
			request_fields: &[],
			policy_key,
			policy_fields,
			roles: empty_roles(),
			functions,
		}
	}
}

fn empty_roles() -> &'static BTreeMap<String, RoleDefinition> {
	static EMPTY: BTreeMap<String, RoleDefinition> = BTreeMap::new();
	&EMPTY
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
	Literal(Literal),
	Request(usize),
	Policy(usize),
	RoleLink {
		relation: String,
		args: Vec<Node>,
	},
	Call {
		name: String,
		function: Function,
		args: Vec<Node>,
	},
	Unary {
		op: UnaryOp,
		operand: Box<Node>,
	},
	Binary {
		op: BinaryOp,
		left: Box<Node>,
		right: Box<Node>,
	},
	In {
		needle: Box<Node>,
		list: Vec<Node>,
	},
}

/// Result type a node is known to produce before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
	Bool,
	Number,
	Str,
	Any,
}

/// Immutable, resolved matcher expression.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
	pub(crate) source: String,
	pub(crate) root: Node,
	pub(crate) request_arity: usize,
	pub(crate) policy_arity: usize,
}

impl CompiledMatcher {
	/// Parses and resolves `expression`.
	///
	/// Syntax problems are [`AuthzError::Syntax`]; unknown fields, unknown
	/// functions, wrong argument counts and non-boolean expressions are
	/// [`AuthzError::ModelConfig`].
	pub fn compile(expression: &str, scope: &Scope<'_>) -> Result<Self> {
		let ast = MatcherParser::parse(expression)?;
		let root = resolve(&ast, scope)?;

		match kind_of(&root) {
			Kind::Bool | Kind::Any => {}
			other => {
				return Err(AuthzError::model_config(format!(
					"matcher `{expression}` produces a {} instead of a boolean",
					kind_name(other)
				)));
			}
		}

		debug!(
			expression,
			request = scope.request_key,
			policy = scope.policy_key,
			"compiled matcher"
		);

		Ok(Self {
			source: expression.to_string(),
			root,
			request_arity: scope.request_fields.len(),
			policy_arity: scope.policy_fields.len(),
		})
	}

	pub fn source(&self) -> &str {
		&self.source
	}
}

fn resolve(expr: &Expr, scope: &Scope<'_>) -> Result<Node> {
	match expr {
		Expr::Literal(literal) => Ok(Node::Literal(literal.clone())),
		Expr::Ident(path) => resolve_ident(path, scope),
		Expr::Call { name, args } => resolve_call(name, args, scope),
		Expr::Unary { op, operand } => {
			let operand = resolve(operand, scope)?;
			let symbol = match op {
				UnaryOp::Not => "!",
				UnaryOp::Neg => "-",
			};
			check_operand(*op == UnaryOp::Not, &operand, symbol)?;
			Ok(Node::Unary {
				op: *op,
				operand: Box::new(operand),
			})
		}
		Expr::Binary { op, left, right } => {
			let left = resolve(left, scope)?;
			let right = resolve(right, scope)?;
			if op.is_logical() {
				check_operand(true, &left, op.symbol())?;
				check_operand(true, &right, op.symbol())?;
			}
			Ok(Node::Binary {
				op: *op,
				left: Box::new(left),
				right: Box::new(right),
			})
		}
		Expr::In { needle, list } => Ok(Node::In {
			needle: Box::new(resolve(needle, scope)?),
			list: list
				.iter()
				.map(|item| resolve(item, scope))
				.collect::<Result<_>>()?,
		}),
	}
}

fn resolve_ident(path: &[String], scope: &Scope<'_>) -> Result<Node> {
	let dotted = path.join(".");
	let [section, field] = path else {
		return Err(AuthzError::model_config(format!(
			"unknown identifier `{dotted}` in matcher"
		)));
	};

	let lookup = |fields: &[String]| fields.iter().position(|f| f == field);

	if !scope.request_key.is_empty() && section == scope.request_key {
		return lookup(scope.request_fields)
			.map(Node::Request)
			.ok_or_else(|| undeclared(&dotted, scope.request_key));
	}
	if section == scope.policy_key {
		return lookup(scope.policy_fields)
			.map(Node::Policy)
			.ok_or_else(|| undeclared(&dotted, scope.policy_key));
	}

	Err(AuthzError::model_config(format!(
		"unknown identifier `{dotted}` in matcher"
	)))
}

fn undeclared(dotted: &str, section: &str) -> AuthzError {
	AuthzError::model_config(format!(
		"`{dotted}` is not a declared field of `{section}`"
	))
}

fn resolve_call(name: &str, args: &[Expr], scope: &Scope<'_>) -> Result<Node> {
	let args = args
		.iter()
		.map(|arg| resolve(arg, scope))
		.collect::<Result<Vec<_>>>()?;

	if let Some(definition) = scope.roles.get(name) {
		if args.len() != definition.arity {
			return Err(AuthzError::model_config(format!(
				"role relation `{name}` takes {} arguments, got {}",
				definition.arity,
				args.len()
			)));
		}
		return Ok(Node::RoleLink {
			relation: name.to_string(),
			args,
		});
	}

	let function = scope.functions.get(name).ok_or_else(|| {
		AuthzError::model_config(format!("unknown function `{name}` in matcher"))
	})?;
	if let Some(expected) = function.arity() {
		if expected != args.len() {
			return Err(AuthzError::model_config(format!(
				"function `{name}` takes {expected} arguments, got {}",
				args.len()
			)));
		}
	}

	Ok(Node::Call {
		name: name.to_string(),
		function: function.clone(),
		args,
	})
}

fn check_operand(boolean: bool, node: &Node, symbol: &str) -> Result<()> {
	let kind = kind_of(node);
	let ok = match (boolean, kind) {
		(_, Kind::Any) => true,
		(true, k) => k == Kind::Bool,
		(false, k) => k == Kind::Number || k == Kind::Str,
	};
	if ok {
		Ok(())
	} else {
		Err(AuthzError::model_config(format!(
			"operand of `{symbol}` cannot be a {}",
			kind_name(kind)
		)))
	}
}

fn kind_of(node: &Node) -> Kind {
	match node {
		Node::Literal(Literal::Bool(_)) => Kind::Bool,
		Node::Literal(Literal::Number(_)) => Kind::Number,
		Node::Literal(Literal::Str(_)) => Kind::Str,
		Node::Request(_) | Node::Policy(_) => Kind::Str,
		Node::RoleLink { .. } | Node::In { .. } => Kind::Bool,
		Node::Call { function, .. } => match function {
			Function::Predicate(_) => Kind::Bool,
			Function::Callable { .. } => Kind::Any,
		},
		Node::Unary { op, .. } => match op {
			UnaryOp::Not => Kind::Bool,
			UnaryOp::Neg => Kind::Number,
		},
		Node::Binary { op, .. } if op.is_logical() || op.is_comparison() => Kind::Bool,
		Node::Binary { .. } => Kind::Any,
	}
}

fn kind_name(kind: Kind) -> &'static str {
	match kind {
		Kind::Bool => "boolean",
		Kind::Number => "number",
		Kind::Str => "string",
		Kind::Any => "value",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Fixture {
		request: Vec<String>,
		policy: Vec<String>,
		roles: BTreeMap<String, RoleDefinition>,
		functions: FunctionRegistry,
	}

	impl Fixture {
		fn new() -> Self {
			let mut roles = BTreeMap::new();
			roles.insert("g".to_string(), RoleDefinition::new(2));
			roles.insert("g2".to_string(), RoleDefinition::new(3));
			Self {
				request: vec!["sub".into(), "obj".into(), "act".into()],
				policy: vec!["sub".into(), "obj".into(), "act".into()],
				roles,
				functions: FunctionRegistry::new(),
			}
		}

		fn scope(&self) -> Scope<'_> {
			Scope {
				request_key: "r",
				request_fields: &self.request,
				policy_key: "p",
				policy_fields: &self.policy,
				roles: &self.roles,
				functions: &self.functions,
			}
		}

		fn compile(&self, expression: &str) -> Result<CompiledMatcher> {
			CompiledMatcher::compile(expression, &self.scope())
		}
	}

	#[test]
	fn resolves_fields_to_indices() {
		let fixture = Fixture::new();
		let matcher = fixture.compile("r.obj == p.act").unwrap();
		let Node::Binary { left, right, .. } = &matcher.root else {
			panic!("expected binary node");
		};
		assert!(matches!(**left, Node::Request(1)));
		assert!(matches!(**right, Node::Policy(2)));
	}

	#[test]
	fn undeclared_field_is_config_error() {
		let fixture = Fixture::new();
		let err = fixture.compile("r.nonexistent == p.sub").unwrap_err();
		assert!(matches!(err, AuthzError::ModelConfig(_)));
		assert!(err.to_string().contains("r.nonexistent"));
	}

	#[test]
	fn unknown_section_is_config_error() {
		let fixture = Fixture::new();
		assert!(matches!(
			fixture.compile("q.sub == p.sub"),
			Err(AuthzError::ModelConfig(_))
		));
		assert!(matches!(
			fixture.compile("r.sub.name == p.sub"),
			Err(AuthzError::ModelConfig(_))
		));
	}

	#[test]
	fn unknown_function_is_config_error() {
		let fixture = Fixture::new();
		let err = fixture.compile("fooMatch(r.obj, p.obj)").unwrap_err();
		assert!(err.to_string().contains("fooMatch"));
	}

	#[test]
	fn function_arity_is_checked() {
		let fixture = Fixture::new();
		assert!(fixture.compile("keyMatch(r.obj)").is_err());
		assert!(fixture.compile("keyGet2(r.obj, p.obj, 'id') == 'x'").is_ok());
	}

	#[test]
	fn role_relation_arity_follows_definition() {
		let fixture = Fixture::new();
		assert!(fixture.compile("g(r.sub, p.sub)").is_ok());
		assert!(fixture.compile("g(r.sub, p.sub, 'd1')").is_err());
		assert!(fixture.compile("g2(r.sub, p.sub, 'd1')").is_ok());
	}

	#[test]
	fn non_boolean_matcher_is_rejected() {
		let fixture = Fixture::new();
		assert!(fixture.compile("r.sub").is_err());
		assert!(fixture.compile("r.sub && p.sub").is_err());
		assert!(fixture.compile("!r.sub").is_err());
		assert!(fixture.compile("keyGet(r.obj, p.obj)").is_ok());
	}

	#[test]
	fn syntax_error_is_reported_as_syntax() {
		let fixture = Fixture::new();
		assert!(matches!(
			fixture.compile("r.sub == "),
			Err(AuthzError::Syntax { .. })
		));
	}

	#[test]
	fn policy_only_scope_rejects_request_fields() {
		let fixture = Fixture::new();
		let scope = Scope::policy_only("p", &fixture.policy, &fixture.functions);
		assert!(CompiledMatcher::compile("p.sub == 'alice'", &scope).is_ok());
		assert!(CompiledMatcher::compile("r.sub == p.sub", &scope).is_err());
		assert!(CompiledMatcher::compile("g(p.sub, 'admin')", &scope).is_err());
	}
}
