// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registry of functions callable from matcher expressions.
//!
//! Functions are resolved by name when a matcher is compiled, never per
//! evaluation. A name the registry does not know fails compilation.

mod builtin;
mod cache;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use builtin::{
	glob_match, ip_match, key_get, key_get2, key_match, key_match2, key_match3, key_match4,
	regex_match, wildcard_match,
};

use crate::error::FunctionError;
use crate::value::Value;

/// Two-argument string predicate, e.g. `keyMatch(r.obj, p.obj)`.
pub type Predicate =
	Arc<dyn Fn(&str, &str) -> Result<bool, FunctionError> + Send + Sync + 'static>;

/// General function over evaluated arguments.
pub type Callable =
	Arc<dyn Fn(&[Value<'_>]) -> Result<Value<'static>, FunctionError> + Send + Sync + 'static>;

/// Infallible predicate used by the role graph for role and domain patterns.
pub type MatchFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub enum Function {
	Predicate(Predicate),
	Callable {
		arity: Option<usize>,
		call: Callable,
	},
}

impl Function {
	pub fn predicate<F>(f: F) -> Self
	where
		F: Fn(&str, &str) -> Result<bool, FunctionError> + Send + Sync + 'static,
	{
		Function::Predicate(Arc::new(f))
	}

	/// Wraps a predicate that cannot fail.
	pub fn matcher<F>(f: F) -> Self
	where
		F: Fn(&str, &str) -> bool + Send + Sync + 'static,
	{
		Function::Predicate(Arc::new(move |a: &str, b: &str| Ok(f(a, b))))
	}

	pub fn callable<F>(arity: Option<usize>, f: F) -> Self
	where
		F: Fn(&[Value<'_>]) -> Result<Value<'static>, FunctionError> + Send + Sync + 'static,
	{
		Function::Callable {
			arity,
			call: Arc::new(f),
		}
	}

	/// Fixed argument count, if the function has one.
	pub fn arity(&self) -> Option<usize> {
		match self {
			Function::Predicate(_) => Some(2),
			Function::Callable { arity, .. } => *arity,
		}
	}

	pub fn call(&self, args: &[Value<'_>]) -> Result<Value<'static>, FunctionError> {
		match self {
			Function::Predicate(predicate) => {
				let [a, b] = args else {
					return Err(FunctionError::Arity {
						expected: 2,
						actual: args.len(),
					});
				};
				predicate(&a.as_str(), &b.as_str()).map(Value::Bool)
			}
			Function::Callable { arity, call } => {
				if let Some(expected) = arity {
					if *expected != args.len() {
						return Err(FunctionError::Arity {
							expected: *expected,
							actual: args.len(),
						});
					}
				}
				call(args)
			}
		}
	}
}

impl fmt::Debug for Function {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Function::Predicate(_) => f.write_str("Function::Predicate"),
			Function::Callable { arity, .. } => f
				.debug_struct("Function::Callable")
				.field("arity", arity)
				.finish(),
		}
	}
}

/// Named functions available to matcher expressions.
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
	functions: HashMap<String, Function>,
}

impl Default for FunctionRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl FunctionRegistry {
	/// Creates a registry holding the built-in functions.
	pub fn new() -> Self {
		let mut registry = Self::empty();
		registry.register("keyMatch", Function::matcher(key_match));
		registry.register("keyMatch2", Function::predicate(key_match2));
		registry.register("keyMatch3", Function::predicate(key_match3));
		registry.register("keyMatch4", Function::predicate(key_match4));
		registry.register("regexMatch", Function::predicate(regex_match));
		registry.register("ipMatch", Function::predicate(ip_match));
		registry.register("globMatch", Function::predicate(glob_match));
		registry.register(
			"keyGet",
			Function::callable(Some(2), |args| {
				Ok(Value::string(key_get(&args[0].as_str(), &args[1].as_str())))
			}),
		);
		registry.register(
			"keyGet2",
			Function::callable(Some(3), |args| {
				key_get2(&args[0].as_str(), &args[1].as_str(), &args[2].as_str())
					.map(Value::string)
			}),
		);
		registry
	}

	/// Creates a registry with no functions at all.
	pub fn empty() -> Self {
		Self {
			functions: HashMap::new(),
		}
	}

	/// Registers `function` under `name`, replacing any previous entry.
	pub fn register(&mut self, name: impl Into<String>, function: Function) {
		self.functions.insert(name.into(), function);
	}

	pub fn get(&self, name: &str) -> Option<&Function> {
		self.functions.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.functions.contains_key(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.functions.keys().map(String::as_str)
	}

	/// Looks up a predicate for use as a role or domain pattern matcher.
	///
	/// Predicate errors are treated as "no match". Returns `None` when the
	/// name is unknown or is not a two-argument predicate.
	pub fn match_fn(&self, name: &str) -> Option<MatchFn> {
		match self.functions.get(name)? {
			Function::Predicate(predicate) => {
				let predicate = Arc::clone(predicate);
				let matcher: MatchFn =
					Arc::new(move |a: &str, b: &str| predicate(a, b).unwrap_or(false));
				Some(matcher)
			}
			Function::Callable { .. } => None,
		}
	}
}
