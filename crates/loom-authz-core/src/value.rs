// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime values produced while evaluating a matcher.
//!
//! Request and policy fields are untyped strings. Numbers only appear from
//! numeric literals, arithmetic, or functions that return them, so the
//! comparison rules below decide how the two meet:
//!
//! - `==` / `!=`: two strings compare exactly; a number and a string compare
//!   numerically when the string is a plain numeric literal, otherwise they are
//!   unequal; a boolean and a string compare against `"true"` / `"false"`.
//! - `<`, `<=`, `>`, `>=`: numeric when both sides are numbers or numeric
//!   strings, lexicographic when both are non-numeric strings, otherwise a
//!   type mismatch.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use crate::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
	Bool(bool),
	Number(f64),
	Str(Cow<'a, str>),
}

impl<'a> Value<'a> {
	pub fn str(value: &'a str) -> Self {
		Value::Str(Cow::Borrowed(value))
	}

	pub fn string(value: impl Into<String>) -> Value<'static> {
		Value::Str(Cow::Owned(value.into()))
	}

	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Bool(_) => "boolean",
			Value::Number(_) => "number",
			Value::Str(_) => "string",
		}
	}

	/// String form used when a value is passed to a string function.
	pub fn as_str(&self) -> Cow<'_, str> {
		match self {
			Value::Str(s) => Cow::Borrowed(s.as_ref()),
			Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
			Value::Number(n) => Cow::Owned(format_number(*n)),
		}
	}

	/// Numeric view of the value, parsing strings that are numeric literals.
	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			Value::Str(s) => parse_numeric(s),
			Value::Bool(_) => None,
		}
	}

	pub fn as_bool(&self) -> Result<bool, EvalError> {
		match self {
			Value::Bool(b) => Ok(*b),
			other => Err(EvalError::TypeMismatch(format!(
				"expected boolean, found {}",
				other.type_name()
			))),
		}
	}

	pub fn into_owned(self) -> Value<'static> {
		match self {
			Value::Bool(b) => Value::Bool(b),
			Value::Number(n) => Value::Number(n),
			Value::Str(s) => Value::Str(Cow::Owned(s.into_owned())),
		}
	}

	/// Equality as used by `==`, `!=` and `in`.
	pub fn loose_eq(&self, other: &Value<'_>) -> bool {
		match (self, other) {
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::Number(n), Value::Str(s)) | (Value::Str(s), Value::Number(n)) => {
				parse_numeric(s).is_some_and(|v| v == *n)
			}
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Bool(b), Value::Str(s)) | (Value::Str(s), Value::Bool(b)) => {
				s == if *b { "true" } else { "false" }
			}
			(Value::Bool(_), Value::Number(_)) | (Value::Number(_), Value::Bool(_)) => false,
		}
	}

	/// Ordering as used by `<`, `<=`, `>` and `>=`.
	pub fn compare(&self, other: &Value<'_>) -> Result<Ordering, EvalError> {
		if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
			return a.partial_cmp(&b).ok_or_else(|| {
				EvalError::TypeMismatch(format!("cannot order {a} and {b}"))
			});
		}
		match (self, other) {
			(Value::Str(a), Value::Str(b))
				if parse_numeric(a).is_none() && parse_numeric(b).is_none() =>
			{
				Ok(a.as_ref().cmp(b.as_ref()))
			}
			(a, b) => Err(EvalError::TypeMismatch(format!(
				"cannot order {} and {}",
				a.type_name(),
				b.type_name()
			))),
		}
	}
}

impl fmt::Display for Value<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.as_str())
	}
}

/// Parses `s` as a number only when it looks like a numeric literal.
///
/// Rejects forms such as `inf`, `NaN` or `1_000` that `f64::from_str` either
/// accepts or that would surprise policy authors.
pub fn parse_numeric(s: &str) -> Option<f64> {
	let body = s.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(s);
	let starts_numeric = body
		.chars()
		.next()
		.is_some_and(|c| c.is_ascii_digit() || c == '.');
	if !starts_numeric
		|| !body
			.chars()
			.all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
	{
		return None;
	}
	s.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn format_number(n: f64) -> String {
	if n.fract() == 0.0 && n.abs() < 1e15 {
		format!("{}", n as i64)
	} else {
		format!("{n}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strings_compare_exactly() {
		assert!(Value::str("10").loose_eq(&Value::str("10")));
		assert!(!Value::str("10").loose_eq(&Value::str("10.0")));
		assert!(!Value::str("Alice").loose_eq(&Value::str("alice")));
	}

	#[test]
	fn number_and_numeric_string_compare_numerically() {
		assert!(Value::Number(10.0).loose_eq(&Value::str("10")));
		assert!(Value::str("10.0").loose_eq(&Value::Number(10.0)));
		assert!(!Value::Number(10.0).loose_eq(&Value::str("ten")));
	}

	#[test]
	fn ordering_is_numeric_for_numeric_strings() {
		assert_eq!(
			Value::str("10").compare(&Value::str("9")).unwrap(),
			Ordering::Greater
		);
		assert_eq!(
			Value::str("apple").compare(&Value::str("banana")).unwrap(),
			Ordering::Less
		);
	}

	#[test]
	fn ordering_mixed_non_numeric_is_an_error() {
		assert!(Value::str("ten").compare(&Value::Number(9.0)).is_err());
		assert!(Value::Bool(true).compare(&Value::Number(1.0)).is_err());
		assert!(Value::str("apple").compare(&Value::str("9")).is_err());
		assert!(Value::str("10").compare(&Value::str("ten")).is_err());
	}

	#[test]
	fn bool_and_string_compare_by_text() {
		assert!(Value::Bool(true).loose_eq(&Value::str("true")));
		assert!(!Value::Bool(false).loose_eq(&Value::str("0")));
	}

	#[test]
	fn parse_numeric_rejects_special_forms() {
		assert_eq!(parse_numeric("42"), Some(42.0));
		assert_eq!(parse_numeric("-1.5"), Some(-1.5));
		assert_eq!(parse_numeric("inf"), None);
		assert_eq!(parse_numeric("NaN"), None);
		assert_eq!(parse_numeric(""), None);
		assert_eq!(parse_numeric("1_000"), None);
	}

	#[test]
	fn numbers_render_without_trailing_zero() {
		assert_eq!(Value::Number(3.0).as_str(), "3");
		assert_eq!(Value::Number(2.5).as_str(), "2.5");
	}
}
