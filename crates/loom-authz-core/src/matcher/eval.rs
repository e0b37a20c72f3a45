// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::borrow::Cow;
use std::cmp::Ordering;

use super::ast::{BinaryOp, Literal, UnaryOp};
use super::compile::{CompiledMatcher, Node};
use super::RoleLinks;
use crate::error::EvalError;
use crate::value::Value;

struct Frame<'v, R, P> {
	request: &'v [R],
	policy: &'v [P],
	links: &'v dyn RoleLinks,
}

impl CompiledMatcher {
	/// Evaluates the matcher for one request against one policy row.
	pub fn evaluate<R, P>(
		&self,
		request: &[R],
		policy: &[P],
		links: &dyn RoleLinks,
	) -> Result<bool, EvalError>
	where
		R: AsRef<str>,
		P: AsRef<str>,
	{
		let frame = Frame {
			request,
			policy,
			links,
		};
		match eval(&self.root, &frame)? {
			Value::Bool(matched) => Ok(matched),
			other => Err(EvalError::TypeMismatch(format!(
				"matcher `{}` produced a {} instead of a boolean",
				self.source,
				other.type_name()
			))),
		}
	}

	/// Number of request values the matcher was compiled against.
	pub fn request_arity(&self) -> usize {
		self.request_arity
	}

	/// Number of policy values the matcher was compiled against.
	pub fn policy_arity(&self) -> usize {
		self.policy_arity
	}
}

fn eval<'v, R, P>(node: &'v Node, frame: &Frame<'v, R, P>) -> Result<Value<'v>, EvalError>
where
	R: AsRef<str>,
	P: AsRef<str>,
{
	match node {
		Node::Literal(literal) => Ok(match literal {
			Literal::Bool(b) => Value::Bool(*b),
			Literal::Number(n) => Value::Number(*n),
			Literal::Str(s) => Value::str(s),
		}),
		Node::Request(index) => frame
			.request
			.get(*index)
			.map(|v| Value::str(v.as_ref()))
			.ok_or_else(|| EvalError::Unbound(format!("request field #{index}"))),
		Node::Policy(index) => frame
			.policy
			.get(*index)
			.map(|v| Value::str(v.as_ref()))
			.ok_or_else(|| EvalError::Unbound(format!("policy field #{index}"))),
		Node::RoleLink { relation, args } => {
			let values = args
				.iter()
				.map(|arg| eval(arg, frame))
				.collect::<Result<Vec<_>, _>>()?;
			let names: Vec<Cow<'_, str>> = values.iter().map(Value::as_str).collect();
			let [name1, name2, rest @ ..] = names.as_slice() else {
				return Err(EvalError::TypeMismatch(format!(
					"`{relation}` needs at least 2 arguments"
				)));
			};
			let domains: Vec<&str> = rest.iter().map(|name| &**name).collect();
			Ok(Value::Bool(
				frame.links.has_link(relation, name1, name2, &domains),
			))
		}
		Node::Call {
			name,
			function,
			args,
		} => {
			let values = args
				.iter()
				.map(|arg| eval(arg, frame))
				.collect::<Result<Vec<_>, _>>()?;
			function
				.call(&values)
				.map_err(|source| EvalError::Function {
					name: name.clone(),
					source,
				})
		}
		Node::Unary { op, operand } => {
			let value = eval(operand, frame)?;
			match op {
				UnaryOp::Not => Ok(Value::Bool(!value.as_bool()?)),
				UnaryOp::Neg => Ok(Value::Number(-number(&value, "-")?)),
			}
		}
		Node::Binary { op, left, right } => eval_binary(*op, left, right, frame),
		Node::In { needle, list } => {
			let needle = eval(needle, frame)?;
			for item in list {
				if needle.loose_eq(&eval(item, frame)?) {
					return Ok(Value::Bool(true));
				}
			}
			Ok(Value::Bool(false))
		}
	}
}

fn eval_binary<'v, R, P>(
	op: BinaryOp,
	left: &'v Node,
	right: &'v Node,
	frame: &Frame<'v, R, P>,
) -> Result<Value<'v>, EvalError>
where
	R: AsRef<str>,
	P: AsRef<str>,
{
	let lhs = eval(left, frame)?;
	let rhs = || eval(right, frame);
	let symbol = op.symbol();

	// `&&` and `||` only touch the right side when they must.
	match op {
		BinaryOp::And => Ok(Value::Bool(lhs.as_bool()? && rhs()?.as_bool()?)),
		BinaryOp::Or => Ok(Value::Bool(lhs.as_bool()? || rhs()?.as_bool()?)),
		BinaryOp::Eq => Ok(Value::Bool(lhs.loose_eq(&rhs()?))),
		BinaryOp::Ne => Ok(Value::Bool(!lhs.loose_eq(&rhs()?))),
		BinaryOp::Lt => Ok(Value::Bool(lhs.compare(&rhs()?)? == Ordering::Less)),
		BinaryOp::Le => Ok(Value::Bool(lhs.compare(&rhs()?)? != Ordering::Greater)),
		BinaryOp::Gt => Ok(Value::Bool(lhs.compare(&rhs()?)? == Ordering::Greater)),
		BinaryOp::Ge => Ok(Value::Bool(lhs.compare(&rhs()?)? != Ordering::Less)),
		BinaryOp::Add => match (&lhs, rhs()?) {
			(Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{a}{b}"))),
			(_, other) => Ok(Value::Number(number(&lhs, symbol)? + number(&other, symbol)?)),
		},
		BinaryOp::Sub => Ok(Value::Number(number(&lhs, symbol)? - number(&rhs()?, symbol)?)),
		BinaryOp::Mul => Ok(Value::Number(number(&lhs, symbol)? * number(&rhs()?, symbol)?)),
		BinaryOp::Div | BinaryOp::Mod => {
			let divisor = number(&rhs()?, symbol)?;
			if divisor == 0.0 {
				return Err(EvalError::TypeMismatch(format!("`{symbol}` by zero")));
			}
			let dividend = number(&lhs, symbol)?;
			Ok(Value::Number(if op == BinaryOp::Div {
				dividend / divisor
			} else {
				dividend % divisor
			}))
		}
	}
}

fn number(value: &Value<'_>, symbol: &str) -> Result<f64, EvalError> {
	value.as_number().ok_or_else(|| {
		EvalError::TypeMismatch(format!(
			"`{symbol}` needs numbers, found {} `{value}`",
			value.type_name()
		))
	})
}
