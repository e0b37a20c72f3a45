// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recursive-descent parser for matcher expressions.
//!
//! Precedence, loosest first: `||`, `&&`, comparisons and `in`, `+ -`,
//! `* / %`, unary `! -`, then literals, calls, identifiers and groups.
//! Comparisons do not chain: `a == b == c` is rejected.

use winnow::ascii::{float, multispace0};
use winnow::combinator::{alt, fail};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{any, take_while};

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::error::{AuthzError, Result};

pub struct MatcherParser;

impl MatcherParser {
	pub fn parse(expression: &str) -> Result<Expr> {
		parse_expression.parse(expression).map_err(|e| {
			let offset = e.offset();
			let message = match expression.get(offset..).and_then(|rest| rest.chars().next()) {
				Some(c) => format!("unexpected `{c}`"),
				None => "unexpected end of expression".to_string(),
			};
			AuthzError::Syntax {
				expression: expression.to_string(),
				offset,
				message,
			}
		})
	}
}

fn parse_expression(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	let expr = parse_or_expr(input)?;
	ws(input)?;
	Ok(expr)
}

fn ws(input: &mut &str) -> std::result::Result<(), ContextError> {
	let spaces: std::result::Result<&str, ContextError> = multispace0.parse_next(input);
	spaces.map(|_| ())
}

fn expect(input: &mut &str, mut literal: &'static str) -> std::result::Result<(), ContextError> {
	ws(input)?;
	let matched: std::result::Result<&str, ContextError> = literal.parse_next(input);
	matched.map(|_| ())
}

/// Consumes `literal` if it comes next, restoring the input otherwise.
fn accept(input: &mut &str, literal: &'static str) -> bool {
	let checkpoint = *input;
	if expect(input, literal).is_ok() {
		return true;
	}
	*input = checkpoint;
	false
}

fn parse_or_expr(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	let mut result = parse_and_expr(input)?;
	while accept(input, "||") {
		let right = parse_and_expr(input)?;
		result = Expr::binary(BinaryOp::Or, result, right);
	}
	Ok(result)
}

fn parse_and_expr(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	let mut result = parse_comparison(input)?;
	while accept(input, "&&") {
		let right = parse_comparison(input)?;
		result = Expr::binary(BinaryOp::And, result, right);
	}
	Ok(result)
}

fn parse_comparison(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	let left = parse_additive(input)?;
	ws(input)?;

	if let Some(rest) = input.strip_prefix("in") {
		if rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
			*input = rest;
			let list = parse_list(input)?;
			return Ok(Expr::In {
				needle: Box::new(left),
				list,
			});
		}
	}

	let checkpoint = *input;
	let op: std::result::Result<BinaryOp, ContextError> = alt((
		"==".value(BinaryOp::Eq),
		"!=".value(BinaryOp::Ne),
		"<=".value(BinaryOp::Le),
		">=".value(BinaryOp::Ge),
		"<".value(BinaryOp::Lt),
		">".value(BinaryOp::Gt),
	))
	.parse_next(input);

	match op {
		Ok(op) => {
			let right = parse_additive(input)?;
			Ok(Expr::binary(op, left, right))
		}
		Err(_) => {
			*input = checkpoint;
			Ok(left)
		}
	}
}

fn parse_additive(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	let mut result = parse_multiplicative(input)?;
	loop {
		let op = if accept(input, "+") {
			BinaryOp::Add
		} else if accept(input, "-") {
			BinaryOp::Sub
		} else {
			break;
		};
		let right = parse_multiplicative(input)?;
		result = Expr::binary(op, result, right);
	}
	Ok(result)
}

fn parse_multiplicative(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	let mut result = parse_unary(input)?;
	loop {
		let op = if accept(input, "*") {
			BinaryOp::Mul
		} else if accept(input, "/") {
			BinaryOp::Div
		} else if accept(input, "%") {
			BinaryOp::Mod
		} else {
			break;
		};
		let right = parse_unary(input)?;
		result = Expr::binary(op, result, right);
	}
	Ok(result)
}

fn parse_unary(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	ws(input)?;
	if input.starts_with('!') && !input.starts_with("!=") {
		expect(input, "!")?;
		let operand = parse_unary(input)?;
		return Ok(Expr::unary(UnaryOp::Not, operand));
	}
	if input.starts_with('-') {
		expect(input, "-")?;
		let operand = parse_unary(input)?;
		return Ok(Expr::unary(UnaryOp::Neg, operand));
	}
	parse_primary(input)
}

fn parse_primary(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	ws(input)?;

	if input.starts_with('(') {
		expect(input, "(")?;
		let expr = parse_or_expr(input)?;
		expect(input, ")")?;
		return Ok(expr);
	}

	if input.starts_with(|c: char| c == '"' || c == '\'') {
		return parse_string(input).map(|s| Expr::Literal(Literal::Str(s)));
	}

	if input.starts_with(|c: char| c.is_ascii_digit()) {
		let number: std::result::Result<f64, ContextError> = float.parse_next(input);
		return number.map(|n| Expr::Literal(Literal::Number(n)));
	}

	if input.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
		return parse_reference(input);
	}

	fail.parse_next(input)
}

/// Identifier, dotted field reference, boolean keyword or function call.
fn parse_reference(input: &mut &str) -> std::result::Result<Expr, ContextError> {
	let mut path = vec![parse_ident(input)?];
	while input.starts_with('.') {
		expect(input, ".")?;
		path.push(parse_ident(input)?);
	}

	let checkpoint = *input;
	ws(input)?;
	if input.starts_with('(') {
		let args = parse_list(input)?;
		return Ok(Expr::Call {
			name: path.join("."),
			args,
		});
	}
	*input = checkpoint;

	if let [word] = path.as_slice() {
		match word.as_str() {
			"true" => return Ok(Expr::Literal(Literal::Bool(true))),
			"false" => return Ok(Expr::Literal(Literal::Bool(false))),
			_ => {}
		}
	}
	Ok(Expr::Ident(path))
}

fn parse_ident(input: &mut &str) -> std::result::Result<String, ContextError> {
	if !input.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
		return fail.parse_next(input);
	}
	let ident: std::result::Result<&str, ContextError> =
		take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input);
	ident.map(str::to_string)
}

/// Parenthesised, comma-separated expressions: call arguments or an `in` set.
fn parse_list(input: &mut &str) -> std::result::Result<Vec<Expr>, ContextError> {
	expect(input, "(")?;
	let mut items = Vec::new();
	if accept(input, ")") {
		return Ok(items);
	}
	loop {
		items.push(parse_or_expr(input)?);
		if accept(input, ",") {
			continue;
		}
		expect(input, ")")?;
		return Ok(items);
	}
}

fn parse_string(input: &mut &str) -> std::result::Result<String, ContextError> {
	let quote: std::result::Result<char, ContextError> = any.parse_next(input);
	let quote = quote?;
	let mut value = String::new();
	loop {
		let next: std::result::Result<char, ContextError> = any.parse_next(input);
		match next? {
			c if c == quote => return Ok(value),
			'\\' => {
				let escaped: std::result::Result<char, ContextError> = any.parse_next(input);
				value.push(match escaped? {
					'n' => '\n',
					't' => '\t',
					other => other,
				});
			}
			other => value.push(other),
		}
	}
}
