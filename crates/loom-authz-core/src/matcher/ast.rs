// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
	Not,
	Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Or,
	And,
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	Add,
	Sub,
	Mul,
	Div,
	Mod,
}

impl BinaryOp {
	pub fn symbol(self) -> &'static str {
		match self {
			BinaryOp::Or => "||",
			BinaryOp::And => "&&",
			BinaryOp::Eq => "==",
			BinaryOp::Ne => "!=",
			BinaryOp::Lt => "<",
			BinaryOp::Le => "<=",
			BinaryOp::Gt => ">",
			BinaryOp::Ge => ">=",
			BinaryOp::Add => "+",
			BinaryOp::Sub => "-",
			BinaryOp::Mul => "*",
			BinaryOp::Div => "/",
			BinaryOp::Mod => "%",
		}
	}

	pub fn is_logical(self) -> bool {
		matches!(self, BinaryOp::Or | BinaryOp::And)
	}

	pub fn is_comparison(self) -> bool {
		matches!(
			self,
			BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
		)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
	Bool(bool),
	Number(f64),
	Str(String),
}

/// Parsed matcher expression, before identifiers and functions are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Literal(Literal),
	/// Dotted identifier such as `r.sub` or `p2.obj`.
	Ident(Vec<String>),
	Call {
		name: String,
		args: Vec<Expr>,
	},
	Unary {
		op: UnaryOp,
		operand: Box<Expr>,
	},
	Binary {
		op: BinaryOp,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	In {
		needle: Box<Expr>,
		list: Vec<Expr>,
	},
}

impl Expr {
	pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
		Expr::Binary {
			op,
			left: Box::new(left),
			right: Box::new(right),
		}
	}

	pub fn unary(op: UnaryOp, operand: Expr) -> Self {
		Expr::Unary {
			op,
			operand: Box::new(operand),
		}
	}
}
