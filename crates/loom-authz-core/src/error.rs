// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the authorization core.

use thiserror::Error;

/// Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

/// Errors raised while loading a model, compiling a matcher, or enforcing.
#[derive(Debug, Error)]
pub enum AuthzError {
	/// The model is missing a section, declares a malformed one, or the matcher
	/// references something the model does not declare.
	#[error("model configuration error: {0}")]
	ModelConfig(String),

	/// A matcher or effect expression could not be parsed.
	#[error("syntax error at offset {offset} in `{expression}`: {message}")]
	Syntax {
		expression: String,
		offset: usize,
		message: String,
	},

	#[error("evaluation error: {0}")]
	Eval(#[from] EvalError),

	#[error("expected {expected} values for `{section}`, got {actual}")]
	Arity {
		section: String,
		expected: usize,
		actual: usize,
	},
}

impl AuthzError {
	pub fn model_config(message: impl Into<String>) -> Self {
		AuthzError::ModelConfig(message.into())
	}
}

/// Errors raised while evaluating a compiled matcher against one policy row.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
	#[error("field `{0}` is not bound for this row")]
	Unbound(String),

	#[error("type mismatch: {0}")]
	TypeMismatch(String),

	#[error("function `{name}` failed: {source}")]
	Function {
		name: String,
		#[source]
		source: FunctionError,
	},
}

/// Errors returned by registered matcher functions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FunctionError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("expected {expected} arguments, got {actual}")]
	Arity { expected: usize, actual: usize },

	#[error("invalid pattern `{pattern}`: {message}")]
	InvalidPattern { pattern: String, message: String },
}
