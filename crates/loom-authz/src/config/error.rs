// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

use loom_authz_core::AuthzError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("failed to read {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("configuration validation failed: {0}")]
	Validation(String),

	#[error("model error: {0}")]
	Model(#[from] AuthzError),
}
