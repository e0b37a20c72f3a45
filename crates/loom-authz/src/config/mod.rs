// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the enforcer.
//!
//! Sources are merged in precedence order:
//! 1. Environment variables (`LOOM_AUTHZ_*`)
//! 2. Config file (`/etc/loom/authz.toml`)
//! 3. Built-in defaults
//!
//! ```toml
//! [enforcer]
//! enabled = true
//! auto_build_role_links = true
//! max_hierarchy_level = 10
//! log_decisions = false
//!
//! [model]
//! path = "/etc/loom/model.toml"
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

use std::path::{Path, PathBuf};

pub use error::ConfigError;
pub use layer::AuthzConfigLayer;
pub use sections::{EnforcerConfig, EnforcerConfigLayer, ModelConfig, ModelConfigLayer};
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use loom_authz_core::Model;
use tracing::{debug, info};

use crate::enforcer::Enforcer;

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthzConfig {
	pub enforcer: EnforcerConfig,
	pub model: ModelConfig,
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<AuthzConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<AuthzConfig, ConfigError> {
	let mut merged = AuthzConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<AuthzConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<AuthzConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuthzConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub(crate) fn finalize(layer: AuthzConfigLayer) -> Result<AuthzConfig, ConfigError> {
	let enforcer = layer.enforcer.unwrap_or_default().finalize();
	let model = layer.model.unwrap_or_default().finalize();

	validate_config(&enforcer)?;

	info!(
		enabled = enforcer.enabled,
		auto_build_role_links = enforcer.auto_build_role_links,
		max_hierarchy_level = enforcer.max_hierarchy_level,
		log_decisions = enforcer.log_decisions,
		model_path = ?model.path,
		"Authorization configuration loaded"
	);

	Ok(AuthzConfig { enforcer, model })
}

fn validate_config(enforcer: &EnforcerConfig) -> Result<(), ConfigError> {
	if enforcer.max_hierarchy_level == 0 {
		return Err(ConfigError::Validation(
			"max_hierarchy_level must be at least 1".to_string(),
		));
	}
	Ok(())
}

/// Reads and validates a model stored in TOML form.
pub fn load_model_file(path: impl AsRef<Path>) -> Result<Model, ConfigError> {
	let path = path.as_ref();
	debug!(path = %path.display(), "loading model file");

	let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
		path: path.to_path_buf(),
		source: e,
	})?;
	let model: Model = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
		path: path.to_path_buf(),
		source: e,
	})?;
	model.validate()?;

	Ok(model)
}

/// Builds an in-memory enforcer from a resolved configuration.
///
/// Requires `model.path` to be set.
pub fn load_enforcer(config: &AuthzConfig) -> Result<Enforcer, ConfigError> {
	let path = config.model.path.as_ref().ok_or_else(|| {
		ConfigError::Validation("model.path (LOOM_AUTHZ_MODEL_PATH) is not set".to_string())
	})?;
	let model = load_model_file(path)?;
	Ok(Enforcer::builder(model)
		.with_config(&config.enforcer)
		.build()?)
}
