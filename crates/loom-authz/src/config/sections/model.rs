// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Model file location.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelConfigLayer {
	pub path: Option<PathBuf>,
}

impl ModelConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.path.is_some() {
			self.path = other.path;
		}
	}

	pub fn finalize(self) -> ModelConfig {
		ModelConfig { path: self.path }
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
	/// TOML model file; hosts that build the model in code leave this unset.
	pub path: Option<PathBuf>,
}
