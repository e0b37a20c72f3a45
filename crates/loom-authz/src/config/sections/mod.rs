// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod enforcer;
mod model;

pub use enforcer::{EnforcerConfig, EnforcerConfigLayer};
pub use model::{ModelConfig, ModelConfigLayer};
