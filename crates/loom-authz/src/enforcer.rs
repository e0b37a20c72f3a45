// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Enforcement orchestration.
//!
//! The compiled model, function registry and role graphs live in one
//! immutable [`EngineState`] behind a [`Snapshot`]. Model reloads, function
//! registration and role-link rebuilds build a new state next to the current
//! one and swap it in, so concurrent `enforce` calls never see a partial
//! rebuild. Policy rows stay in the store and are read under its read lock
//! for the duration of one call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loom_authz_core::{
	AuthzError, CompiledMatcher, Effector, Function, FunctionRegistry, Model, Result, RoleGraphs,
	RoleLinks, RowEffect, RowOutcome, Scope, SectionBinding, Snapshot, DEFAULT_MAX_HIERARCHY_LEVEL,
	EFFECT_FIELD, PRIORITY_FIELD,
};
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument};

use crate::config::EnforcerConfig;
use crate::decision::{Decision, EnforceContext};
use crate::store::{MemoryPolicyStore, PolicyStore};

/// One matcher with everything needed to run it.
#[derive(Debug)]
pub(crate) struct CompiledSection {
	pub(crate) binding: SectionBinding,
	pub(crate) matcher: CompiledMatcher,
	pub(crate) effector: Effector,
	effect_index: Option<usize>,
}

impl CompiledSection {
	fn outcome<T: AsRef<str>>(
		&self,
		request: &[T],
		row: &[String],
		links: &dyn RoleLinks,
	) -> Result<RowOutcome> {
		let matched = self.matcher.evaluate(request, row, links)?;
		let effect = match self.effect_index {
			Some(index) => RowEffect::parse(row.get(index).map(String::as_str).unwrap_or_default()),
			None => RowEffect::Allow,
		};
		Ok(RowOutcome { matched, effect })
	}
}

/// Everything an enforcement call reads apart from the policy rows.
#[derive(Debug, Clone)]
pub(crate) struct EngineState {
	pub(crate) model: Arc<Model>,
	pub(crate) functions: FunctionRegistry,
	pub(crate) sections: Arc<BTreeMap<String, CompiledSection>>,
	pub(crate) roles: Arc<RoleGraphs>,
}

impl EngineState {
	fn build<S: PolicyStore + ?Sized>(
		model: Arc<Model>,
		functions: FunctionRegistry,
		store: &S,
		max_hierarchy_level: usize,
	) -> Result<Self> {
		check_policy_rows(&model, store)?;
		let mut sections = BTreeMap::new();
		for (key, expression) in &model.matchers {
			sections.insert(key.clone(), compile_section(&model, &functions, key, expression)?);
		}
		let roles = build_role_graphs(&model, &functions, store, max_hierarchy_level)?;

		debug!(
			matchers = sections.len(),
			relations = model.roles.len(),
			"compiled model"
		);

		Ok(Self {
			model,
			functions,
			sections: Arc::new(sections),
			roles: Arc::new(roles),
		})
	}

	fn with_roles(&self, roles: RoleGraphs) -> Self {
		Self {
			roles: Arc::new(roles),
			..self.clone()
		}
	}
}

fn compile_section(
	model: &Model,
	functions: &FunctionRegistry,
	key: &str,
	expression: &str,
) -> Result<CompiledSection> {
	let binding = model.binding(key)?;
	let request_fields = model.request_fields(&binding.request).unwrap_or_default();
	let policy_fields = model.policy_fields(&binding.policy).unwrap_or_default();
	let scope = Scope {
		request_key: &binding.request,
		request_fields,
		policy_key: &binding.policy,
		policy_fields,
		roles: &model.roles,
		functions,
	};
	let matcher = CompiledMatcher::compile(expression, &scope)?;

	let effect = model.effects.get(&binding.effect).ok_or_else(|| {
		AuthzError::model_config(format!("policy effect `{}` is not defined", binding.effect))
	})?;
	let effector = Effector::parse(effect)?;

	Ok(CompiledSection {
		effect_index: model.policy_field_index(&binding.policy, EFFECT_FIELD),
		binding,
		matcher,
		effector,
	})
}

fn build_role_graphs<S: PolicyStore + ?Sized>(
	model: &Model,
	functions: &FunctionRegistry,
	store: &S,
	max_hierarchy_level: usize,
) -> Result<RoleGraphs> {
	let rules: BTreeMap<String, Vec<Vec<String>>> = model
		.roles
		.keys()
		.map(|relation| (relation.clone(), store.rules(relation).to_vec()))
		.collect();
	RoleGraphs::build(&model.roles, &rules, functions, max_hierarchy_level)
}

/// Every stored policy row must have as many columns as its definition.
fn check_policy_rows<S: PolicyStore + ?Sized>(model: &Model, store: &S) -> Result<()> {
	for (key, fields) in &model.policies {
		if let Some(rule) = store.rules(key).iter().find(|rule| rule.len() != fields.len()) {
			return Err(AuthzError::Arity {
				section: key.clone(),
				expected: fields.len(),
				actual: rule.len(),
			});
		}
	}
	Ok(())
}

/// Sorts every policy section that carries a priority field.
fn sort_priority_sections<S: PolicyStore + ?Sized>(model: &Model, store: &mut S) {
	for key in model.policies.keys() {
		if let Some(index) = model.policy_field_index(key, PRIORITY_FIELD) {
			store.sort_by_priority(key, index);
		}
	}
}

/// Authorization enforcer over a policy store.
///
/// Safe to share across threads; every method takes `&self`.
pub struct Enforcer<S: PolicyStore = MemoryPolicyStore> {
	pub(crate) state: Snapshot<EngineState>,
	pub(crate) store: RwLock<S>,
	enabled: AtomicBool,
	pub(crate) auto_build_role_links: AtomicBool,
	log_decisions: AtomicBool,
	max_hierarchy_level: usize,
}

impl<S: PolicyStore> fmt::Debug for Enforcer<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Enforcer")
			.field("enabled", &self.is_enabled())
			.field("max_hierarchy_level", &self.max_hierarchy_level)
			.finish_non_exhaustive()
	}
}

impl Enforcer<MemoryPolicyStore> {
	/// Enforcer with an empty in-memory store and default settings.
	pub fn new(model: Model) -> Result<Self> {
		Self::builder(model).build()
	}

	pub fn builder(model: Model) -> EnforcerBuilder<MemoryPolicyStore> {
		EnforcerBuilder::new(model)
	}
}

impl<S: PolicyStore> Enforcer<S> {
	/// Checks `request` against the default `m` matcher.
	pub fn enforce<T: AsRef<str>>(&self, request: &[T]) -> Result<bool> {
		self.enforce_ex_with_context(&EnforceContext::default(), request)
			.map(|decision| decision.allowed)
	}

	/// Like [`Enforcer::enforce`], also returning the deciding rows.
	pub fn enforce_ex<T: AsRef<str>>(&self, request: &[T]) -> Result<Decision> {
		self.enforce_ex_with_context(&EnforceContext::default(), request)
	}

	pub fn enforce_with_context<T: AsRef<str>>(
		&self,
		context: &EnforceContext,
		request: &[T],
	) -> Result<bool> {
		self.enforce_ex_with_context(context, request)
			.map(|decision| decision.allowed)
	}

	#[instrument(level = "debug", skip(self, request), fields(matcher = %context.matcher))]
	pub fn enforce_ex_with_context<T: AsRef<str>>(
		&self,
		context: &EnforceContext,
		request: &[T],
	) -> Result<Decision> {
		if !self.enabled.load(Ordering::Acquire) {
			return Ok(Decision::allow());
		}

		// Store before state; `load_model` swaps state under the store write lock.
		let store = self.store.read();
		let state = self.state.load();
		let section = state.sections.get(&context.matcher).ok_or_else(|| {
			AuthzError::model_config(format!(
				"matcher section `{}` is not defined",
				context.matcher
			))
		})?;
		if request.len() != section.matcher.request_arity() {
			return Err(AuthzError::Arity {
				section: section.binding.request.clone(),
				expected: section.matcher.request_arity(),
				actual: request.len(),
			});
		}

		let rows = store.rules(&section.binding.policy);
		let links: &dyn RoleLinks = &*state.roles;
		let (allowed, indices) = section
			.effector
			.combine(rows.iter().map(|row| section.outcome(request, row, links)))?;
		let explain: Vec<Vec<String>> = indices
			.into_iter()
			.filter_map(|index| rows.get(index).cloned())
			.collect();

		if self.log_decisions.load(Ordering::Relaxed) {
			let request: Vec<&str> = request.iter().map(|value| value.as_ref()).collect();
			info!(
				matcher = %context.matcher,
				request = ?request,
				allowed,
				explain = ?explain,
				"authorization decision"
			);
		}

		Ok(Decision { allowed, explain })
	}

	/// Rebuilds every role graph from the stored grouping rules.
	pub fn build_role_links(&self) -> Result<()> {
		self.state.update(|state| {
			let store = self.store.read();
			let roles = build_role_graphs(
				&state.model,
				&state.functions,
				&*store,
				self.max_hierarchy_level,
			)?;
			Ok::<_, AuthzError>(state.with_roles(roles))
		})?;
		Ok(())
	}

	/// Replaces the model, recompiling every matcher and rebuilding role graphs.
	///
	/// On error the previous model stays in effect.
	pub fn load_model(&self, model: Model) -> Result<()> {
		model.validate()?;
		self.state.update_with(
			|state| {
				let store = self.store.read();
				EngineState::build(
					Arc::new(model),
					state.functions.clone(),
					&*store,
					self.max_hierarchy_level,
				)
			},
			|next| {
				let mut store = self.store.write();
				sort_priority_sections(&next.model, &mut *store);
				store
			},
		)?;
		info!("authorization model loaded");
		Ok(())
	}

	/// Registers a matcher function and recompiles the model with it.
	pub fn add_function(&self, name: impl Into<String>, function: Function) -> Result<()> {
		let name = name.into();
		self.state.update(|state| {
			let mut functions = state.functions.clone();
			functions.register(name.clone(), function);
			let store = self.store.read();
			EngineState::build(
				Arc::clone(&state.model),
				functions,
				&*store,
				self.max_hierarchy_level,
			)
		})?;
		debug!(function = %name, "registered matcher function");
		Ok(())
	}

	pub fn enable_enforce(&self, enabled: bool) {
		self.enabled.store(enabled, Ordering::Release);
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled.load(Ordering::Acquire)
	}

	pub fn enable_auto_build_role_links(&self, enabled: bool) {
		self.auto_build_role_links.store(enabled, Ordering::Release);
	}

	pub fn enable_log_decisions(&self, enabled: bool) {
		self.log_decisions.store(enabled, Ordering::Relaxed);
	}

	/// The model currently in effect.
	pub fn model(&self) -> Arc<Model> {
		Arc::clone(&self.state.load().model)
	}

	/// Read access to the policy store.
	pub fn store(&self) -> RwLockReadGuard<'_, S> {
		self.store.read()
	}

	pub fn max_hierarchy_level(&self) -> usize {
		self.max_hierarchy_level
	}
}

pub struct EnforcerBuilder<S = MemoryPolicyStore> {
	model: Model,
	store: S,
	functions: FunctionRegistry,
	enabled: bool,
	auto_build_role_links: bool,
	log_decisions: bool,
	max_hierarchy_level: usize,
}

impl EnforcerBuilder<MemoryPolicyStore> {
	pub fn new(model: Model) -> Self {
		Self {
			model,
			store: MemoryPolicyStore::new(),
			functions: FunctionRegistry::new(),
			enabled: true,
			auto_build_role_links: true,
			log_decisions: false,
			max_hierarchy_level: DEFAULT_MAX_HIERARCHY_LEVEL,
		}
	}
}

impl<S: PolicyStore> EnforcerBuilder<S> {
	/// Uses `store` as the initial policy.
	pub fn with_store<T: PolicyStore>(self, store: T) -> EnforcerBuilder<T> {
		EnforcerBuilder {
			model: self.model,
			store,
			functions: self.functions,
			enabled: self.enabled,
			auto_build_role_links: self.auto_build_role_links,
			log_decisions: self.log_decisions,
			max_hierarchy_level: self.max_hierarchy_level,
		}
	}

	pub fn with_function(mut self, name: impl Into<String>, function: Function) -> Self {
		self.functions.register(name, function);
		self
	}

	pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
		self.functions = functions;
		self
	}

	pub fn with_max_hierarchy_level(mut self, level: usize) -> Self {
		self.max_hierarchy_level = level;
		self
	}

	pub fn with_config(mut self, config: &EnforcerConfig) -> Self {
		self.enabled = config.enabled;
		self.auto_build_role_links = config.auto_build_role_links;
		self.log_decisions = config.log_decisions;
		self.max_hierarchy_level = config.max_hierarchy_level as usize;
		self
	}

	/// Validates and compiles the model and builds the initial role graphs.
	pub fn build(self) -> Result<Enforcer<S>> {
		let EnforcerBuilder {
			model,
			mut store,
			functions,
			enabled,
			auto_build_role_links,
			log_decisions,
			max_hierarchy_level,
		} = self;

		model.validate()?;
		sort_priority_sections(&model, &mut store);
		let state = EngineState::build(Arc::new(model), functions, &store, max_hierarchy_level)?;

		Ok(Enforcer {
			state: Snapshot::new(state),
			store: RwLock::new(store),
			enabled: AtomicBool::new(enabled),
			auto_build_role_links: AtomicBool::new(auto_build_role_links),
			log_decisions: AtomicBool::new(log_decisions),
			max_hierarchy_level,
		})
	}
}
