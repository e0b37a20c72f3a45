// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Combines per-row matcher outcomes into one decision.
//!
//! Outcomes are pulled lazily, so the caller only evaluates the matcher for
//! rows the effector still needs. Once a decision is fixed the remaining rows
//! are never evaluated, which also means the returned explanation holds the
//! rows that decided the outcome, not every row that would have matched.

use tracing::warn;

use crate::error::{AuthzError, Result};

/// Decision rule selected by the model's effect expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
	/// `some(where (p.eft == allow))`
	AllowOverride,
	/// `!some(where (p.eft == deny))`
	DenyOverride,
	/// `some(where (p.eft == allow)) && !some(where (p.eft == deny))`
	AllowAndDeny,
	/// `priority(p.eft) || deny`
	///
	/// The first matching row decides. Callers feed rows sorted by their
	/// `priority` field, lowest first; ties keep stored order.
	Priority,
	/// `count(where (p.eft == allow)) >= N`
	Threshold(usize),
}

/// Effect tag carried by a policy row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEffect {
	Allow,
	Deny,
	/// Neither `allow` nor `deny`; such rows never count as a match.
	Indeterminate,
}

impl RowEffect {
	pub fn parse(tag: &str) -> Self {
		match tag {
			"allow" => RowEffect::Allow,
			"deny" => RowEffect::Deny,
			_ => RowEffect::Indeterminate,
		}
	}
}

/// What evaluating the matcher against one row produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOutcome {
	pub matched: bool,
	pub effect: RowEffect,
}

impl RowOutcome {
	pub fn allow(matched: bool) -> Self {
		Self {
			matched,
			effect: RowEffect::Allow,
		}
	}

	pub fn deny(matched: bool) -> Self {
		Self {
			matched,
			effect: RowEffect::Deny,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effector {
	kind: EffectKind,
	expression: String,
}

impl Effector {
	/// Recognises an effect expression. Whitespace is not significant.
	pub fn parse(expression: &str) -> Result<Self> {
		let normalized: String = expression.chars().filter(|c| !c.is_whitespace()).collect();

		let kind = match normalized.as_str() {
			"some(where(p.eft==allow))" => EffectKind::AllowOverride,
			"!some(where(p.eft==deny))" => EffectKind::DenyOverride,
			"some(where(p.eft==allow))&&!some(where(p.eft==deny))" => EffectKind::AllowAndDeny,
			"priority(p.eft)||deny" => EffectKind::Priority,
			other => match other
				.strip_prefix("count(where(p.eft==allow))>=")
				.and_then(|n| n.parse::<usize>().ok())
			{
				Some(threshold) => EffectKind::Threshold(threshold),
				None => {
					return Err(AuthzError::model_config(format!(
						"unsupported policy effect `{expression}`"
					)));
				}
			},
		};

		Ok(Self {
			kind,
			expression: expression.to_string(),
		})
	}

	pub fn kind(&self) -> EffectKind {
		self.kind
	}

	pub fn expression(&self) -> &str {
		&self.expression
	}

	/// Consumes outcomes until the decision is fixed.
	///
	/// Returns the decision and the indices of the rows that produced it. The
	/// first evaluation error aborts the combination.
	pub fn combine<I, E>(&self, outcomes: I) -> std::result::Result<(bool, Vec<usize>), E>
	where
		I: IntoIterator<Item = std::result::Result<RowOutcome, E>>,
	{
		let rows = outcomes
			.into_iter()
			.enumerate()
			.map(|(index, outcome)| outcome.map(|outcome| (index, outcome)));

		match self.kind {
			EffectKind::AllowOverride => {
				for row in rows {
					let (index, outcome) = row?;
					if counted(index, &outcome) == Some(RowEffect::Allow) {
						return Ok((true, vec![index]));
					}
				}
				Ok((false, Vec::new()))
			}
			EffectKind::DenyOverride => {
				for row in rows {
					let (index, outcome) = row?;
					if counted(index, &outcome) == Some(RowEffect::Deny) {
						return Ok((false, vec![index]));
					}
				}
				Ok((true, Vec::new()))
			}
			EffectKind::AllowAndDeny => {
				let mut first_allow = None;
				for row in rows {
					let (index, outcome) = row?;
					match counted(index, &outcome) {
						Some(RowEffect::Deny) => return Ok((false, vec![index])),
						Some(RowEffect::Allow) if first_allow.is_none() => first_allow = Some(index),
						_ => {}
					}
				}
				Ok((first_allow.is_some(), first_allow.into_iter().collect()))
			}
			EffectKind::Priority => {
				// Rows arrive in priority order, so the first counted row decides.
				for row in rows {
					let (index, outcome) = row?;
					if let Some(effect) = counted(index, &outcome) {
						return Ok((effect == RowEffect::Allow, vec![index]));
					}
				}
				Ok((false, Vec::new()))
			}
			EffectKind::Threshold(threshold) => {
				if threshold == 0 {
					return Ok((true, Vec::new()));
				}
				let mut allowed = Vec::new();
				for row in rows {
					let (index, outcome) = row?;
					if counted(index, &outcome) == Some(RowEffect::Allow) {
						allowed.push(index);
						if allowed.len() >= threshold {
							return Ok((true, allowed));
						}
					}
				}
				Ok((false, allowed))
			}
		}
	}
}

/// Effect of a matched row, or `None` when the row does not count.
fn counted(index: usize, outcome: &RowOutcome) -> Option<RowEffect> {
	if !outcome.matched {
		return None;
	}
	match outcome.effect {
		RowEffect::Indeterminate => {
			warn!(row = index, "matched policy row has no allow/deny effect; ignoring it");
			None
		}
		effect => Some(effect),
	}
}
