//! The fallback chain: The primary target first, then alternatives, checked at up to three points
//! of a render.
//!
//! A union target only counts as matched if every non-optional atom matches.

use crate::{
	config::Fallback,
	error::RenderError,
	resolve::{Resolver, Scope},
	steps::{parse_steps, TargetStep},
};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
	/// Against the current page, before a request is made.
	BeforeRequest,
	/// Against the current page again, once the response has arrived.
	AfterRequest,
	/// Against the new content.
	InResponse,
}

/// The candidate targets of one render call, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
	candidates: Vec<String>,
}

/// A candidate that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
	pub target: String,
	pub steps: Vec<TargetStep>,
	/// Whether a fallback was needed.
	pub fell_back: bool,
}

impl FallbackChain {
	/// `main_targets` is only consulted for [`Fallback::MainTargets`].
	#[must_use]
	pub fn new(primary: &str, fallback: &Fallback, main_targets: &[String]) -> Self {
		let mut candidates = vec![primary.to_owned()];
		let alternatives: &[String] = match fallback {
			Fallback::Disabled => &[],
			Fallback::MainTargets => main_targets,
			Fallback::Targets(targets) => targets,
		};
		for alternative in alternatives {
			if !candidates.contains(alternative) {
				candidates.push(alternative.clone());
			}
		}
		Self { candidates }
	}

	#[must_use]
	pub fn candidates(&self) -> &[String] {
		&self.candidates
	}

	#[must_use]
	pub fn primary(&self) -> &str {
		&self.candidates[0]
	}

	/// Returns the first candidate for which `check` yields steps.
	///
	/// # Errors
	///
	/// Errors from `check`, or [`RenderError::CannotMatch`] for the primary target if no candidate
	/// matched.
	pub fn resolve(&self, checkpoint: Checkpoint, mut check: impl FnMut(&str) -> Result<Option<Vec<TargetStep>>, RenderError>) -> Result<Resolved, RenderError> {
		for (index, candidate) in self.candidates.iter().enumerate() {
			if let Some(steps) = check(candidate)? {
				if index > 0 {
					debug!(?checkpoint, primary = %self.primary(), fallback = %candidate, "Falling back.");
				}
				return Ok(Resolved { target: candidate.clone(), steps, fell_back: index > 0 });
			}
			trace!(?checkpoint, %candidate, "Candidate did not match.");
		}
		Err(RenderError::cannot_match(self.primary()))
	}
}

/// Parses `target` and resolves every step's old element in the live `scope`.
///
/// `:main` atoms are pinned to the main target that matched. Missing optional steps are dropped.
/// [`None`] iff a non-optional step is missing.
///
/// # Errors
///
/// Iff `target` is malformed.
pub fn match_current(resolver: &Resolver<'_>, scope: &Scope, target: &str) -> Result<Option<Vec<TargetStep>>, RenderError> {
	let mut matched = Vec::new();
	for mut step in parse_steps(target)? {
		match resolver.pin(scope, &step.selector)? {
			Some((old, pinned)) => {
				step.old_element = Some(old);
				step.selector = pinned;
				matched.push(step);
			}
			None if step.maybe => trace!(selector = %step.selector, "Optional step is missing in the current page."),
			None => return Ok(None),
		}
	}
	Ok(Some(matched))
}

/// Re-checks steps that already have old elements against the current page.
///
/// Steps whose old element was detached or is being destroyed are looked up again.
///
/// # Errors
///
/// Iff a step's selector is malformed.
pub fn recheck_current(resolver: &Resolver<'_>, scope: &Scope, steps: &[TargetStep]) -> Result<Option<Vec<TargetStep>>, RenderError> {
	let mut matched = Vec::new();
	for step in steps {
		let still_there = step.old_element.filter(|&old| resolver.dom.is_attached(old) && !resolver.is_destroying(old));
		let old = match still_there {
			Some(old) => Some(old),
			None => resolver.get_in(scope, &step.selector)?,
		};
		match old {
			Some(old) => matched.push(TargetStep { old_element: Some(old), ..step.clone() }),
			None if step.maybe => (),
			None => return Ok(None),
		}
	}
	Ok(Some(matched))
}

/// Finds every step's new element in the detached content at `scope`.
///
/// # Errors
///
/// Iff a step's selector is malformed.
pub fn match_response(resolver: &Resolver<'_>, scope: &Scope, steps: &[TargetStep]) -> Result<Option<Vec<TargetStep>>, RenderError> {
	let mut matched = Vec::new();
	for step in steps {
		match resolver.get_in(scope, &step.selector)? {
			Some(new) => matched.push(TargetStep { new_element: Some(new), ..step.clone() }),
			None if step.maybe => trace!(selector = %step.selector, "Optional step is missing in the new content."),
			None => return Ok(None),
		}
	}
	Ok(Some(matched))
}
