//! Splits a (union) target into [`TargetStep`]s and compresses nested ones.

use crate::{
	dom::{Dom, NodeId},
	error::SelectorError,
	selector::split_top_level,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
	/// Replace the old element.
	Swap,
	/// Keep the old element, replace its children (`:content`).
	Content,
	/// Insert the new children before the old element's existing children.
	Before,
	/// Insert the new children after the old element's existing children.
	After,
}

impl Placement {
	/// Whether the old element's whole subtree goes away.
	#[must_use]
	pub fn replaces_subtree(self) -> bool {
		matches!(self, Self::Swap | Self::Content)
	}
}

/// One atomic update instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStep {
	/// The selector with all placement and optionality suffixes stripped.
	pub selector: String,
	pub placement: Placement,
	/// A missing optional step is dropped instead of failing the render.
	pub maybe: bool,
	pub old_element: Option<NodeId>,
	pub new_element: Option<NodeId>,
}

impl TargetStep {
	pub fn new(selector: impl Into<String>, placement: Placement, maybe: bool) -> Self {
		Self { selector: selector.into(), placement, maybe, old_element: None, new_element: None }
	}
}

const SUFFIXES: &[(&str, Suffix)] = &[
	(":maybe", Suffix::Maybe),
	("::before", Suffix::Placement(Placement::Before)),
	(":before", Suffix::Placement(Placement::Before)),
	("::after", Suffix::Placement(Placement::After)),
	(":after", Suffix::Placement(Placement::After)),
	(":content", Suffix::Placement(Placement::Content)),
];

#[derive(Debug, Clone, Copy)]
enum Suffix {
	Maybe,
	Placement(Placement),
}

/// Parses `target` into steps, in order.
///
/// Splits on top-level commas only. `:none` atoms are dropped.
///
/// # Errors
///
/// Iff `target` is unbalanced or an atom consists only of suffixes.
pub fn parse_steps(target: &str) -> Result<Vec<TargetStep>, SelectorError> {
	let mut steps = Vec::new();
	for atom in split_top_level(target, ',')? {
		let atom = atom.trim();
		if atom.is_empty() {
			continue;
		}
		let step = parse_atom(atom)?;
		if step.selector == ":none" {
			continue;
		}
		steps.push(step);
	}
	Ok(steps)
}

fn parse_atom(atom: &str) -> Result<TargetStep, SelectorError> {
	let mut selector = atom;
	let mut placement = Placement::Swap;
	let mut maybe = false;
	'strip: loop {
		for &(suffix, kind) in SUFFIXES {
			if let Some(stripped) = selector.strip_suffix(suffix) {
				selector = stripped.trim_end();
				match kind {
					Suffix::Maybe => maybe = true,
					Suffix::Placement(p) => placement = p,
				}
				continue 'strip;
			}
		}
		break;
	}
	if selector.is_empty() {
		return Err(SelectorError::Unsupported(atom.to_owned()));
	}
	Ok(TargetStep::new(selector, placement, maybe))
}

/// Drops steps whose old element is the same as, or inside, an earlier kept step's old element.
///
/// Only steps that replace their whole old subtree absorb others. Of two steps for the exact same
/// element, the first wins. Steps without a resolved old element are kept as-is.
#[must_use]
pub fn compress(dom: &Dom, steps: Vec<TargetStep>) -> Vec<TargetStep> {
	let mut compressed: Vec<TargetStep> = Vec::with_capacity(steps.len());
	for step in steps {
		let Some(old) = step.old_element else {
			compressed.push(step);
			continue;
		};
		if let Some(kept) = compressed.iter().find(|kept| kept.old_element == Some(old)) {
			debug!("Step {:?} targets the same element as {:?}. Dropping it.", step.selector, kept.selector);
			continue;
		}
		if let Some(kept) = compressed
			.iter()
			.find(|kept| kept.placement.replaces_subtree() && kept.old_element.map_or(false, |k| dom.is_ancestor_or_self(k, old)))
		{
			debug!("Step {:?} is contained in {:?}. Dropping it.", step.selector, kept.selector);
			continue;
		}
		if step.placement.replaces_subtree() {
			compressed.retain(|kept| {
				let contained = kept.old_element.map_or(false, |k| dom.is_ancestor_or_self(old, k));
				if contained {
					debug!("Step {:?} is contained in {:?}. Dropping it.", kept.selector, step.selector);
				}
				!contained
			});
		}
		compressed.push(step);
	}
	compressed
}
