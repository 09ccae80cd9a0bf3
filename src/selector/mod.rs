//! CSS selectors over the arena [`Dom`].
//!
//! Supported: type, universal, `#id`, `.class`, attribute conditions (`=`, `~=`, `|=`, `^=`,
//! `$=`, `*=`, with an optional `i` flag), all four combinators, and the pseudo-classes
//! `:not()`, `:is()`, `:where()`, `:has()`, `:first-child`, `:last-child`, `:only-child`,
//! `:nth-child()`, `:empty`, `:checked` and `:disabled`.
//!
//! The rendering extensions (`:main`, `:layer`, `:origin`, `:maybe`, `:none`, placement suffixes)
//! are not CSS. They are expanded or stripped before a selector reaches this module.

mod matching;
mod parse;

use crate::{
	dom::{Attribute, Dom, NodeId},
	error::SelectorError,
};

pub use parse::{find_top_level, split_top_level};

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
	alternatives: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Complex {
	/// `parts[i].combinator` relates `parts[i - 1]` to `parts[i]`. The first part has none.
	parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Part {
	compound: Compound,
	combinator: Option<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
	Descendant,
	Child,
	NextSibling,
	SubsequentSibling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
	tag: Option<String>,
	universal: bool,
	id: Option<String>,
	classes: Vec<String>,
	attributes: Vec<AttributeCondition>,
	pseudo_classes: Vec<PseudoClass>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributeCondition {
	name: String,
	operator: Option<(AttributeOperator, String)>,
	ignore_case: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeOperator {
	Equals,
	Includes,
	DashMatch,
	Prefix,
	Suffix,
	Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PseudoClass {
	FirstChild,
	LastChild,
	OnlyChild,
	Empty,
	Checked,
	Disabled,
	NthChild { a: i64, b: i64 },
	Not(Selector),
	Is(Selector),
	Has(Vec<Relative>),
}

/// An argument of `:has()`: A complex selector anchored at the subject by a leading combinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relative {
	combinator: Combinator,
	complex: Complex,
}

impl Selector {
	/// # Errors
	///
	/// Iff `selector` is empty, unbalanced or uses unsupported syntax.
	pub fn parse(selector: &str) -> Result<Self, SelectorError> {
		parse::parse_selector_list(selector)
	}

	/// Whether the element `node` matches any alternative of this selector.
	#[must_use]
	pub fn matches(&self, dom: &Dom, node: NodeId) -> bool {
		dom.is_element(node) && self.alternatives.iter().any(|complex| matching::matches_complex(dom, node, &complex.parts, None))
	}

	/// Matching elements strictly below `root`, in document order.
	#[must_use]
	pub fn select(&self, dom: &Dom, root: NodeId) -> Vec<NodeId> {
		dom.descendants(root).filter(|&n| self.matches(dom, n)).collect()
	}

	/// Matching elements of the subtree rooted at `root`, including `root`, in document order.
	#[must_use]
	pub fn select_subtree(&self, dom: &Dom, root: NodeId) -> Vec<NodeId> {
		dom.subtree_elements(root).into_iter().filter(|&n| self.matches(dom, n)).collect()
	}

	/// The closest ancestor-or-self of `node` matching this selector.
	#[must_use]
	pub fn closest(&self, dom: &Dom, node: NodeId) -> Option<NodeId> {
		dom.self_and_ancestors(node).find(|&n| self.matches(dom, n))
	}
}

/// Creates a detached element described by the last compound of `selector`'s first alternative.
///
/// `.a#b[c=d]` becomes `<div class="a" id="b" c="d">`.
///
/// # Errors
///
/// Iff `selector` doesn't parse.
pub fn build_element(dom: &mut Dom, selector: &str) -> Result<NodeId, SelectorError> {
	let parsed = Selector::parse(selector)?;
	let compound = parsed
		.alternatives
		.first()
		.and_then(|complex| complex.parts.last())
		.map(|part| &part.compound)
		.ok_or_else(|| SelectorError::Unsupported(selector.to_owned()))?;

	let mut attributes = Vec::new();
	if let Some(id) = &compound.id {
		attributes.push(Attribute::new("id", id.as_str()));
	}
	if !compound.classes.is_empty() {
		attributes.push(Attribute::new("class", compound.classes.join(" ")));
	}
	for condition in &compound.attributes {
		let value = match &condition.operator {
			Some((AttributeOperator::Equals, value)) => value.clone(),
			_ => String::new(),
		};
		attributes.push(Attribute::new(condition.name.as_str(), value));
	}
	Ok(dom.create_element(compound.tag.as_deref().unwrap_or("div"), attributes))
}
