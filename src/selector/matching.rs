use super::{AttributeCondition, AttributeOperator, Combinator, Compound, Part, PseudoClass, Relative};
use crate::dom::{Dom, NodeId, NodeKind};

/// Matches right-to-left with backtracking over descendant and sibling combinators.
///
/// With an `anchor`, the leftmost compound must additionally stand in the anchor's relation
/// (used by `:has()`).
pub(super) fn matches_complex(dom: &Dom, node: NodeId, parts: &[Part], anchor: Option<(NodeId, Combinator)>) -> bool {
	let Some((last, rest)) = parts.split_last() else {
		return false;
	};
	if !matches_compound(dom, node, &last.compound) {
		return false;
	}
	if rest.is_empty() {
		return anchor.map_or(true, |(anchor, combinator)| related(dom, anchor, node, combinator));
	}

	match last.combinator.unwrap_or(Combinator::Descendant) {
		Combinator::Child => dom.parent(node).map_or(false, |parent| matches_complex(dom, parent, rest, anchor)),
		Combinator::Descendant => dom.ancestors(node).any(|ancestor| matches_complex(dom, ancestor, rest, anchor)),
		Combinator::NextSibling => dom.previous_element_sibling(node).map_or(false, |sibling| matches_complex(dom, sibling, rest, anchor)),
		Combinator::SubsequentSibling => {
			core::iter::successors(dom.previous_element_sibling(node), |&s| dom.previous_element_sibling(s)).any(|sibling| matches_complex(dom, sibling, rest, anchor))
		}
	}
}

/// Whether `node` stands in `combinator` relation to `anchor` (`anchor <combinator> node`).
fn related(dom: &Dom, anchor: NodeId, node: NodeId, combinator: Combinator) -> bool {
	match combinator {
		Combinator::Child => dom.parent(node) == Some(anchor),
		Combinator::Descendant => node != anchor && dom.is_ancestor_or_self(anchor, node),
		Combinator::NextSibling => dom.previous_element_sibling(node) == Some(anchor),
		Combinator::SubsequentSibling => core::iter::successors(dom.previous_element_sibling(node), |&s| dom.previous_element_sibling(s)).any(|s| s == anchor),
	}
}

fn matches_compound(dom: &Dom, node: NodeId, compound: &Compound) -> bool {
	let Some(element) = dom.element(node) else {
		return false;
	};

	if let Some(tag) = &compound.tag {
		if element.name() != tag {
			return false;
		}
	}
	if let Some(id) = &compound.id {
		if element.attribute("id") != Some(id.as_str()) {
			return false;
		}
	}
	if !compound.classes.iter().all(|class| element.has_class(class)) {
		return false;
	}
	if !compound.attributes.iter().all(|condition| matches_attribute(element.attribute(&condition.name), condition)) {
		return false;
	}
	compound.pseudo_classes.iter().all(|pseudo_class| matches_pseudo_class(dom, node, pseudo_class))
}

fn matches_attribute(actual: Option<&str>, condition: &AttributeCondition) -> bool {
	let Some(actual) = actual else {
		return false;
	};
	let Some((operator, expected)) = &condition.operator else {
		return true;
	};
	let (actual, expected) = if condition.ignore_case {
		(actual.to_lowercase(), expected.to_lowercase())
	} else {
		(actual.to_owned(), expected.clone())
	};
	match operator {
		AttributeOperator::Equals => actual == expected,
		AttributeOperator::Includes => !expected.is_empty() && actual.split_ascii_whitespace().any(|token| token == expected),
		AttributeOperator::DashMatch => actual == expected || actual.starts_with(&format!("{}-", expected)),
		AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
		AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
		AttributeOperator::Substring => !expected.is_empty() && actual.contains(&expected),
	}
}

fn matches_pseudo_class(dom: &Dom, node: NodeId, pseudo_class: &PseudoClass) -> bool {
	let siblings = || dom.parent(node).map(|parent| dom.element_children(parent)).unwrap_or_default();
	match pseudo_class {
		PseudoClass::FirstChild => siblings().first() == Some(&node),
		PseudoClass::LastChild => siblings().last() == Some(&node),
		PseudoClass::OnlyChild => siblings() == [node],
		PseudoClass::Empty => dom.children(node).iter().all(|&child| match dom.kind(child) {
			NodeKind::Comment(_) => true,
			NodeKind::Text(text) => text.is_empty(),
			_ => false,
		}),
		PseudoClass::Checked => dom.has_attribute(node, "checked") || dom.has_attribute(node, "selected"),
		PseudoClass::Disabled => dom.has_attribute(node, "disabled"),
		PseudoClass::NthChild { a, b } => {
			let Some(position) = siblings().iter().position(|&s| s == node) else {
				return false;
			};
			#[allow(clippy::cast_possible_wrap)]
			let position = position as i64 + 1;
			if *a == 0 {
				position == *b
			} else {
				let n = (position - b) / a;
				(position - b) % a == 0 && n >= 0
			}
		}
		PseudoClass::Not(selector) => !selector.matches(dom, node),
		PseudoClass::Is(selector) => selector.matches(dom, node),
		PseudoClass::Has(relatives) => relatives.iter().any(|relative| has_relative(dom, node, relative)),
	}
}

fn has_relative(dom: &Dom, anchor: NodeId, relative: &Relative) -> bool {
	let candidates: Vec<NodeId> = match relative.combinator {
		Combinator::Child | Combinator::Descendant => dom.descendants(anchor).collect(),
		Combinator::NextSibling | Combinator::SubsequentSibling => {
			let Some(parent) = dom.parent(anchor) else {
				return false;
			};
			let following = dom.children(parent).iter().skip_while(|&&c| c != anchor).skip(1).copied().collect::<Vec<_>>();
			following.iter().flat_map(|&sibling| dom.subtree_elements(sibling)).collect()
		}
	};
	candidates.into_iter().any(|candidate| matches_complex(dom, candidate, &relative.complex.parts, Some((anchor, relative.combinator))))
}
