//! Keep negotiation: Which live elements survive a swap in place of their new counterparts.
//!
//! An element opts in with `up-keep`. Its partner in the new content is found through the
//! element's derived target and must carry `up-keep` too.

use crate::{
	deriver::TargetDeriver,
	dom::{Dom, NodeId},
	selector::Selector,
};
use serde_json::Value;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepMode {
	/// `up-keep`: Keep whenever a partner exists.
	Always,
	/// `up-keep="same-html"`: Keep if the normalized outer HTML is unchanged.
	SameHtml,
	/// `up-keep="same-data"`: Keep if the `up-data` JSON values are equal.
	SameData,
}

impl KeepMode {
	/// Reads the keep directive of `element`.
	#[must_use]
	pub fn of(dom: &Dom, element: NodeId) -> Option<Self> {
		match dom.attribute(element, "up-keep")?.trim() {
			"" | "true" => Some(Self::Always),
			"same-html" => Some(Self::SameHtml),
			"same-data" => Some(Self::SameData),
			"false" => None,
			other => {
				warn!("Unknown keep directive {:?} on {:?}. Keeping unconditionally.", other, element);
				Some(Self::Always)
			}
		}
	}
}

/// One negotiated keep: `old` stays live and takes `new`'s place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepPlan {
	pub old: NodeId,
	pub new: NodeId,
	pub mode: KeepMode,
}

/// Negotiates keeps between the live subtree at `old_root` and the new subtree at `new_root`.
///
/// `allow` is asked once per would-be keep and may veto it. Elements inside an already kept
/// element are not considered separately.
pub fn plan_keeps(
	dom: &Dom,
	old_root: NodeId,
	new_root: NodeId,
	deriver: &dyn TargetDeriver,
	volatile_attributes: &[String],
	allow: &mut dyn FnMut(&KeepPlan) -> bool,
) -> Vec<KeepPlan> {
	let mut plans: Vec<KeepPlan> = Vec::new();
	for old in dom.subtree_elements(old_root) {
		if plans.iter().any(|plan| dom.is_ancestor_or_self(plan.old, old)) {
			continue;
		}
		let Some(mode) = KeepMode::of(dom, old) else {
			continue;
		};
		let Some(new) = find_partner(dom, old, new_root, deriver, &plans) else {
			trace!(?old, "No keep partner. The element will be destroyed normally.");
			continue;
		};
		if !equal_by(dom, mode, old, new, volatile_attributes) {
			trace!(?old, ?new, ?mode, "Keep partner differs.");
			continue;
		}
		let plan = KeepPlan { old, new, mode };
		if allow(&plan) {
			debug!(?old, ?new, ?mode, "Keeping element.");
			plans.push(plan);
		} else {
			debug!(?old, "Keep vetoed.");
		}
	}
	plans
}

fn find_partner(dom: &Dom, old: NodeId, new_root: NodeId, deriver: &dyn TargetDeriver, plans: &[KeepPlan]) -> Option<NodeId> {
	let target = match deriver.derive(dom, old) {
		Ok(target) => target,
		Err(error) => {
			warn!("{} It can't be kept.", error);
			return None;
		}
	};
	let selector = match Selector::parse(&target) {
		Ok(selector) => selector,
		Err(error) => {
			warn!("Derived keep target {:?} doesn't parse: {}", target, error);
			return None;
		}
	};
	selector
		.select_subtree(dom, new_root)
		.into_iter()
		.find(|&new| KeepMode::of(dom, new).is_some() && !plans.iter().any(|plan| dom.is_ancestor_or_self(plan.new, new)))
}

fn equal_by(dom: &Dom, mode: KeepMode, old: NodeId, new: NodeId, volatile_attributes: &[String]) -> bool {
	match mode {
		KeepMode::Always => true,
		KeepMode::SameHtml => dom.normalized_outer_html(old, volatile_attributes) == dom.normalized_outer_html(new, volatile_attributes),
		KeepMode::SameData => match (data_of(dom, old), data_of(dom, new)) {
			(Ok(old), Ok(new)) => old == new,
			_ => false,
		},
	}
}

/// The parsed `up-data` of `element`.
fn data_of(dom: &Dom, element: NodeId) -> Result<Option<Value>, ()> {
	dom.attribute(element, "up-data")
		.map(|data| {
			serde_json::from_str(data).map_err(|error| {
				warn!("Invalid `up-data` on {:?}: {}", element, error);
			})
		})
		.transpose()
}
