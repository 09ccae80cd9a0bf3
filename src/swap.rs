//! The fragment swapper: Performs one step's DOM mutation and the lifecycle around it.
//!
//! Outgoing elements are flagged as destroying and have their destructors run while still
//! attached. Incoming elements are compiled right after they are attached.

use crate::{
	config::FragmentConfig,
	deriver::TargetDeriver,
	dom::{Dom, NodeId, NodeKind},
	error::RenderError,
	events::{EventBus, Notification},
	keep::{plan_keeps, KeepPlan},
	layer::LayerId,
	lifecycle::{CompileMeta, Lifecycle},
	steps::{Placement, TargetStep},
};
use tracing::{debug, trace, trace_span, warn};

/// Everything a swap mutates or consults.
pub struct SwapContext<'a> {
	pub dom: &'a mut Dom,
	pub lifecycle: &'a mut Lifecycle,
	pub deriver: &'a dyn TargetDeriver,
	pub config: &'a FragmentConfig,
	pub bus: &'a EventBus,
	/// Whether keep negotiation happens at all.
	pub keep: bool,
	pub layer: Option<LayerId>,
	pub meta: CompileMeta<'a>,
}

/// The outcome of one step.
#[derive(Debug)]
#[must_use]
pub struct Swapped {
	/// The element now live for the step.
	pub fragment: NodeId,
	pub notifications: Vec<Notification>,
	/// Set iff the old element stays attached next to its replacement until a transition ends.
	pub pending_removal: Option<PendingRemoval>,
	/// Detached subtrees nothing refers to anymore. Free them once the notifications are out.
	pub garbage: Vec<NodeId>,
}

/// An outgoing element left in place for a transition. Pass it to [`finish_removal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PendingRemoval {
	pub old: NodeId,
	pub new: NodeId,
}

/// Swaps `step.new_element` into `step.old_element`'s place according to `step.placement`.
///
/// With `transition`, a [`Placement::Swap`] inserts the new element next to the old one and leaves
/// the removal of the old one to [`finish_removal`].
///
/// # Errors
///
/// [`RenderError::CannotMatch`] iff the step's old or new element is unresolved, or the old element
/// was detached since it was resolved. Nothing is mutated in that case.
pub fn swap_step(cx: &mut SwapContext<'_>, step: &TargetStep, transition: bool) -> Result<Swapped, RenderError> {
	let span = trace_span!("swap_step", selector = %step.selector, placement = ?step.placement);
	let _enter = span.enter();

	let (Some(old), Some(new)) = (step.old_element, step.new_element) else {
		return Err(RenderError::cannot_match(step.selector.as_str()));
	};
	if !cx.dom.is_attached(old) {
		debug!(?old, "Target element is no longer attached.");
		return Err(RenderError::cannot_match(step.selector.as_str()));
	}
	if cfg!(feature = "dangerous-logging") {
		trace!(html = %cx.dom.outer_html(new), "New content.");
	}

	match step.placement {
		Placement::Swap => Ok(swap_element(cx, old, new, transition)),
		Placement::Content => Ok(swap_content(cx, old, new)),
		Placement::Before | Placement::After => Ok(insert_children(cx, old, new, step.placement == Placement::Before)),
	}
}

fn negotiate_keeps(cx: &SwapContext<'_>, old: NodeId, new: NodeId) -> Vec<KeepPlan> {
	if !cx.keep {
		return Vec::new();
	}
	let bus = cx.bus;
	plan_keeps(cx.dom, old, new, cx.deriver, &cx.config.keep_volatile_attributes, &mut |plan| bus.keep(plan).is_ok())
}

/// Puts each kept element where its partner is in the new content.
///
/// Returns the displaced partners.
fn move_kept(dom: &mut Dom, plans: &[KeepPlan], notifications: &mut Vec<Notification>) -> Vec<NodeId> {
	plans
		.iter()
		.map(|plan| {
			dom.replace(plan.new, plan.old);
			notifications.push(Notification::Kept { element: plan.old, replaced: plan.new });
			plan.new
		})
		.collect()
}

fn swap_element(cx: &mut SwapContext<'_>, old: NodeId, new: NodeId, transition: bool) -> Swapped {
	let plans = negotiate_keeps(cx, old, new);
	let mut notifications = Vec::new();

	if let Some(plan) = plans.iter().find(|plan| plan.old == old) {
		debug!(?old, "The target element itself is kept. Nothing to swap.");
		notifications.push(Notification::Kept { element: plan.old, replaced: plan.new });
		return Swapped { fragment: old, notifications, pending_removal: None, garbage: vec![new] };
	}
	let kept: Vec<NodeId> = plans.iter().map(|plan| plan.old).collect();

	cx.dom.mark_destroying(old);
	if transition {
		let garbage = move_kept(cx.dom, &plans, &mut notifications);
		if let Some(parent) = cx.dom.parent(old) {
			cx.dom.insert_before(parent, new, Some(old));
		}
		compile(cx, new, &kept, &mut notifications);
		trace!(?old, ?new, "Old element stays attached for the transition.");
		return Swapped { fragment: new, notifications, pending_removal: Some(PendingRemoval { old, new }), garbage };
	}

	cx.lifecycle.destroy(cx.dom, old, &kept);
	let mut garbage = move_kept(cx.dom, &plans, &mut notifications);
	cx.dom.replace(old, new);
	garbage.push(old);
	notifications.push(Notification::Destroyed { element: old });
	compile(cx, new, &kept, &mut notifications);
	Swapped { fragment: new, notifications, pending_removal: None, garbage }
}

/// Completes the removal of an element left in place by a transition.
pub fn finish_removal(dom: &mut Dom, lifecycle: &mut Lifecycle, pending: PendingRemoval) -> Vec<Notification> {
	if dom.parent(pending.old).is_none() {
		warn!(old = ?pending.old, "Element was detached before its transition ended.");
	}
	lifecycle.destroy(dom, pending.old, &[]);
	dom.remove(pending.old);
	vec![Notification::Destroyed { element: pending.old }]
}

fn swap_content(cx: &mut SwapContext<'_>, old: NodeId, new: NodeId) -> Swapped {
	let plans: Vec<KeepPlan> = cx.dom.children(old).to_vec().into_iter().flat_map(|child| negotiate_keeps(cx, child, new)).collect();
	let kept: Vec<NodeId> = plans.iter().map(|plan| plan.old).collect();
	let mut notifications = Vec::new();

	let outgoing = cx.dom.children(old).to_vec();
	for &child in &outgoing {
		cx.dom.mark_destroying(child);
	}
	for &child in &outgoing {
		cx.lifecycle.destroy(cx.dom, child, &kept);
	}
	let mut garbage = move_kept(cx.dom, &plans, &mut notifications);
	for child in cx.dom.take_children(old) {
		if cx.dom.is_element(child) {
			notifications.push(Notification::Destroyed { element: child });
		}
		garbage.push(child);
	}
	for child in cx.dom.take_children(new) {
		cx.dom.append_child(old, child);
		if cx.dom.is_element(child) {
			compile(cx, child, &kept, &mut notifications);
		}
	}
	garbage.push(new);
	Swapped { fragment: old, notifications, pending_removal: None, garbage }
}

/// Inserts `new`'s children into `old`, before or after its existing children.
///
/// Anything other than a single element is inserted through a wrapper that's removed again once
/// the content is attached and compiled.
fn insert_children(cx: &mut SwapContext<'_>, old: NodeId, new: NodeId, before: bool) -> Swapped {
	let mut notifications = Vec::new();
	let children = cx.dom.take_children(new);
	let reference = if before { cx.dom.children(old).first().copied() } else { None };

	let single_element = children.len() == 1 && cx.dom.is_element(children[0]);
	if single_element {
		cx.dom.insert_before(old, children[0], reference);
		compile(cx, children[0], &[], &mut notifications);
		return Swapped { fragment: old, notifications, pending_removal: None, garbage: vec![new] };
	}

	let wrapper = cx.dom.create_element(&cx.config.wrapper_tag, Vec::new());
	for child in children {
		cx.dom.append_child(wrapper, child);
	}
	cx.dom.insert_before(old, wrapper, reference);
	let inserted = cx.dom.children(wrapper).to_vec();
	for &child in &inserted {
		if matches!(cx.dom.kind(child), NodeKind::Element(_)) {
			compile(cx, child, &[], &mut notifications);
		}
	}
	for &child in &inserted {
		if cx.dom.parent(child) == Some(wrapper) {
			cx.dom.insert_before(old, child, Some(wrapper));
		}
	}
	cx.dom.remove(wrapper);
	trace!(nodes = inserted.len(), "Unwrapped mixed content.");
	Swapped { fragment: old, notifications, pending_removal: None, garbage: vec![wrapper, new] }
}

fn compile(cx: &mut SwapContext<'_>, element: NodeId, kept: &[NodeId], notifications: &mut Vec<Notification>) {
	cx.lifecycle.compile(cx.dom, element, &cx.meta, kept);
	notifications.push(Notification::Inserted { element, layer: cx.layer });
}
