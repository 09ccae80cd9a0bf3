//! Bookkeeping of in-flight requests, so that newer render calls can abort competing ones.

use crate::{
	config::AbortPolicy,
	dom::{Dom, NodeId},
	layer::LayerId,
};
use futures::future::{AbortHandle, AbortRegistration};
use std::{cell::RefCell, rc::Rc};
use tracing::debug;

/// Which in-flight requests [`Fragments::abort`](`super::Fragments::abort`) aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortScope {
	/// Requests targeting `element`, an ancestor of it or an element inside it.
	Element(NodeId),
	Layer(LayerId),
	All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct JobId(pub(crate) u64);

/// Filled in when a request is aborted, read by the aborted job.
pub(crate) type AbortReason = Rc<RefCell<Option<String>>>;

#[derive(Debug)]
struct Entry {
	job: JobId,
	layer: LayerId,
	elements: Vec<NodeId>,
	handle: AbortHandle,
	reason: AbortReason,
}

#[derive(Debug, Default)]
pub(crate) struct InFlight {
	entries: Vec<Entry>,
}

impl InFlight {
	pub(crate) fn register(&mut self, job: JobId, layer: LayerId, elements: Vec<NodeId>) -> (AbortRegistration, AbortReason) {
		let (handle, registration) = AbortHandle::new_pair();
		let reason = AbortReason::default();
		self.entries.push(Entry { job, layer, elements, handle, reason: reason.clone() });
		(registration, reason)
	}

	pub(crate) fn finish(&mut self, job: JobId) {
		self.entries.retain(|entry| entry.job != job);
	}

	#[must_use]
	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	/// Aborts the requests a new call by `job` into `layer` targeting `elements` competes with.
	pub(crate) fn abort_for(&mut self, dom: &Dom, policy: AbortPolicy, job: JobId, layer: LayerId, elements: &[NodeId]) -> usize {
		let reason = format!("superseded by a newer render call into {}", layer);
		self.abort_where(&reason, |entry| {
			entry.job != job
				&& match policy {
					AbortPolicy::None => false,
					AbortPolicy::Target => entry.elements.iter().any(|&old| elements.iter().any(|&new| overlap(dom, old, new))),
					AbortPolicy::Layer => entry.layer == layer,
					AbortPolicy::All => true,
				}
		})
	}

	pub(crate) fn abort_scope(&mut self, dom: &Dom, scope: AbortScope, reason: &str) -> usize {
		self.abort_where(reason, |entry| match scope {
			AbortScope::Element(element) => entry.elements.iter().any(|&old| overlap(dom, old, element)),
			AbortScope::Layer(layer) => entry.layer == layer,
			AbortScope::All => true,
		})
	}

	fn abort_where(&mut self, reason: &str, mut predicate: impl FnMut(&Entry) -> bool) -> usize {
		let mut aborted = 0;
		self.entries.retain(|entry| {
			if !predicate(entry) {
				return true;
			}
			debug!(job = ?entry.job, reason, "Aborting request.");
			*entry.reason.borrow_mut() = Some(reason.to_owned());
			entry.handle.abort();
			aborted += 1;
			false
		});
		aborted
	}
}

fn overlap(dom: &Dom, a: NodeId, b: NodeId) -> bool {
	dom.is_ancestor_or_self(a, b) || dom.is_ancestor_or_self(b, a)
}
