//! The guard/event bus.
//!
//! Cancellable hooks return a [`Verdict`]. The first [`Veto`] wins and later hooks aren't asked.
//! Notifications can't veto anything and are delivered after the DOM mutation they describe.

use crate::{collaborators::Method, dom::NodeId, keep::KeepPlan, layer::LayerId};
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Veto {
	pub reason: String,
}

impl Veto {
	pub fn new(reason: impl Into<String>) -> Self {
		Self { reason: reason.into() }
	}
}

pub type Verdict = Result<(), Veto>;

/// Emitted before content is obtained. Only the public fields are writable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingEvent {
	url: Option<String>,
	method: Method,
	layer: LayerId,
	pub target: String,
	pub fail_target: Option<String>,
	pub headers: Vec<(String, String)>,
}

impl LoadingEvent {
	pub(crate) fn new(url: Option<String>, method: Method, layer: LayerId, target: String, fail_target: Option<String>, headers: Vec<(String, String)>) -> Self {
		Self { url, method, layer, target, fail_target, headers }
	}

	/// [`None`] for local content.
	#[must_use]
	pub fn url(&self) -> Option<&str> {
		self.url.as_deref()
	}

	#[must_use]
	pub fn method(&self) -> Method {
		self.method
	}

	#[must_use]
	pub fn layer(&self) -> LayerId {
		self.layer
	}
}

/// A caller-named guard event, emitted once per render call that sets one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardEvent {
	pub name: String,
	pub target: String,
	pub origin: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
	/// A new element was attached and compiled.
	Inserted { element: NodeId, layer: Option<LayerId> },
	/// A live element was retained in place of `replaced`.
	Kept { element: NodeId, replaced: NodeId },
	/// An element was removed and its destructors have run.
	Destroyed { element: NodeId },
	/// A swap phase completed.
	Rendered { target: String, fragments: Vec<NodeId>, revalidated: bool },
	Aborted { target: String, reason: String },
}

type LoadingHook = Rc<dyn Fn(&mut LoadingEvent) -> Verdict>;
type GuardHook = Rc<dyn Fn(&GuardEvent) -> Verdict>;
type KeepHook = Rc<dyn Fn(&KeepPlan) -> Verdict>;
type Listener = Rc<dyn Fn(&Notification)>;

/// Cloning is cheap and yields a snapshot, which is what emitting works on.
#[derive(Clone, Default)]
pub struct EventBus {
	loading: Vec<LoadingHook>,
	guards: Vec<GuardHook>,
	keep: Vec<KeepHook>,
	listeners: Vec<Listener>,
}

impl core::fmt::Debug for EventBus {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("EventBus")
			.field("loading", &self.loading.len())
			.field("guards", &self.guards.len())
			.field("keep", &self.keep.len())
			.field("listeners", &self.listeners.len())
			.finish()
	}
}

impl EventBus {
	pub fn on_loading(&mut self, hook: impl Fn(&mut LoadingEvent) -> Verdict + 'static) {
		self.loading.push(Rc::new(hook));
	}

	pub fn on_guard(&mut self, hook: impl Fn(&GuardEvent) -> Verdict + 'static) {
		self.guards.push(Rc::new(hook));
	}

	pub fn on_keep(&mut self, hook: impl Fn(&KeepPlan) -> Verdict + 'static) {
		self.keep.push(Rc::new(hook));
	}

	pub fn on_notification(&mut self, listener: impl Fn(&Notification) + 'static) {
		self.listeners.push(Rc::new(listener));
	}

	/// # Errors
	///
	/// The first [`Veto`].
	pub fn loading(&self, event: &mut LoadingEvent) -> Verdict {
		self.loading.iter().try_for_each(|hook| hook(event)).map_err(|veto| {
			debug!(selector = %event.target, reason = %veto.reason, "Loading vetoed.");
			veto
		})
	}

	/// # Errors
	///
	/// The first [`Veto`].
	pub fn guard(&self, event: &GuardEvent) -> Verdict {
		self.guards.iter().try_for_each(|hook| hook(event))
	}

	/// # Errors
	///
	/// The first [`Veto`].
	pub fn keep(&self, plan: &KeepPlan) -> Verdict {
		self.keep.iter().try_for_each(|hook| hook(plan))
	}

	pub fn notify(&self, notification: &Notification) {
		for listener in &self.listeners {
			listener(notification)
		}
	}

	pub fn notify_all(&self, notifications: &[Notification]) {
		for notification in notifications {
			self.notify(notification)
		}
	}
}
