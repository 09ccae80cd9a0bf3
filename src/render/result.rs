use super::RenderOptions;
use crate::{dom::NodeId, error::RenderError, layer::LayerId};
use core::{
	pin::Pin,
	task::{Context, Poll},
};
use futures::{
	channel::oneshot,
	future::{FutureExt as _, LocalBoxFuture, Shared},
	Future,
};
use std::rc::Rc;

/// The outcome of one completed swap phase.
#[derive(Debug, Clone)]
pub struct RenderResult {
	/// `false` iff an error response was rendered into the fail target.
	pub ok: bool,
	/// The target that was rendered, after fallbacks.
	pub target: String,
	pub layer: LayerId,
	/// The new top-level fragments, one per step.
	pub fragments: Vec<NodeId>,
	pub options: Rc<RenderOptions>,
}

pub type RenderOutcome = Result<RenderResult, RenderError>;

/// Settles once all deferred work of a render call (transitions, revalidation) is done.
pub type Finished = Shared<LocalBoxFuture<'static, RenderOutcome>>;

/// The two-phase result of [`Fragments::render`](`super::Fragments::render`).
///
/// Awaiting the handle itself yields the rendered phase. [`Self::finished`] yields the final one.
#[must_use = "Dropping the handle doesn't cancel the render call, but loses its result."]
pub struct RenderHandle {
	rendered: LocalBoxFuture<'static, RenderOutcome>,
	finished: Finished,
}

impl RenderHandle {
	pub(crate) fn new(rendered: oneshot::Receiver<RenderOutcome>, finished: oneshot::Receiver<RenderOutcome>) -> Self {
		Self { rendered: settle(rendered).boxed_local(), finished: settle(finished).boxed_local().shared() }
	}

	/// Can be called any number of times. All returned futures settle identically.
	pub fn finished(&self) -> Finished {
		self.finished.clone()
	}
}

/// A dropped sender means the job went away without settling. That counts as an abort.
async fn settle(receiver: oneshot::Receiver<RenderOutcome>) -> RenderOutcome {
	receiver.await.unwrap_or_else(|oneshot::Canceled| Err(RenderError::aborted("render job dropped")))
}

impl Future for RenderHandle {
	type Output = RenderOutcome;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.rendered.poll_unpin(cx)
	}
}

impl core::fmt::Debug for RenderHandle {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("RenderHandle").finish_non_exhaustive()
	}
}
