//! One render call, from option normalization to the settling of both phases.
//!
//! ```text
//! pending ──prepare──> (local | cached) ──apply──> rendered ──transitions──> [revalidate] ──> finished
//!    │                      network ──load──> apply ──┘
//!    └──> failed (rendered and finished reject with the same error)
//! ```

use super::{
	abort::{AbortReason, JobId},
	options::{Focus, Scroll},
	Fragments, RenderOptions, RenderOutcome, RenderResult,
};
use crate::{
	collaborators::{CacheKey, CacheLookup, Request, Response, RevealOptions, TransportError},
	config::{Fallback, Revalidate},
	deriver::TargetDeriver,
	dom::{Dom, NodeId},
	error::RenderError,
	events::{GuardEvent, LoadingEvent, Notification},
	fallback::{match_current, match_response, recheck_current, Checkpoint, FallbackChain, Resolved},
	layer::{LayerId, LayerMode},
	lifecycle::CompileMeta,
	load::{load_child_nodes, load_document},
	resolve::Target,
	selector::build_element,
	steps::{compress, Placement, TargetStep},
	swap::{swap_step, PendingRemoval, SwapContext},
};
use futures::{
	channel::oneshot,
	future::{join_all, AbortRegistration, Abortable, Aborted, FutureExt as _, LocalBoxFuture},
	Future,
};
use std::rc::Rc;
use tracing::{debug, error, trace, trace_span, warn};

/// Where a render call goes and what it replaces.
#[derive(Debug, Clone)]
struct Plan {
	layer: LayerId,
	mode: LayerMode,
	chain: FallbackChain,
	resolved: Resolved,
	fail_target: Option<String>,
	headers: Vec<(String, String)>,
}

impl Plan {
	fn old_elements(&self) -> Vec<NodeId> {
		self.resolved.steps.iter().filter_map(|step| step.old_element).collect()
	}
}

enum Source {
	Local(NewContent),
	Cached { response: Response, stale: bool },
	Network,
}

enum NewContent {
	/// Inner HTML for elements built from the step selectors.
	Inner(String),
	/// HTML containing the targets.
	Html(String),
	Response(Response),
}

/// An in-flight registration, made before the request it guards is sent.
type Ticket = (AbortRegistration, AbortReason);

/// The synchronous outcome of one swap phase, before anything was published.
struct Applied {
	result: RenderResult,
	/// The swapped steps, with the live fragments as their old elements.
	resolved: Resolved,
	status: u16,
	notifications: Vec<Notification>,
	pending: Vec<PendingRemoval>,
	focus: Option<NodeId>,
	reveal: Option<(NodeId, RevealOptions)>,
	history: Option<(String, Option<String>)>,
	garbage: Vec<NodeId>,
}

pub(super) struct Job {
	engine: Fragments,
	id: JobId,
	options: Rc<RenderOptions>,
	label: String,
	rendered: Option<oneshot::Sender<RenderOutcome>>,
	finished: Option<oneshot::Sender<RenderOutcome>>,
}

impl Job {
	pub(super) fn new(
		engine: Fragments,
		id: JobId,
		options: RenderOptions,
		rendered: oneshot::Sender<RenderOutcome>,
		finished: oneshot::Sender<RenderOutcome>,
	) -> Self {
		let label = match &options.target {
			Some(Target::Selector(selector)) => selector.clone(),
			Some(Target::Element(element)) => format!("{:?}", element),
			Some(Target::Elements(elements)) => format!("{:?}", elements),
			None => ":main".to_owned(),
		};
		Self { engine, id, options: Rc::new(options), label, rendered: Some(rendered), finished: Some(finished) }
	}

	pub(super) fn start(self) {
		let span = trace_span!("render_job", job = self.id.0, selector = %self.label);
		let _enter = span.enter();

		let (plan, source) = match self.prepare() {
			Ok(prepared) => prepared,
			Err(error) => return self.fail(error),
		};
		match source {
			Source::Local(content) => self.render(plan, content, false, None),
			Source::Cached { response, stale } => {
				let revalidate = if stale { Some(self.request(&plan, true, Some(&response))) } else { None };
				debug!(stale, "Rendering cached response.");
				self.render(plan, NewContent::Response(response), false, revalidate);
			}
			Source::Network => {
				let request = self.request(&plan, false, None);
				let load = self.load(self.register(&plan), request);
				let engine = self.engine.clone();
				if let Err(error) = engine.spawn(self.fetch(plan, load)) {
					error!("Could not spawn render job: {}", error);
				}
			}
		}
	}

	fn prepare(&self) -> Result<(Plan, Source), RenderError> {
		let options = Rc::clone(&self.options);
		let inner = &self.engine.inner;
		match options.source_count() {
			1 => (),
			0 => return Err(RenderError::InvalidOptions("no content source given".to_owned())),
			n => return Err(RenderError::InvalidOptions(format!("{} content sources given, expected one", n))),
		}

		let target = options.target.clone().unwrap_or_else(|| Target::from(":main"));
		let mut plan = self.plan(&target, options.fail_target.clone())?;

		let bus = self.engine.bus();
		if let Some(name) = &options.guard_event {
			let event = GuardEvent { name: name.clone(), target: plan.resolved.target.clone(), origin: options.origin };
			bus.guard(&event).map_err(|veto| RenderError::aborted(veto.reason))?;
		}
		let mut loading = LoadingEvent::new(
			options.url.clone(),
			options.method,
			plan.layer,
			plan.resolved.target.clone(),
			plan.fail_target.clone(),
			options.headers.clone(),
		);
		bus.loading(&mut loading).map_err(|veto| RenderError::aborted(veto.reason))?;
		if loading.target == plan.resolved.target {
			plan.fail_target = loading.fail_target;
		} else {
			debug!(from = %plan.resolved.target, to = %loading.target, "Retargeted by a loading hook.");
			plan = self.plan(&Target::Selector(loading.target), loading.fail_target)?;
		}
		plan.headers = loading.headers;

		{
			let mut state = inner.state.borrow_mut();
			let state = &mut *state;
			let policy = options.abort.unwrap_or(inner.config.abort);
			let aborted = state.in_flight.abort_for(&state.dom, policy, self.id, plan.layer, &plan.old_elements());
			if aborted > 0 {
				debug!(aborted, ?policy, "Aborted competing requests.");
			}
		}

		let source = if let Some(content) = &options.content {
			Source::Local(NewContent::Inner(content.clone()))
		} else if let Some(html) = options.fragment.as_ref().or_else(|| options.document.as_ref()) {
			Source::Local(NewContent::Html(html.clone()))
		} else if let Some(response) = &options.response {
			Source::Local(NewContent::Response(response.clone()))
		} else if options.cache && options.method.is_safe() {
			let key = CacheKey { url: options.url.clone().unwrap_or_default(), target: plan.resolved.target.clone(), layer: plan.layer };
			match inner.network.lookup(&key) {
				CacheLookup::Miss => Source::Network,
				CacheLookup::Fresh(response) => Source::Cached { response, stale: false },
				CacheLookup::Stale(response) => {
					let revalidate = options.revalidate.unwrap_or(inner.config.revalidate);
					Source::Cached { response, stale: revalidate == Revalidate::Auto }
				}
			}
		} else {
			Source::Network
		};
		Ok((plan, source))
	}

	/// Resolves `target` in the requested layers (before any request), with fallbacks.
	fn plan(&self, target: &Target, fail_target: Option<String>) -> Result<Plan, RenderError> {
		let inner = &self.engine.inner;
		let state = inner.state.borrow();
		let resolver = state.resolver(&inner.config, &*inner.deriver);
		let query = self.options.query_options();
		let fallback = self.options.fallback.clone().unwrap_or_else(|| inner.config.fallback.clone());

		let (selector, preset) = match target {
			Target::Selector(selector) => (selector.clone(), None),
			Target::Element(element) => element_steps(resolver.dom, resolver.deriver, &[*element])?,
			Target::Elements(elements) => element_steps(resolver.dom, resolver.deriver, elements)?,
		};
		let layers = match preset.as_ref().and_then(|steps| steps.first()).and_then(|step| step.old_element) {
			Some(element) => vec![state.layers.layer_of(&state.dom, element).ok_or_else(|| RenderError::cannot_match(selector.as_str()))?],
			None => resolver.layers_for(&query)?,
		};

		let mut last_error = None;
		for layer in layers {
			let scope = resolver.layer_scope(layer, &query);
			let chain = FallbackChain::new(&selector, &fallback, &inner.config.main_targets_for(scope.mode));
			let resolved = chain.resolve(Checkpoint::BeforeRequest, |candidate| match &preset {
				Some(steps) if candidate == selector => recheck_current(&resolver, &scope, steps),
				_ => match_current(&resolver, &scope, candidate),
			});
			match resolved {
				Ok(mut resolved) => {
					resolved.steps = compress(resolver.dom, resolved.steps);
					if let Some(fail_target) = &fail_target {
						if match_current(&resolver, &scope, fail_target)?.is_none() {
							debug!(%fail_target, "Fail target doesn't match. Requesting anyway.");
						}
					}
					trace!(%layer, selector = %resolved.target, steps = resolved.steps.len(), "Planned.");
					return Ok(Plan { layer, mode: scope.mode, chain, resolved, fail_target, headers: Vec::new() });
				}
				Err(error) => {
					trace!(%layer, %error, "No match in layer.");
					last_error = Some(error);
				}
			}
		}

		let error = last_error.unwrap_or_else(|| RenderError::cannot_match(selector.as_str()));
		if cfg!(feature = "log-paths") {
			if let (RenderError::CannotMatch { target }, Some(origin)) = (&error, self.options.origin) {
				return Err(RenderError::cannot_match(format!("{} (origin at {})", target, path(resolver.dom, resolver.deriver, origin))));
			}
		}
		Err(error)
	}

	fn request(&self, plan: &Plan, revalidating: bool, cached: Option<&Response>) -> Request {
		let mut headers = plan.headers.clone();
		headers.push(("X-Up-Target".to_owned(), plan.resolved.target.clone()));
		if let Some(fail_target) = &plan.fail_target {
			headers.push(("X-Up-Fail-Target".to_owned(), fail_target.clone()));
		}
		headers.push(("X-Up-Mode".to_owned(), plan.mode.name().to_owned()));
		if let Some(etag) = cached.and_then(|response| response.header("ETag")) {
			headers.push(("If-None-Match".to_owned(), etag.to_owned()));
		}
		Request {
			url: self.options.url.clone().unwrap_or_default(),
			method: self.options.method,
			params: self.options.params.clone(),
			headers,
			target: plan.resolved.target.clone(),
			fail_target: plan.fail_target.clone(),
			layer: plan.layer,
			mode: plan.mode,
			revalidating,
		}
	}

	/// Registers an in-flight request of this job competing for `plan`'s old elements.
	///
	/// Render calls started from here on can abort it, even before it is sent.
	fn register(&self, plan: &Plan) -> Ticket {
		self.engine.inner.state.borrow_mut().in_flight.register(self.id, plan.layer, plan.old_elements())
	}

	/// Sends `request` under `ticket`, unless it was aborted already.
	fn load(&self, (registration, reason): Ticket, request: Request) -> impl Future<Output = Result<Response, RenderError>> + 'static {
		let engine = self.engine.clone();
		let job = self.id;
		let response = if reason.borrow().is_some() {
			trace!(url = %request.url, "Aborted before sending.");
			None
		} else {
			trace!(url = %request.url, revalidating = request.revalidating, "Requesting.");
			Some(engine.inner.network.load(request))
		};
		async move {
			let result = match response {
				Some(response) => Abortable::new(response, registration).await,
				None => Err(Aborted),
			};
			engine.inner.state.borrow_mut().in_flight.finish(job);
			match result {
				Ok(Ok(response)) => Ok(response),
				Ok(Err(TransportError(message))) => Err(RenderError::Offline(message)),
				Err(Aborted) => Err(RenderError::aborted(reason.borrow_mut().take().unwrap_or_else(|| "aborted".to_owned()))),
			}
		}
	}

	async fn fetch(self, plan: Plan, load: impl Future<Output = Result<Response, RenderError>>) {
		match load.await {
			Ok(response) => self.render(plan, NewContent::Response(response), true, None),
			Err(error) => self.fail(error),
		}
	}

	/// Performs and publishes phase 1, then settles or schedules the finished phase.
	fn render(mut self, mut plan: Plan, content: NewContent, recheck: bool, revalidate: Option<Request>) {
		let applied = match self.apply(&plan, &content, false, recheck) {
			Ok(applied) => applied,
			Err(error) => return self.fail(error),
		};
		plan.resolved = applied.resolved.clone();
		let (outcome, completion) = self.publish(applied, false);
		self.settle_rendered(outcome.clone());

		// Against the live fragments, and before any transition completes.
		let revalidate = revalidate.filter(|_| outcome.is_ok()).map(|request| (request, self.register(&plan)));
		if completion.is_none() && revalidate.is_none() {
			return self.settle_finished(outcome);
		}
		let engine = self.engine.clone();
		if let Err(error) = engine.spawn(self.finish(plan, outcome, completion, revalidate)) {
			error!("Could not spawn the finishing phase: {}", error);
		}
	}

	async fn finish(
		mut self,
		plan: Plan,
		outcome: RenderOutcome,
		completion: Option<LocalBoxFuture<'static, ()>>,
		revalidate: Option<(Request, Ticket)>,
	) {
		if let Some(completion) = completion {
			completion.await;
		}
		let outcome = match (outcome, revalidate) {
			(Ok(rendered), Some((request, ticket))) => self.revalidate(&plan, rendered, request, ticket).await,
			(outcome, _) => outcome,
		};
		self.settle_finished(outcome);
	}

	/// Phase 2. Failures only ever reject the finished phase. Rendered content stays.
	async fn revalidate(&self, plan: &Plan, rendered: RenderResult, request: Request, ticket: Ticket) -> RenderOutcome {
		debug!(url = %request.url, "Revalidating.");
		let outcome = match self.load(ticket, request).await {
			Err(error) => Err(error),
			Ok(response) if response.not_modified() => {
				debug!(status = response.status, "Not modified. Keeping the rendered content.");
				Ok(rendered)
			}
			Ok(response) => match self.apply(plan, &NewContent::Response(response), true, true) {
				Err(error) => Err(error),
				Ok(applied) => {
					let (outcome, completion) = self.publish(applied, true);
					if let Some(completion) = completion {
						completion.await;
					}
					outcome
				}
			},
		};
		if let Err(error) = &outcome {
			self.report(error);
		}
		outcome
	}

	/// Resolves against the current page and the new content, then swaps every step.
	///
	/// All steps are resolved before the first mutation.
	fn apply(&self, plan: &Plan, content: &NewContent, revalidating: bool, recheck: bool) -> Result<Applied, RenderError> {
		let inner = &self.engine.inner;
		let options = &self.options;
		let (status, response) = match content {
			NewContent::Response(response) => (response.status, Some(response)),
			_ => (200, None),
		};
		let ok = response.map_or(true, Response::ok);

		let fail_chain;
		let (chain, base) = if ok {
			(&plan.chain, Some(&plan.resolved))
		} else {
			match &plan.fail_target {
				Some(fail_target) => {
					debug!(status, %fail_target, "Rendering error response into the fail target.");
					fail_chain = FallbackChain::new(fail_target, &Fallback::Disabled, &[]);
					(&fail_chain, None)
				}
				None => return Err(RenderError::ServerError { status }),
			}
		};

		let parsed = match content {
			NewContent::Inner(html) | NewContent::Html(html) => inner.parser.parse(html)?,
			NewContent::Response(response) => inner.parser.parse(&response.text)?,
		};
		if cfg!(feature = "dangerous-logging") {
			trace!(?parsed, "Parsed new content.");
		}

		let focused_before = if options.focus == Focus::Keep { inner.viewport.focused() } else { None };

		let mut state = inner.state.borrow_mut();
		let state = &mut *state;
		let new_root = match content {
			NewContent::Inner(_) => None,
			NewContent::Html(_) | NewContent::Response(_) => Some(load_document(&mut state.dom, &parsed)),
		};

		let query = options.query_options();
		let resolution = (|| -> Result<_, RenderError> {
			let resolver = state.resolver(&inner.config, &*inner.deriver);
			let scope = resolver.layer_scope(plan.layer, &query);
			let current = |candidate: &str| match base {
				Some(base) if candidate == base.target => recheck_current(&resolver, &scope, &base.steps),
				_ => match_current(&resolver, &scope, candidate),
			};
			if recheck {
				chain.resolve(Checkpoint::AfterRequest, &current)?;
			}
			let resolved = match new_root {
				Some(root) => {
					let new_scope = resolver.detached_scope(root, plan.mode, scope.origin);
					chain.resolve(Checkpoint::InResponse, |candidate| match current(candidate)? {
						Some(steps) => match_response(&resolver, &new_scope, &steps),
						None => Ok(None),
					})?
				}
				None => chain.resolve(Checkpoint::AfterRequest, &current)?,
			};
			let steps = compress(resolver.dom, resolved.steps.clone());
			let focused = focused_before
				.filter(|&f| steps.iter().filter_map(|s| s.old_element).any(|old| resolver.dom.is_ancestor_or_self(old, f)))
				.map(|f| (f, resolver.deriver.derive(resolver.dom, f).ok()));
			Ok((resolved, steps, scope, focused))
		})();
		let (resolved, mut steps, scope, focused) = match resolution {
			Ok(resolution) => resolution,
			Err(error) => {
				if let Some(root) = new_root {
					state.dom.free(root);
				}
				return Err(error);
			}
		};

		if let NewContent::Inner(_) = content {
			let nodes = parsed.body().map_or(&parsed.nodes[..], |body| body.children());
			for step in &mut steps {
				let element = build_content_element(&mut state.dom, &*inner.deriver, step)?;
				load_child_nodes(&mut state.dom, element, nodes);
				step.new_element = Some(element);
			}
		}

		let bus = self.engine.bus();
		let transition = options.transition.is_some() && !revalidating;
		let mut fragments = Vec::with_capacity(steps.len());
		let mut live_steps = Vec::with_capacity(steps.len());
		let mut notifications = Vec::new();
		let mut pending = Vec::new();
		let mut garbage: Vec<NodeId> = new_root.into_iter().collect();
		{
			let mut cx = SwapContext {
				dom: &mut state.dom,
				lifecycle: &mut state.lifecycle,
				deriver: &*inner.deriver,
				config: &inner.config,
				bus: &bus,
				keep: options.keep && inner.config.keep_enabled,
				layer: Some(plan.layer),
				meta: CompileMeta { layer: Some(plan.layer), revalidating, response },
			};
			let mut steps = steps.into_iter();
			while let Some(step) = steps.next() {
				let swapped = match swap_step(&mut cx, &step, transition && step.placement == Placement::Swap) {
					Ok(swapped) => swapped,
					Err(error) if fragments.is_empty() => {
						garbage.extend(step.new_element.into_iter().chain(steps.filter_map(|step| step.new_element)));
						for root in garbage {
							cx.dom.free(root);
						}
						return Err(error);
					}
					Err(error) => {
						// Earlier steps are committed. Finish the render without this one.
						warn!(selector = %step.selector, %error, "Skipping a step whose target went away during the swap.");
						garbage.extend(step.new_element);
						continue;
					}
				};
				fragments.push(swapped.fragment);
				notifications.extend(swapped.notifications);
				pending.extend(swapped.pending_removal);
				garbage.extend(swapped.garbage);
				live_steps.push(TargetStep { old_element: Some(swapped.fragment), new_element: None, ..step });
			}
		}
		state.layers.sync_root(&state.dom);
		debug!(selector = %resolved.target, fragments = fragments.len(), revalidating, "Swapped.");

		let resolver = state.resolver(&inner.config, &*inner.deriver);
		let lookup = |selector: &str| match resolver.get_in(&scope, selector) {
			Ok(found) => found,
			Err(error) => {
				warn!(%selector, %error, "Ignoring malformed selector.");
				None
			}
		};
		let (focus, reveal, history) = if revalidating || !ok {
			(None, None, None)
		} else {
			let focus = match &options.focus {
				Focus::None => None,
				Focus::Keep => focused.and_then(|(element, selector)| {
					if resolver.dom.is_attached(element) {
						Some(element)
					} else {
						selector.and_then(|selector| lookup(&selector))
					}
				}),
				Focus::Target => fragments.first().copied(),
				Focus::Autofocus => {
					fragments.iter().flat_map(|&f| resolver.dom.subtree_elements(f)).find(|&e| resolver.dom.has_attribute(e, "autofocus"))
				}
				Focus::Selector(selector) => lookup(selector),
			};
			let reveal = match &options.scroll {
				Scroll::None => None,
				Scroll::Target => fragments.first().map(|&f| (f, RevealOptions { top: false })),
				Scroll::Top => state.layers.get(plan.layer).map(|l| (l.content(), RevealOptions { top: true })),
				Scroll::Selector(selector) => lookup(selector).map(|e| (e, RevealOptions { top: false })),
			};
			let url = response.map(|r| r.url.clone()).filter(|url| !url.is_empty()).or_else(|| options.url.clone());
			let history_enabled = options.history.unwrap_or_else(|| state.layers.get(plan.layer).map_or(false, |l| l.history()));
			let history = url.filter(|_| history_enabled).map(|url| (url, parsed.title.clone()));
			(focus, reveal, history)
		};

		let resolved = Resolved { steps: live_steps, ..resolved };
		Ok(Applied {
			result: RenderResult { ok, target: resolved.target.clone(), layer: plan.layer, fragments, options: Rc::clone(&self.options) },
			resolved,
			status,
			notifications,
			pending,
			focus,
			reveal,
			history,
			garbage,
		})
	}

	/// Delivers the side effects of a swap phase.
	///
	/// Returns the phase's outcome and what it still waits for (transitions, reveal).
	fn publish(&self, applied: Applied, revalidated: bool) -> (RenderOutcome, Option<LocalBoxFuture<'static, ()>>) {
		let inner = &self.engine.inner;
		let bus = self.engine.bus();
		bus.notify_all(&applied.notifications);
		bus.notify(&Notification::Rendered { target: applied.result.target.clone(), fragments: applied.result.fragments.clone(), revalidated });
		self.engine.collect(applied.garbage);

		if let Some((url, title)) = &applied.history {
			inner.viewport.push_history(url, title.as_deref());
		}
		if let Some(focus) = applied.focus {
			inner.viewport.focus(focus);
		}

		let mut waits = Vec::new();
		if let Some(transition) = &self.options.transition {
			for removal in &applied.pending {
				waits.push(inner.animator.transition(removal.old, removal.new, transition));
			}
		}
		if let Some((element, options)) = applied.reveal {
			waits.push(inner.animator.reveal(element, options));
		}
		let completion = if waits.is_empty() && applied.pending.is_empty() {
			None
		} else {
			let engine = self.engine.clone();
			let pending = applied.pending;
			Some(
				async move {
					join_all(waits).await;
					engine.finish_removals(pending);
				}
				.boxed_local(),
			)
		};

		let outcome = if applied.result.ok {
			if let Some(on_rendered) = &self.options.on_rendered {
				on_rendered(&applied.result);
			}
			Ok(applied.result)
		} else {
			Err(RenderError::ServerError { status: applied.status })
		};
		(outcome, completion)
	}

	/// Rejects both phases with `error`.
	fn fail(mut self, error: RenderError) {
		self.settle_rendered(Err(error.clone()));
		self.settle_finished(Err(error));
	}

	fn settle_rendered(&mut self, outcome: RenderOutcome) {
		if let Err(error) = &outcome {
			self.report(error);
		}
		if let Some(sender) = self.rendered.take() {
			if sender.send(outcome).is_err() {
				trace!("Render handle was dropped before the rendered phase settled.");
			}
		}
	}

	fn settle_finished(&mut self, outcome: RenderOutcome) {
		if let Some(on_finished) = &self.options.on_finished {
			on_finished(&outcome);
		}
		if let Some(sender) = self.finished.take() {
			if sender.send(outcome).is_err() {
				trace!("Finished future was dropped before it settled.");
			}
		}
	}

	/// Notifies about a failure through the bus and exactly one callback.
	fn report(&self, error: &RenderError) {
		match error {
			RenderError::Aborted { reason } => {
				debug!(%reason, "Render call aborted.");
				self.engine.bus().notify(&Notification::Aborted { target: self.label.clone(), reason: reason.clone() });
			}
			RenderError::Offline(_) => debug!(%error, "Render call failed."),
			_ => warn!(%error, "Render call failed."),
		}
		let callback = if error.is_offline() { &self.options.on_offline } else { &self.options.on_error };
		if let Some(callback) = callback {
			callback(error);
		}
	}
}

/// A job can go away before it settled, e.g. when the executor refuses one of its continuations
/// or is dropped with the job still queued. Its phases then reject as aborted and its in-flight
/// requests are released.
impl Drop for Job {
	fn drop(&mut self) {
		match self.engine.inner.state.try_borrow_mut() {
			Ok(mut state) => state.in_flight.finish(self.id),
			Err(_) => error!(job = self.id.0, "Couldn't release in-flight requests of a dropped render job."),
		}
		if self.rendered.is_none() && self.finished.is_none() {
			return;
		}
		warn!(job = self.id.0, "Render job dropped before it settled.");
		let error = RenderError::aborted("render job dropped");
		if self.rendered.is_some() {
			self.settle_rendered(Err(error.clone()));
		} else {
			self.report(&error);
		}
		self.settle_finished(Err(error));
	}
}

/// Steps for caller-supplied elements, with derived selectors for finding their new content.
fn element_steps(dom: &Dom, deriver: &dyn TargetDeriver, elements: &[NodeId]) -> Result<(String, Option<Vec<TargetStep>>), RenderError> {
	let mut steps = Vec::with_capacity(elements.len());
	for &element in elements {
		let selector = deriver.derive(dom, element).map_err(|error| RenderError::cannot_match(error.to_string()))?;
		steps.push(TargetStep { old_element: Some(element), ..TargetStep::new(selector, Placement::Swap, false) });
	}
	if steps.is_empty() {
		return Err(RenderError::InvalidOptions("empty element list".to_owned()));
	}
	let union = steps.iter().map(|step| step.selector.as_str()).collect::<Vec<_>>().join(", ");
	Ok((union, Some(steps)))
}

/// Builds the element for the `content` option from the step's selector, else from the old
/// element's derived target, else its tag name.
fn build_content_element(dom: &mut Dom, deriver: &dyn TargetDeriver, step: &TargetStep) -> Result<NodeId, RenderError> {
	if let Ok(element) = build_element(dom, &step.selector) {
		return Ok(element);
	}
	let old = step.old_element.ok_or_else(|| RenderError::cannot_match(step.selector.as_str()))?;
	if let Ok(derived) = deriver.derive(dom, old) {
		if let Ok(element) = build_element(dom, &derived) {
			return Ok(element);
		}
	}
	let name = dom.tag_name(old).unwrap_or("div").to_owned();
	Ok(dom.create_element(&name, Vec::new()))
}

/// Derived selectors of `node` and its ancestors, outermost first.
fn path(dom: &Dom, deriver: &dyn TargetDeriver, node: NodeId) -> String {
	let mut segments: Vec<String> = dom
		.self_and_ancestors(node)
		.filter(|&n| dom.is_element(n))
		.map(|n| deriver.derive(dom, n).unwrap_or_else(|_| dom.tag_name(n).unwrap_or("?").to_owned()))
		.collect();
	segments.reverse();
	segments.join(" > ")
}
