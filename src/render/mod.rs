//! The [`Fragments`] engine: Entry point for render calls, queries and layer management.
//!
//! All state lives behind one [`RefCell`]. It is never borrowed across an `.await` or while a
//! host callback, hook or notification listener runs, with the exception of compilers,
//! destructors and keep hooks, which must not call back into the engine.

mod abort;
mod job;
mod options;
mod result;

pub use abort::AbortScope;
pub use options::{ErrorCallback, FinishedCallback, Focus, RenderOptions, RenderedCallback, Scroll};
pub use result::{Finished, RenderHandle, RenderOutcome, RenderResult};

use crate::{
	collaborators::{Animator, BasicParser, Disconnected, DocumentParser, Headless, Network, NoAnimation, Viewport},
	config::FragmentConfig,
	deriver::{DefaultDeriver, TargetDeriver},
	dom::{Dom, NodeId},
	error::{LifecycleError, RenderError, SelectorError},
	events::{EventBus, Notification},
	layer::{Layer, LayerContext, LayerDirectory, LayerId, LayerMode},
	lifecycle::{CompileMeta, Destructor, Lifecycle},
	resolve::{QueryOptions, Resolver, Target},
	swap::{finish_removal, PendingRemoval},
};
use abort::{InFlight, JobId};
use core::{cell::RefCell, future::Future};
use futures::{
	channel::oneshot,
	task::{LocalSpawn, LocalSpawnExt as _, SpawnError},
};
use job::Job;
use std::rc::Rc;
use tracing::{debug, instrument, trace};

struct State {
	dom: Dom,
	layers: LayerDirectory,
	context: LayerContext,
	lifecycle: Lifecycle,
	in_flight: InFlight,
	next_job: u64,
}

impl State {
	fn resolver<'a>(&'a self, config: &'a FragmentConfig, deriver: &'a dyn TargetDeriver) -> Resolver<'a> {
		Resolver { dom: &self.dom, layers: &self.layers, context: &self.context, config, deriver }
	}
}

struct Inner {
	state: RefCell<State>,
	bus: RefCell<EventBus>,
	config: FragmentConfig,
	spawner: Box<dyn LocalSpawn>,
	network: Box<dyn Network>,
	animator: Box<dyn Animator>,
	viewport: Box<dyn Viewport>,
	parser: Box<dyn DocumentParser>,
	deriver: Box<dyn TargetDeriver>,
}

/// A handle to the engine. Clones share the same document and state.
#[derive(Clone)]
pub struct Fragments {
	inner: Rc<Inner>,
}

impl core::fmt::Debug for Fragments {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Fragments").field("config", &self.inner.config).finish_non_exhaustive()
	}
}

#[must_use]
pub struct FragmentsBuilder {
	dom: Dom,
	spawner: Box<dyn LocalSpawn>,
	config: FragmentConfig,
	network: Box<dyn Network>,
	animator: Box<dyn Animator>,
	viewport: Box<dyn Viewport>,
	parser: Box<dyn DocumentParser>,
	deriver: Box<dyn TargetDeriver>,
}

impl FragmentsBuilder {
	pub fn config(mut self, config: FragmentConfig) -> Self {
		self.config = config;
		self
	}

	pub fn network(mut self, network: impl Network + 'static) -> Self {
		self.network = Box::new(network);
		self
	}

	pub fn animator(mut self, animator: impl Animator + 'static) -> Self {
		self.animator = Box::new(animator);
		self
	}

	pub fn viewport(mut self, viewport: impl Viewport + 'static) -> Self {
		self.viewport = Box::new(viewport);
		self
	}

	pub fn parser(mut self, parser: impl DocumentParser + 'static) -> Self {
		self.parser = Box::new(parser);
		self
	}

	pub fn deriver(mut self, deriver: impl TargetDeriver + 'static) -> Self {
		self.deriver = Box::new(deriver);
		self
	}

	pub fn build(self) -> Fragments {
		let layers = LayerDirectory::new(&self.dom);
		Fragments {
			inner: Rc::new(Inner {
				state: RefCell::new(State {
					dom: self.dom,
					layers,
					context: LayerContext::default(),
					lifecycle: Lifecycle::new(),
					in_flight: InFlight::default(),
					next_job: 0,
				}),
				bus: RefCell::default(),
				config: self.config,
				spawner: self.spawner,
				network: self.network,
				animator: self.animator,
				viewport: self.viewport,
				parser: self.parser,
				deriver: self.deriver,
			}),
		}
	}
}

impl Fragments {
	/// Starts building an engine over `dom` whose asynchronous continuations run on `spawner`.
	pub fn builder(dom: Dom, spawner: impl LocalSpawn + 'static) -> FragmentsBuilder {
		FragmentsBuilder {
			dom,
			spawner: Box::new(spawner),
			config: FragmentConfig::default(),
			network: Box::new(Disconnected),
			animator: Box::new(NoAnimation),
			viewport: Box::new(Headless),
			parser: Box::new(BasicParser),
			deriver: Box::new(DefaultDeriver),
		}
	}

	#[must_use]
	pub fn config(&self) -> &FragmentConfig {
		&self.inner.config
	}

	/// Starts a render call.
	///
	/// With purely local content, the DOM is updated before this method returns. The handle still
	/// only settles when polled.
	#[instrument(skip(self, options), fields(selector = ?options.target, url = ?options.url))]
	pub fn render(&self, options: RenderOptions) -> RenderHandle {
		let (rendered_sender, rendered) = oneshot::channel();
		let (finished_sender, finished) = oneshot::channel();
		let id = {
			let mut state = self.inner.state.borrow_mut();
			state.next_job += 1;
			JobId(state.next_job)
		};
		Job::new(self.clone(), id, options, rendered_sender, finished_sender).start();
		RenderHandle::new(rendered, finished)
	}

	/// The best match for `target`. See [`Resolver::get`].
	///
	/// # Errors
	///
	/// For unknown layers and malformed selectors.
	pub fn get(&self, target: impl Into<Target>, options: &QueryOptions) -> Result<Option<NodeId>, RenderError> {
		let state = self.inner.state.borrow();
		state.resolver(&self.inner.config, &*self.inner.deriver).get(&target.into(), options)
	}

	/// Every match for `target`. See [`Resolver::all`].
	///
	/// # Errors
	///
	/// For unknown layers and malformed selectors.
	pub fn all(&self, target: impl Into<Target>, options: &QueryOptions) -> Result<Vec<NodeId>, RenderError> {
		let state = self.inner.state.borrow();
		state.resolver(&self.inner.config, &*self.inner.deriver).all(&target.into(), options)
	}

	/// # Errors
	///
	/// Iff `selector` is malformed.
	pub fn subtree(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, RenderError> {
		let state = self.inner.state.borrow();
		state.resolver(&self.inner.config, &*self.inner.deriver).subtree(root, selector)
	}

	/// # Errors
	///
	/// Iff `selector` is malformed.
	pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, RenderError> {
		let state = self.inner.state.borrow();
		state.resolver(&self.inner.config, &*self.inner.deriver).closest(node, selector)
	}

	/// Runs `f` with `layer` as the current layer.
	pub fn with_layer<R>(&self, layer: LayerId, f: impl FnOnce(&Self) -> R) -> R {
		self.inner.state.borrow_mut().context.push(layer);
		let result = f(self);
		self.inner.state.borrow_mut().context.pop();
		result
	}

	#[must_use]
	pub fn current_layer(&self) -> LayerId {
		let state = self.inner.state.borrow();
		state.context.current(&state.layers)
	}

	#[must_use]
	pub fn layer(&self, id: LayerId) -> Option<Layer> {
		self.inner.state.borrow().layers.get(id).cloned()
	}

	/// The number of layers, including the root layer.
	#[must_use]
	pub fn layer_count(&self) -> usize {
		self.inner.state.borrow().layers.len()
	}

	#[must_use]
	pub fn layer_of(&self, node: NodeId) -> Option<LayerId> {
		let state = self.inner.state.borrow();
		state.layers.layer_of(&state.dom, node)
	}

	/// Opens an overlay on top of the layer stack.
	///
	/// # Errors
	///
	/// See [`LayerDirectory::open`].
	pub fn open_layer(&self, element: NodeId, content: NodeId, mode: LayerMode, history: bool) -> Result<LayerId, RenderError> {
		let mut state = self.inner.state.borrow_mut();
		let state = &mut *state;
		state.layers.open(&state.dom, element, content, mode, history)
	}

	/// Closes `id` and all layers above it, destroying their elements.
	///
	/// # Errors
	///
	/// See [`LayerDirectory::close`].
	pub fn close_layer(&self, id: LayerId) -> Result<(), RenderError> {
		let notifications = {
			let mut state = self.inner.state.borrow_mut();
			let state = &mut *state;
			let closed = state.layers.close(id)?;
			let mut notifications = Vec::new();
			for layer in closed {
				state.in_flight.abort_scope(&state.dom, AbortScope::Layer(layer.id()), "layer closed");
				state.dom.mark_destroying(layer.element());
				state.lifecycle.destroy(&mut state.dom, layer.element(), &[]);
				state.dom.remove(layer.element());
				notifications.push(Notification::Destroyed { element: layer.element() });
			}
			notifications
		};
		self.bus().notify_all(&notifications);
		self.collect(notifications.iter().filter_map(|notification| match notification {
			Notification::Destroyed { element } => Some(*element),
			_ => None,
		}));
		Ok(())
	}

	/// Aborts in-flight requests in `scope` and returns how many were aborted.
	pub fn abort(&self, scope: AbortScope) -> usize {
		let mut state = self.inner.state.borrow_mut();
		let state = &mut *state;
		let aborted = state.in_flight.abort_scope(&state.dom, scope, "aborted by host");
		debug!(?scope, aborted, "Aborted requests.");
		aborted
	}

	/// The number of render calls currently waiting for the network.
	#[must_use]
	pub fn in_flight(&self) -> usize {
		self.inner.state.borrow().in_flight.len()
	}

	/// Drains the lifecycle error channel.
	pub fn take_errors(&self) -> Vec<LifecycleError> {
		self.inner.state.borrow_mut().lifecycle.take_errors()
	}

	/// Registers a compiler. See [`Lifecycle::register`].
	///
	/// # Errors
	///
	/// Iff `selector` doesn't parse.
	pub fn register_compiler(
		&self,
		selector: &str,
		compiler: impl Fn(&mut Dom, NodeId, &CompileMeta<'_>) -> Result<Option<Destructor>, String> + 'static,
	) -> Result<(), SelectorError> {
		self.inner.state.borrow_mut().lifecycle.register(selector, compiler)
	}

	/// Runs compilers on existing content, e.g. the initial page.
	pub fn compile(&self, root: NodeId) {
		let mut state = self.inner.state.borrow_mut();
		let state = &mut *state;
		let layer = state.layers.layer_of(&state.dom, root);
		state.lifecycle.compile(&mut state.dom, root, &CompileMeta { layer, revalidating: false, response: None }, &[]);
	}

	/// Registers hooks and listeners.
	pub fn events(&self, f: impl FnOnce(&mut EventBus)) {
		f(&mut self.inner.bus.borrow_mut());
	}

	pub fn inspect<R>(&self, f: impl FnOnce(&Dom) -> R) -> R {
		f(&self.inner.state.borrow().dom)
	}

	/// Mutates the document outside of any render call.
	pub fn mutate<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
		let mut state = self.inner.state.borrow_mut();
		let state = &mut *state;
		let result = f(&mut state.dom);
		state.layers.sync_root(&state.dom);
		state.lifecycle.prune(&state.dom);
		result
	}

	fn bus(&self) -> EventBus {
		self.inner.bus.borrow().clone()
	}

	fn spawn(&self, future: impl Future<Output = ()> + 'static) -> Result<(), SpawnError> {
		self.inner.spawner.spawn_local(future)
	}

	fn finish_removals(&self, pending: Vec<PendingRemoval>) {
		let notifications = {
			let mut state = self.inner.state.borrow_mut();
			let state = &mut *state;
			let notifications: Vec<Notification> = pending.iter().flat_map(|&p| finish_removal(&mut state.dom, &mut state.lifecycle, p)).collect();
			state.layers.sync_root(&state.dom);
			notifications
		};
		self.bus().notify_all(&notifications);
		self.collect(pending.into_iter().map(|p| p.old));
	}

	/// Frees detached subtrees left behind by a mutation, once everyone was notified about them.
	fn collect(&self, garbage: impl IntoIterator<Item = NodeId>) {
		let mut state = self.inner.state.borrow_mut();
		let state = &mut *state;
		let before = state.dom.node_count();
		for root in garbage {
			let freed = state.dom.free(root);
			state.lifecycle.forget(&freed);
		}
		state.lifecycle.prune(&state.dom);
		trace!(freed = before - state.dom.node_count(), remaining = state.dom.node_count(), "Collected detached nodes.");
	}
}
