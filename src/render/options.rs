use super::RenderResult;
use crate::{
	collaborators::{Method, Response, Transition},
	config::{AbortPolicy, Fallback, MatchPolicy, Revalidate},
	dom::NodeId,
	error::RenderError,
	layer::LayerQuery,
	resolve::{QueryOptions, Target},
};
use core::fmt;
use std::rc::Rc;

/// Where focus goes after a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focus {
	/// Leave focus alone.
	None,
	/// Refocus the previously focused element, or its counterpart in the new content.
	Keep,
	/// The first new fragment.
	Target,
	/// The first element with `autofocus` in the new fragments.
	Autofocus,
	Selector(String),
}

/// What is revealed after a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scroll {
	None,
	/// The first new fragment.
	Target,
	/// The top of the layer.
	Top,
	Selector(String),
}

pub type RenderedCallback = Rc<dyn Fn(&RenderResult)>;
pub type FinishedCallback = Rc<dyn Fn(&Result<RenderResult, RenderError>)>;
pub type ErrorCallback = Rc<dyn Fn(&RenderError)>;

/// Describes one render call.
///
/// Exactly one content source (`content`, `fragment`, `document`, `response` or `url`) must be
/// given.
#[derive(Clone)]
pub struct RenderOptions {
	/// Defaults to `:main`.
	pub target: Option<Target>,
	/// Rendered into when the server responds with an error status.
	pub fail_target: Option<String>,
	/// Inner HTML for fresh elements built from each step's selector.
	pub content: Option<String>,
	/// HTML containing the targeted elements.
	pub fragment: Option<String>,
	/// A full page containing the targeted elements.
	pub document: Option<String>,
	pub response: Option<Response>,
	pub url: Option<String>,
	pub method: Method,
	pub params: Vec<(String, String)>,
	pub headers: Vec<(String, String)>,
	pub layer: Option<LayerQuery>,
	pub origin: Option<NodeId>,
	pub match_policy: Option<MatchPolicy>,
	pub focus: Focus,
	pub scroll: Scroll,
	/// Overrides the targeted layer's history setting.
	pub history: Option<bool>,
	/// Whether a cached response may be used.
	pub cache: bool,
	pub revalidate: Option<Revalidate>,
	pub abort: Option<AbortPolicy>,
	pub transition: Option<Transition>,
	/// Whether keep negotiation happens. Also requires [`FragmentConfig::keep_enabled`](`crate::config::FragmentConfig::keep_enabled`).
	pub keep: bool,
	pub fallback: Option<Fallback>,
	/// Name of a cancellable guard event emitted before loading.
	pub guard_event: Option<String>,
	pub on_rendered: Option<RenderedCallback>,
	pub on_finished: Option<FinishedCallback>,
	pub on_offline: Option<ErrorCallback>,
	pub on_error: Option<ErrorCallback>,
}

impl Default for RenderOptions {
	fn default() -> Self {
		Self {
			target: None,
			fail_target: None,
			content: None,
			fragment: None,
			document: None,
			response: None,
			url: None,
			method: Method::Get,
			params: Vec::new(),
			headers: Vec::new(),
			layer: None,
			origin: None,
			match_policy: None,
			focus: Focus::None,
			scroll: Scroll::None,
			history: None,
			cache: false,
			revalidate: None,
			abort: None,
			transition: None,
			keep: true,
			fallback: None,
			guard_event: None,
			on_rendered: None,
			on_finished: None,
			on_offline: None,
			on_error: None,
		}
	}
}

impl fmt::Debug for RenderOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("RenderOptions");
		debug
			.field("target", &self.target)
			.field("fail_target", &self.fail_target)
			.field("url", &self.url)
			.field("method", &self.method)
			.field("layer", &self.layer)
			.field("origin", &self.origin)
			.field("cache", &self.cache)
			.field("keep", &self.keep);
		if cfg!(feature = "dangerous-logging") {
			debug.field("content", &self.content).field("fragment", &self.fragment).field("document", &self.document);
		}
		debug.finish_non_exhaustive()
	}
}

impl RenderOptions {
	pub fn new(target: impl Into<Target>) -> Self {
		Self { target: Some(target.into()), ..Self::default() }
	}

	#[must_use]
	pub fn content(mut self, content: impl Into<String>) -> Self {
		self.content = Some(content.into());
		self
	}

	#[must_use]
	pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
		self.fragment = Some(fragment.into());
		self
	}

	#[must_use]
	pub fn document(mut self, document: impl Into<String>) -> Self {
		self.document = Some(document.into());
		self
	}

	#[must_use]
	pub fn response(mut self, response: Response) -> Self {
		self.response = Some(response);
		self
	}

	#[must_use]
	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}

	#[must_use]
	pub fn fail_target(mut self, fail_target: impl Into<String>) -> Self {
		self.fail_target = Some(fail_target.into());
		self
	}

	#[must_use]
	pub fn layer(mut self, layer: impl Into<LayerQuery>) -> Self {
		self.layer = Some(layer.into());
		self
	}

	#[must_use]
	pub fn origin(mut self, origin: NodeId) -> Self {
		self.origin = Some(origin);
		self
	}

	#[must_use]
	pub fn cache(mut self, cache: bool) -> Self {
		self.cache = cache;
		self
	}

	#[must_use]
	pub fn transition(mut self, transition: Transition) -> Self {
		self.transition = Some(transition);
		self
	}

	#[must_use]
	pub fn fallback(mut self, fallback: impl Into<Fallback>) -> Self {
		self.fallback = Some(fallback.into());
		self
	}

	#[must_use]
	pub fn on_rendered(mut self, callback: impl Fn(&RenderResult) + 'static) -> Self {
		self.on_rendered = Some(Rc::new(callback));
		self
	}

	#[must_use]
	pub fn on_finished(mut self, callback: impl Fn(&Result<RenderResult, RenderError>) + 'static) -> Self {
		self.on_finished = Some(Rc::new(callback));
		self
	}

	#[must_use]
	pub fn on_offline(mut self, callback: impl Fn(&RenderError) + 'static) -> Self {
		self.on_offline = Some(Rc::new(callback));
		self
	}

	#[must_use]
	pub fn on_error(mut self, callback: impl Fn(&RenderError) + 'static) -> Self {
		self.on_error = Some(Rc::new(callback));
		self
	}

	pub(crate) fn query_options(&self) -> QueryOptions {
		QueryOptions { layer: self.layer.clone(), origin: self.origin, match_policy: self.match_policy }
	}

	/// How many content sources are given.
	pub(crate) fn source_count(&self) -> usize {
		[self.content.is_some(), self.fragment.is_some(), self.document.is_some(), self.response.is_some(), self.url.is_some()]
			.iter()
			.filter(|&&given| given)
			.count()
	}
}
