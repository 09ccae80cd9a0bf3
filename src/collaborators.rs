//! Narrow contracts to the subsystems a render call consumes but doesn't own: Network and cache,
//! animation, focus/history and document parsing.
//!
//! Every trait comes with an inert default so that purely local rendering works without setup.

use crate::{
	dom::NodeId,
	error::ParseError,
	html::{self, ParsedDocument},
	layer::{LayerId, LayerMode},
};
use core::time::Duration;
use futures::future::{self, FutureExt as _, LocalBoxFuture};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
	Get,
	Post,
	Put,
	Patch,
	Delete,
}

impl Method {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
		}
	}

	/// Only safe requests may be served from a cache.
	#[must_use]
	pub fn is_safe(self) -> bool {
		self == Self::Get
	}
}

impl Default for Method {
	fn default() -> Self {
		Self::Get
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	pub url: String,
	pub method: Method,
	pub params: Vec<(String, String)>,
	pub headers: Vec<(String, String)>,
	/// The target the success response will be rendered into.
	pub target: String,
	pub fail_target: Option<String>,
	pub layer: LayerId,
	pub mode: LayerMode,
	/// Set for the second round-trip that verifies a stale cache hit.
	pub revalidating: bool,
}

impl Request {
	#[must_use]
	pub fn cache_key(&self) -> CacheKey {
		CacheKey { url: self.url.clone(), target: self.target.clone(), layer: self.layer }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
	pub url: String,
	pub status: u16,
	pub text: String,
	pub headers: Vec<(String, String)>,
}

impl Response {
	pub fn new(status: u16, text: impl Into<String>) -> Self {
		Self { url: String::new(), status, text: text.into(), headers: Vec::new() }
	}

	#[must_use]
	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}

	#[must_use]
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	/// Case-insensitive header lookup.
	#[must_use]
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	#[must_use]
	pub fn ok(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// `304 Not Modified`, or an empty `204` during revalidation.
	#[must_use]
	pub fn not_modified(&self) -> bool {
		self.status == 304 || (self.status == 204 && self.text.is_empty())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub url: String,
	pub target: String,
	pub layer: LayerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
	Miss,
	Fresh(Response),
	/// Usable for an immediate render, but should be revalidated.
	Stale(Response),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

pub trait Network {
	/// Starts loading `request`. Dropping the returned future cancels the request.
	fn load(&self, request: Request) -> LocalBoxFuture<'static, Result<Response, TransportError>>;

	fn lookup(&self, _key: &CacheKey) -> CacheLookup {
		CacheLookup::Miss
	}
}

/// A network without connectivity. Every request fails with a [`TransportError`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

impl Network for Disconnected {
	fn load(&self, request: Request) -> LocalBoxFuture<'static, Result<Response, TransportError>> {
		future::ready(Err(TransportError(format!("no network to load {} {}", request.method.as_str(), request.url)))).boxed_local()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
	pub name: String,
	pub duration: Duration,
}

impl Transition {
	pub fn new(name: impl Into<String>, duration: Duration) -> Self {
		Self { name: name.into(), duration }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevealOptions {
	/// Scroll so that the element is at the top of the viewport.
	pub top: bool,
}

pub trait Animator {
	/// Animates from `old` to `new`. Both are attached while the returned future is pending.
	fn transition(&self, old: NodeId, new: NodeId, transition: &Transition) -> LocalBoxFuture<'static, ()>;

	/// Scrolls `element` into view.
	fn reveal(&self, element: NodeId, options: RevealOptions) -> LocalBoxFuture<'static, ()>;
}

/// Completes every animation immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnimation;

impl Animator for NoAnimation {
	fn transition(&self, _old: NodeId, _new: NodeId, _transition: &Transition) -> LocalBoxFuture<'static, ()> {
		future::ready(()).boxed_local()
	}

	fn reveal(&self, _element: NodeId, _options: RevealOptions) -> LocalBoxFuture<'static, ()> {
		future::ready(()).boxed_local()
	}
}

/// Focus and history bookkeeping.
pub trait Viewport {
	/// The currently focused element, if known.
	fn focused(&self) -> Option<NodeId> {
		None
	}

	fn focus(&self, _element: NodeId) {}

	fn push_history(&self, _url: &str, _title: Option<&str>) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl Viewport for Headless {}

pub trait DocumentParser {
	/// # Errors
	///
	/// Iff `html` can't be parsed.
	fn parse(&self, html: &str) -> Result<ParsedDocument, ParseError>;
}

/// Uses [`html::parse`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicParser;

impl DocumentParser for BasicParser {
	fn parse(&self, html: &str) -> Result<ParsedDocument, ParseError> {
		html::parse(html)
	}
}
