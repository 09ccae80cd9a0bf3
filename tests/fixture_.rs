#![allow(dead_code)]

use fragment_render::{
	collaborators::{Animator, CacheKey, CacheLookup, Network, Request, Response, RevealOptions, Transition, TransportError, Viewport},
	load::load_live_document,
	Dom, NodeId,
};
use futures::{
	channel::oneshot,
	future::{self, FutureExt as _, LocalBoxFuture},
};
use std::{
	cell::{Cell, RefCell},
	collections::HashMap,
	rc::Rc,
};

pub fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();
}

/// A live document with `body` as the body's inner HTML.
pub fn page(body: &str) -> Dom {
	let mut dom = Dom::new();
	load_live_document(&mut dom, &format!("<html><head><title>Page</title></head><body>{}</body></html>", body)).unwrap();
	dom
}

type Reply = oneshot::Sender<Result<Response, TransportError>>;

#[derive(Default)]
struct NetworkState {
	requests: Vec<Request>,
	replies: Vec<Option<Reply>>,
	cache: HashMap<String, CacheLookup>,
}

/// Records requests and answers them only when told to.
#[derive(Clone, Default)]
pub struct ScriptedNetwork {
	state: Rc<RefCell<NetworkState>>,
}

impl ScriptedNetwork {
	pub fn requests(&self) -> Vec<Request> {
		self.state.borrow().requests.clone()
	}

	pub fn cache(&self, url: &str, lookup: CacheLookup) {
		self.state.borrow_mut().cache.insert(url.to_owned(), lookup);
	}

	/// Answers request `index`. `false` iff the request was dropped (aborted) before.
	pub fn respond(&self, index: usize, response: Response) -> bool {
		self.reply(index, Ok(response))
	}

	pub fn fail(&self, index: usize, message: &str) -> bool {
		self.reply(index, Err(TransportError(message.to_owned())))
	}

	fn reply(&self, index: usize, reply: Result<Response, TransportError>) -> bool {
		let sender = self.state.borrow_mut().replies[index].take().expect("already answered");
		sender.send(reply).is_ok()
	}
}

impl Network for ScriptedNetwork {
	fn load(&self, request: Request) -> LocalBoxFuture<'static, Result<Response, TransportError>> {
		let (sender, receiver) = oneshot::channel();
		let mut state = self.state.borrow_mut();
		state.requests.push(request);
		state.replies.push(Some(sender));
		async move { receiver.await.unwrap_or_else(|_| Err(TransportError("never answered".to_owned()))) }.boxed_local()
	}

	fn lookup(&self, key: &CacheKey) -> CacheLookup {
		self.state.borrow().cache.get(&key.url).cloned().unwrap_or(CacheLookup::Miss)
	}
}

#[derive(Clone, Default)]
pub struct RecordingViewport {
	pub focused: Rc<Cell<Option<NodeId>>>,
	pub history: Rc<RefCell<Vec<(String, Option<String>)>>>,
}

impl Viewport for RecordingViewport {
	fn focused(&self) -> Option<NodeId> {
		self.focused.get()
	}

	fn focus(&self, element: NodeId) {
		self.focused.set(Some(element));
	}

	fn push_history(&self, url: &str, title: Option<&str>) {
		self.history.borrow_mut().push((url.to_owned(), title.map(str::to_owned)));
	}
}

/// The only element matching `selector` in the live document.
pub fn only(dom: &Dom, selector: &str) -> NodeId {
	let found = fragment_render::selector::Selector::parse(selector).unwrap().select(dom, dom.document());
	assert_eq!(found.len(), 1, "expected exactly one {:?}", selector);
	found[0]
}

/// Runs transitions until told to complete them.
#[derive(Clone, Default)]
pub struct ManualAnimator {
	running: Rc<RefCell<Vec<oneshot::Sender<()>>>>,
}

impl ManualAnimator {
	pub fn complete_all(&self) {
		for sender in self.running.borrow_mut().drain(..) {
			let _ = sender.send(());
		}
	}
}

impl Animator for ManualAnimator {
	fn transition(&self, _old: NodeId, _new: NodeId, _transition: &Transition) -> LocalBoxFuture<'static, ()> {
		let (sender, receiver) = oneshot::channel();
		self.running.borrow_mut().push(sender);
		receiver.map(|_| ()).boxed_local()
	}

	fn reveal(&self, _element: NodeId, _options: RevealOptions) -> LocalBoxFuture<'static, ()> {
		future::ready(()).boxed_local()
	}
}
