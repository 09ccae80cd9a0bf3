use fragment_render::{
	collaborators::{CacheLookup, Response, Transition},
	config::Revalidate,
	events::Notification,
	Fragments, RenderError, RenderOptions,
};
use futures::executor::LocalPool;
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
	time::Duration,
};

mod fixture_;
use fixture_::{only, page, ManualAnimator, ScriptedNetwork};

fn cached(text: &str) -> Response {
	Response::new(200, format!(r#"<div class="a">{}</div>"#, text)).with_url("/a").with_header("ETag", "\"v1\"")
}

fn setup() -> (LocalPool, ScriptedNetwork, Fragments) {
	fixture_::init_logging();
	let pool = LocalPool::new();
	let network = ScriptedNetwork::default();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner()).network(network.clone()).build();
	(pool, network, engine)
}

fn text_of(engine: &Fragments) -> String {
	engine.inspect(|dom| dom.text_content(only(dom, ".a")))
}

#[test]
fn not_modified_keeps_the_cached_render() {
	let (mut pool, network, engine) = setup();
	network.cache("/a", CacheLookup::Stale(cached("cached")));

	let handle = engine.render(RenderOptions::new(".a").url("/a").cache(true));
	let finished = handle.finished();
	let rendered = pool.run_until(handle).unwrap();
	assert_eq!(text_of(&engine), "cached");

	pool.run_until_stalled();
	let requests = network.requests();
	assert_eq!(requests.len(), 1);
	assert!(requests[0].revalidating);
	assert!(requests[0].headers.contains(&("If-None-Match".to_owned(), "\"v1\"".to_owned())));

	network.respond(0, Response::new(304, ""));
	let finished = pool.run_until(finished).unwrap();

	assert_eq!(finished.fragments, rendered.fragments);
	assert_eq!(text_of(&engine), "cached");
}

#[test]
fn changed_content_renders_again() {
	let (mut pool, network, engine) = setup();
	network.cache("/a", CacheLookup::Stale(cached("cached")));
	let renders = Rc::new(RefCell::new(Vec::new()));
	let finishes = Rc::new(Cell::new(0));
	let revalidated = Rc::new(RefCell::new(Vec::new()));
	engine.events(|bus| {
		let revalidated = Rc::clone(&revalidated);
		bus.on_notification(move |notification| {
			if let Notification::Rendered { revalidated: flag, .. } = notification {
				revalidated.borrow_mut().push(*flag);
			}
		});
	});

	let options = RenderOptions::new(".a")
		.url("/a")
		.cache(true)
		.on_rendered({
			let renders = Rc::clone(&renders);
			move |result| renders.borrow_mut().push(result.fragments.clone())
		})
		.on_finished({
			let finishes = Rc::clone(&finishes);
			move |_| finishes.set(finishes.get() + 1)
		});
	let handle = engine.render(options);
	let finished = handle.finished();
	let rendered = pool.run_until(handle).unwrap();
	pool.run_until_stalled();

	network.respond(0, Response::new(200, r#"<div class="a">fresh</div>"#).with_url("/a"));
	let finished = pool.run_until(finished).unwrap();

	assert_ne!(finished.fragments, rendered.fragments);
	assert_eq!(text_of(&engine), "fresh");
	assert_eq!(*renders.borrow(), [rendered.fragments.clone(), finished.fragments.clone()]);
	assert_eq!(*revalidated.borrow(), [false, true]);
	pool.run_until_stalled();
	assert_eq!(finishes.get(), 1);
}

#[test]
fn newer_renders_abort_a_pending_revalidation() {
	let (mut pool, network, engine) = setup();
	network.cache("/a", CacheLookup::Stale(cached("cached")));

	let handle = engine.render(RenderOptions::new(".a").url("/a").cache(true));
	let finished = handle.finished();
	pool.run_until(handle).unwrap();
	pool.run_until_stalled();
	assert_eq!(network.requests().len(), 1);
	assert_eq!(engine.in_flight(), 1);

	pool.run_until(engine.render(RenderOptions::new(".a").content("newer"))).unwrap();
	assert_eq!(engine.in_flight(), 0);
	pool.run_until_stalled();
	assert!(!network.respond(0, Response::new(200, r#"<div class="a">revalidated</div>"#)));

	let error = pool.run_until(finished).unwrap_err();
	assert!(error.is_aborted(), "{:?}", error);
	assert_eq!(text_of(&engine), "newer");
}

#[test]
fn revalidation_waits_for_the_transition() {
	fixture_::init_logging();
	let mut pool = LocalPool::new();
	let network = ScriptedNetwork::default();
	let animator = ManualAnimator::default();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner())
		.network(network.clone())
		.animator(animator.clone())
		.build();
	network.cache("/a", CacheLookup::Stale(cached("cached")));

	let options = RenderOptions::new(".a").url("/a").cache(true).transition(Transition::new("fade", Duration::from_millis(10)));
	let handle = engine.render(options);
	let finished = handle.finished();
	pool.run_until(handle).unwrap();
	pool.run_until_stalled();
	assert!(network.requests().is_empty());

	animator.complete_all();
	pool.run_until_stalled();
	assert_eq!(network.requests().len(), 1);
	assert!(network.requests()[0].revalidating);

	network.respond(0, Response::new(304, ""));
	assert!(pool.run_until(finished).is_ok());
	assert_eq!(text_of(&engine), "cached");
}

#[test]
fn transitions_in_progress_do_not_shield_the_revalidation() {
	let mut pool = LocalPool::new();
	let network = ScriptedNetwork::default();
	let animator = ManualAnimator::default();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner())
		.network(network.clone())
		.animator(animator.clone())
		.build();
	network.cache("/a", CacheLookup::Stale(cached("cached")));

	let options = RenderOptions::new(".a").url("/a").cache(true).transition(Transition::new("fade", Duration::from_millis(10)));
	let handle = engine.render(options);
	let finished = handle.finished();
	pool.run_until(handle).unwrap();

	pool.run_until(engine.render(RenderOptions::new(".a").content("newer"))).unwrap();
	animator.complete_all();

	assert!(pool.run_until(finished).unwrap_err().is_aborted());
	assert!(network.requests().is_empty());
	assert_eq!(text_of(&engine), "newer");
}

#[test]
fn failed_revalidation_only_rejects_finished() {
	let (mut pool, network, engine) = setup();
	network.cache("/a", CacheLookup::Stale(cached("cached")));

	let handle = engine.render(RenderOptions::new(".a").url("/a").cache(true));
	let finished = handle.finished();
	assert!(pool.run_until(handle).is_ok());
	pool.run_until_stalled();
	network.fail(0, "offline");

	assert_eq!(pool.run_until(finished).unwrap_err(), RenderError::Offline("offline".to_owned()));
	assert_eq!(text_of(&engine), "cached");
}

#[test]
fn fresh_hits_and_disabled_revalidation_skip_the_network() {
	let (mut pool, network, engine) = setup();

	network.cache("/a", CacheLookup::Fresh(cached("fresh")));
	let handle = engine.render(RenderOptions::new(".a").url("/a").cache(true));
	let finished = handle.finished();
	pool.run_until(handle).unwrap();
	pool.run_until(finished).unwrap();

	network.cache("/a", CacheLookup::Stale(cached("stale")));
	let options = RenderOptions { revalidate: Some(Revalidate::Never), ..RenderOptions::new(".a").url("/a").cache(true) };
	let handle = engine.render(options);
	let finished = handle.finished();
	pool.run_until(handle).unwrap();
	pool.run_until(finished).unwrap();

	assert_eq!(text_of(&engine), "stale");
	assert!(network.requests().is_empty());
}

#[test]
fn uncached_renders_ignore_the_cache() {
	let (mut pool, network, engine) = setup();
	network.cache("/a", CacheLookup::Fresh(cached("cached")));

	let handle = engine.render(RenderOptions::new(".a").url("/a"));
	assert_eq!(network.requests().len(), 1);
	network.respond(0, Response::new(200, r#"<div class="a">loaded</div>"#));
	pool.run_until(handle).unwrap();

	assert_eq!(text_of(&engine), "loaded");
}
