use fragment_render::{
	collaborators::{Method, Response},
	events::Veto,
	AbortScope, Fragments, RenderError, RenderOptions,
};
use futures::executor::LocalPool;
use std::{cell::Cell, rc::Rc};

mod fixture_;
use fixture_::{only, page, ScriptedNetwork};

fn setup(body: &str) -> (LocalPool, ScriptedNetwork, Fragments) {
	fixture_::init_logging();
	let pool = LocalPool::new();
	let network = ScriptedNetwork::default();
	let engine = Fragments::builder(page(body), pool.spawner()).network(network.clone()).build();
	(pool, network, engine)
}

fn text_of(engine: &Fragments, selector: &str) -> String {
	engine.inspect(|dom| dom.text_content(only(dom, selector)))
}

#[test]
fn requests_carry_the_target() {
	let (mut pool, network, engine) = setup(r#"<div class="a">old</div>"#);

	let handle = engine.render(RenderOptions::new(".a").url("/a").fail_target(".a"));
	assert_eq!(engine.in_flight(), 1);

	let request = &network.requests()[0];
	assert_eq!(request.url, "/a");
	assert_eq!(request.method, Method::Get);
	assert!(!request.revalidating);
	for header in [("X-Up-Target", ".a"), ("X-Up-Fail-Target", ".a"), ("X-Up-Mode", "root")] {
		assert!(request.headers.iter().any(|(n, v)| (n.as_str(), v.as_str()) == header), "missing {:?}", header);
	}

	assert!(network.respond(0, Response::new(200, r#"<div class="a">new</div>"#).with_url("/a")));
	let result = pool.run_until(handle).unwrap();

	assert_eq!(result.fragments.len(), 1);
	assert_eq!(text_of(&engine, ".a"), "new");
	assert_eq!(engine.in_flight(), 0);
}

#[test]
fn newer_renders_abort_competing_requests() {
	let (mut pool, network, engine) = setup(r#"<div class="a">old</div><div class="b">b</div>"#);

	let first = engine.render(RenderOptions::new(".a").url("/1"));
	let unrelated = engine.render(RenderOptions::new(".b").url("/b"));
	let second = engine.render(RenderOptions::new(".a").url("/2"));
	assert_eq!(engine.in_flight(), 2);

	let error = pool.run_until(first).unwrap_err();
	assert!(error.is_aborted(), "{:?}", error);
	assert!(!network.respond(0, Response::new(200, r#"<div class="a">first</div>"#)));

	assert!(network.respond(1, Response::new(200, r#"<div class="b">B</div>"#)));
	assert!(network.respond(2, Response::new(200, r#"<div class="a">second</div>"#)));
	pool.run_until(second).unwrap();
	pool.run_until(unrelated).unwrap();

	assert_eq!(text_of(&engine, ".a"), "second");
	assert_eq!(text_of(&engine, ".b"), "B");
}

#[test]
fn host_abort() {
	let (mut pool, _network, engine) = setup(r#"<div class="a">old</div>"#);

	let handle = engine.render(RenderOptions::new(".a").url("/a"));
	let finished = handle.finished();
	assert_eq!(engine.abort(AbortScope::All), 1);

	let expected = RenderError::Aborted { reason: "aborted by host".to_owned() };
	assert_eq!(pool.run_until(handle).unwrap_err(), expected);
	assert_eq!(pool.run_until(finished).unwrap_err(), expected);
	assert_eq!(text_of(&engine, ".a"), "old");
}

#[test]
fn offline() {
	let (mut pool, network, engine) = setup(r#"<div class="a">old</div>"#);
	let offline_calls = Rc::new(Cell::new(0));
	let error_calls = Rc::new(Cell::new(0));

	let options = RenderOptions::new(".a")
		.url("/a")
		.on_offline({
			let offline_calls = Rc::clone(&offline_calls);
			move |_| offline_calls.set(offline_calls.get() + 1)
		})
		.on_error({
			let error_calls = Rc::clone(&error_calls);
			move |_| error_calls.set(error_calls.get() + 1)
		});
	let handle = engine.render(options);
	network.fail(0, "timed out");

	assert_eq!(pool.run_until(handle).unwrap_err(), RenderError::Offline("timed out".to_owned()));
	assert_eq!((offline_calls.get(), error_calls.get()), (1, 0));
}

#[test]
fn error_responses() {
	let (mut pool, network, engine) = setup(r#"<div class="a">old</div><div class="errors"></div>"#);

	let handle = engine.render(RenderOptions::new(".a").url("/a"));
	network.respond(0, Response::new(500, r#"<div class="a">oops</div>"#));
	assert_eq!(pool.run_until(handle).unwrap_err(), RenderError::ServerError { status: 500 });
	assert_eq!(text_of(&engine, ".a"), "old");

	let handle = engine.render(RenderOptions::new(".a").url("/a").fail_target(".errors"));
	network.respond(1, Response::new(422, r#"<div class="errors">invalid</div>"#));
	assert_eq!(pool.run_until(handle).unwrap_err(), RenderError::ServerError { status: 422 });
	assert_eq!(text_of(&engine, ".errors"), "invalid");
	assert_eq!(text_of(&engine, ".a"), "old");
}

#[test]
fn fallback_after_the_request() {
	let (mut pool, network, engine) = setup(r#"<div class="a">old</div><main>main</main>"#);

	let handle = engine.render(RenderOptions::new(".a").url("/a").fallback(true));
	network.respond(0, Response::new(200, "<main>fresh</main>"));
	let result = pool.run_until(handle).unwrap();

	assert_eq!(result.target, "main");
	assert_eq!(text_of(&engine, "main"), "fresh");
	assert_eq!(text_of(&engine, ".a"), "old");
}

#[test]
fn vetoed_loads_never_reach_the_network() {
	let (mut pool, network, engine) = setup(r#"<div class="a">old</div>"#);
	engine.events(|bus| bus.on_loading(|event| if event.url() == Some("/private") { Err(Veto::new("forbidden")) } else { Ok(()) }));

	let error = pool.run_until(engine.render(RenderOptions::new(".a").url("/private"))).unwrap_err();

	assert_eq!(error, RenderError::Aborted { reason: "forbidden".to_owned() });
	assert!(network.requests().is_empty());
}

#[test]
fn jobs_settle_when_the_executor_is_gone() {
	fixture_::init_logging();
	let spawner = LocalPool::new().spawner();
	let network = ScriptedNetwork::default();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), spawner).network(network).build();
	let (finishes, errors) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));

	let options = RenderOptions::new(".a")
		.url("/a")
		.on_finished({
			let finishes = Rc::clone(&finishes);
			move |_| finishes.set(finishes.get() + 1)
		})
		.on_error({
			let errors = Rc::clone(&errors);
			move |_| errors.set(errors.get() + 1)
		});
	let handle = engine.render(options);
	let finished = handle.finished();

	let aborted = RenderError::Aborted { reason: "render job dropped".to_owned() };
	assert_eq!(futures::executor::block_on(handle).unwrap_err(), aborted);
	assert_eq!(futures::executor::block_on(finished).unwrap_err(), aborted);
	assert_eq!((finishes.get(), errors.get()), (1, 1));
	assert_eq!(engine.in_flight(), 0);
	assert_eq!(text_of(&engine, ".a"), "old");
}
