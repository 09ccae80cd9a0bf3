use fragment_render::{
	collaborators::{Response, Transition},
	events::{Notification, Veto},
	Focus, Fragments, LayerId, RenderError, RenderOptions,
};
use futures::executor::LocalPool;
use std::{cell::RefCell, rc::Rc, time::Duration};

mod fixture_;
use fixture_::{only, page, ManualAnimator, RecordingViewport};

fn text_of(engine: &Fragments, selector: &str) -> String {
	engine.inspect(|dom| dom.text_content(only(dom, selector)))
}

#[test]
fn content_replaces_the_target() {
	fixture_::init_logging();
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a">old</div><div class="b">b</div>"#), pool.spawner()).build();
	let old = engine.inspect(|dom| only(dom, ".a"));

	let result = pool.run_until(engine.render(RenderOptions::new(".a").content("new"))).unwrap();

	assert!(result.ok);
	assert_eq!(result.target, ".a");
	assert_eq!(result.layer, LayerId::ROOT);
	assert_eq!(text_of(&engine, ".a"), "new");
	assert_eq!(text_of(&engine, ".b"), "b");
	assert_eq!(result.fragments, [engine.inspect(|dom| only(dom, ".a"))]);
	engine.inspect(|dom| assert!(!dom.is_attached(old)));
}

#[test]
fn content_placement_keeps_the_element() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a"><b>old</b></div>"#), pool.spawner()).build();
	let old = engine.inspect(|dom| only(dom, ".a"));

	let result = pool.run_until(engine.render(RenderOptions::new(".a:content").fragment(r#"<div class="a"><i>new</i></div>"#))).unwrap();

	assert_eq!(result.fragments, [old]);
	engine.inspect(|dom| {
		assert!(dom.is_attached(old));
		assert_eq!(dom.inner_html(old), "<i>new</i>");
	});
}

#[test]
fn union_targets_and_optional_steps() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a">1</div><div class="b">2</div>"#), pool.spawner()).build();

	let result = pool
		.run_until(engine.render(RenderOptions::new(".a, .b, .c:maybe").fragment(r#"<div class="b">B</div><div class="a">A</div><div class="c">C</div>"#)))
		.unwrap();

	assert_eq!(result.fragments.len(), 2);
	assert_eq!(engine.inspect(|dom| dom.text_content(dom.body())), "AB");
}

#[test]
fn insertion_before_and_after() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<ul class="list"><li>1</li></ul>"#), pool.spawner()).build();

	pool.run_until(engine.render(RenderOptions::new(".list:after").fragment(r#"<ul class="list"><li>2</li></ul>"#))).unwrap();
	pool.run_until(engine.render(RenderOptions::new(".list:before").fragment(r#"<ul class="list">a<li>b</li></ul>"#))).unwrap();

	assert_eq!(text_of(&engine, ".list"), "ab12");
	engine.inspect(|dom| assert!(fragment_render::selector::Selector::parse("up-wrapper").unwrap().select(dom, dom.document()).is_empty()));
}

#[test]
fn unmatched_targets() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner()).build();
	let errors = Rc::new(RefCell::new(Vec::new()));

	let options = RenderOptions::new(".missing").content("x").on_error({
		let errors = Rc::clone(&errors);
		move |error| errors.borrow_mut().push(error.clone())
	});
	let error = pool.run_until(engine.render(options)).unwrap_err();

	assert_eq!(error, RenderError::CannotMatch { target: ".missing".to_owned() });
	assert_eq!(*errors.borrow(), [error]);

	let error = pool.run_until(engine.render(RenderOptions::new(".a, .missing").content("x"))).unwrap_err();
	assert!(matches!(error, RenderError::CannotMatch { .. }));
	assert_eq!(text_of(&engine, ".a"), "old");
}

#[test]
fn fallback_to_main_targets() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page("<main>old</main>"), pool.spawner()).build();

	let result = pool.run_until(engine.render(RenderOptions::new(".missing").fallback(true).fragment("<main>new</main>"))).unwrap();

	assert_eq!(result.target, "main");
	assert_eq!(text_of(&engine, "main"), "new");
}

#[test]
fn main_target_is_pinned_for_the_new_content() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div up-main>old</div><main>untouched</main>"#), pool.spawner()).build();

	let result = pool.run_until(engine.render(RenderOptions::default().fragment(r#"<main>wrong</main><div up-main>new</div>"#))).unwrap();

	assert_eq!(result.target, ":main");
	assert_eq!(text_of(&engine, "[up-main]"), "new");
	assert_eq!(text_of(&engine, "main"), "untouched");
}

#[test]
fn invalid_options() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner()).build();

	let none = pool.run_until(engine.render(RenderOptions::new(".a")));
	let two = pool.run_until(engine.render(RenderOptions::new(".a").content("x").url("/x")));

	assert!(matches!(none, Err(RenderError::InvalidOptions(_))));
	assert!(matches!(two, Err(RenderError::InvalidOptions(_))));
}

#[test]
fn element_targets() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<p id="x">old</p><p>other</p>"#), pool.spawner()).build();
	let old = engine.inspect(|dom| only(dom, "#x"));

	let result = pool.run_until(engine.render(RenderOptions::new(old).fragment(r#"<p id="x">new</p>"#))).unwrap();

	assert_eq!(result.target, "#x");
	assert_eq!(text_of(&engine, "#x"), "new");
}

#[test]
fn notifications_follow_mutations() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner()).build();
	let old = engine.inspect(|dom| only(dom, ".a"));
	let seen = Rc::new(RefCell::new(Vec::new()));
	engine.events(|bus| {
		let seen = Rc::clone(&seen);
		bus.on_notification(move |notification| seen.borrow_mut().push(notification.clone()));
	});

	let result = pool.run_until(engine.render(RenderOptions::new(".a").content("new"))).unwrap();
	let new = result.fragments[0];

	assert_eq!(
		*seen.borrow(),
		[
			Notification::Destroyed { element: old },
			Notification::Inserted { element: new, layer: Some(LayerId::ROOT) },
			Notification::Rendered { target: ".a".to_owned(), fragments: vec![new], revalidated: false },
		]
	);
}

#[test]
fn guard_and_loading_hooks() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a">a</div><div class="b">b</div>"#), pool.spawner()).build();
	engine.events(|bus| {
		bus.on_guard(|event| if event.name == "follow" { Err(Veto::new("not now")) } else { Ok(()) });
		bus.on_loading(|event| {
			if event.target == ".a" {
				event.target = ".b".to_owned();
			}
			Ok(())
		});
	});

	let vetoed = RenderOptions { guard_event: Some("follow".to_owned()), ..RenderOptions::new(".a").content("x") };
	assert_eq!(pool.run_until(engine.render(vetoed)).unwrap_err(), RenderError::Aborted { reason: "not now".to_owned() });

	let result = pool.run_until(engine.render(RenderOptions::new(".a").content("x"))).unwrap();
	assert_eq!(result.target, ".b");
	assert_eq!(text_of(&engine, ".a"), "a");
	assert_eq!(text_of(&engine, ".b"), "x");
}

#[test]
fn focus_and_history() {
	let mut pool = LocalPool::new();
	let viewport = RecordingViewport::default();
	let engine = Fragments::builder(page(r#"<main><input id="q"></main>"#), pool.spawner()).viewport(viewport.clone()).build();

	let response = Response::new(200, r#"<html><head><title>Next</title></head><body><main><input id="q"><button autofocus>go</button></main></body></html>"#)
		.with_url("/next");
	let options = RenderOptions { focus: Focus::Autofocus, ..RenderOptions::new("main").response(response) };
	pool.run_until(engine.render(options)).unwrap();

	assert_eq!(viewport.focused.get(), Some(engine.inspect(|dom| only(dom, "button"))));
	assert_eq!(*viewport.history.borrow(), [("/next".to_owned(), Some("Next".to_owned()))]);

	let input = engine.inspect(|dom| only(dom, "#q"));
	viewport.focused.set(Some(input));
	let options = RenderOptions { focus: Focus::Keep, history: Some(false), ..RenderOptions::new("main").fragment(r#"<main><input id="q"></main>"#) };
	pool.run_until(engine.render(options)).unwrap();

	let new_input = engine.inspect(|dom| only(dom, "#q"));
	assert_ne!(new_input, input);
	assert_eq!(viewport.focused.get(), Some(new_input));
	assert_eq!(viewport.history.borrow().len(), 1);
}

#[test]
fn transitions_delay_the_removal() {
	let mut pool = LocalPool::new();
	let animator = ManualAnimator::default();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner()).animator(animator.clone()).build();
	let old = engine.inspect(|dom| only(dom, ".a"));

	let handle = engine.render(RenderOptions::new(".a").content("new").transition(Transition::new("cross-fade", Duration::from_millis(100))));
	let finished = handle.finished();
	let rendered = pool.run_until(handle).unwrap();
	pool.run_until_stalled();

	engine.inspect(|dom| {
		assert!(dom.is_attached(old));
		assert!(dom.is_attached(rendered.fragments[0]));
	});
	assert_eq!(engine.all(".a", &Default::default()).unwrap(), rendered.fragments);

	animator.complete_all();
	let finished = pool.run_until(finished).unwrap();

	assert_eq!(finished.fragments, rendered.fragments);
	engine.inspect(|dom| assert!(!dom.is_attached(old)));
}

#[test]
fn on_finished_fires_once_per_call() {
	let mut pool = LocalPool::new();
	let animator = ManualAnimator::default();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner()).animator(animator.clone()).build();
	let calls = Rc::new(RefCell::new(Vec::new()));
	let options = |target: &str| {
		let calls = Rc::clone(&calls);
		RenderOptions::new(target)
			.content("new")
			.transition(Transition::new("fade", Duration::from_millis(10)))
			.on_finished(move |outcome| calls.borrow_mut().push(outcome.is_ok()))
	};

	let handle = engine.render(options(".a"));
	let finished = handle.finished();
	pool.run_until(handle).unwrap();
	pool.run_until_stalled();
	assert!(calls.borrow().is_empty());

	animator.complete_all();
	pool.run_until(finished).unwrap();
	pool.run_until_stalled();
	assert_eq!(*calls.borrow(), [true]);

	assert!(pool.run_until(engine.render(options(".missing"))).is_err());
	pool.run_until_stalled();
	assert_eq!(*calls.borrow(), [true, false]);
}

#[test]
fn replaced_content_is_freed() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a"><p>old</p></div>"#), pool.spawner()).build();
	let old = engine.inspect(|dom| only(dom, "p"));

	let mut render = |text: &str| {
		let options = RenderOptions::new(".a").fragment(format!(r#"<section><div class="a"><p>{}</p></div></section>"#, text));
		pool.run_until(engine.render(options)).unwrap();
	};
	render("first");
	let baseline = engine.inspect(|dom| dom.node_count());
	for i in 0..10 {
		render(&i.to_string());
	}

	engine.inspect(|dom| {
		assert_eq!(dom.node_count(), baseline);
		assert!(!dom.contains_node(old));
		assert_eq!(dom.text_content(only(dom, "p")), "9");
	});
}
