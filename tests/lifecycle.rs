use fragment_render::{error::LifecycleError, lifecycle::Destructor, Dom, Fragments, NodeId, RenderOptions};
use futures::executor::LocalPool;
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

mod fixture_;
use fixture_::{only, page};

type Log = Rc<RefCell<Vec<String>>>;

fn id(dom: &Dom, element: NodeId) -> String {
	dom.attribute(element, "id").unwrap_or("?").to_owned()
}

fn logging_compiler(engine: &Fragments, selector: &str, log: &Log) {
	let log = Rc::clone(log);
	engine
		.register_compiler(selector, move |dom, element, meta| {
			log.borrow_mut().push(format!("compile {} revalidating={}", id(dom, element), meta.revalidating));
			let log = Rc::clone(&log);
			let destructor: Destructor = Box::new(move |dom, element| {
				assert!(dom.is_attached(element));
				log.borrow_mut().push(format!("destroy {}", id(dom, element)));
				Ok(())
			});
			Ok(Some(destructor))
		})
		.unwrap();
}

#[test]
fn compile_and_destroy_in_document_order() {
	fixture_::init_logging();
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a"><p id="p1">1</p><p id="p2">2</p></div>"#), pool.spawner()).build();
	let log = Log::default();
	logging_compiler(&engine, "p", &log);

	engine.compile(engine.inspect(Dom::body));
	pool.run_until(engine.render(RenderOptions::new(".a").fragment(r#"<div class="a"><p id="p3">3</p></div>"#))).unwrap();

	assert_eq!(
		*log.borrow(),
		["compile p1 revalidating=false", "compile p2 revalidating=false", "destroy p1", "destroy p2", "compile p3 revalidating=false"]
	);
	assert!(engine.take_errors().is_empty());
}

#[test]
fn kept_elements_are_neither_destroyed_nor_recompiled() {
	let mut pool = LocalPool::new();
	let html = r#"<div class="a"><p id="k" up-keep>k</p><p id="x">x</p></div>"#;
	let engine = Fragments::builder(page(html), pool.spawner()).build();
	let log = Log::default();
	logging_compiler(&engine, "p", &log);

	engine.compile(engine.inspect(Dom::body));
	log.borrow_mut().clear();
	pool.run_until(engine.render(RenderOptions::new(".a").fragment(html))).unwrap();

	assert_eq!(*log.borrow(), ["destroy x", "compile x revalidating=false"]);
}

#[test]
fn failures_are_collected() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a">old</div>"#), pool.spawner()).build();
	engine.register_compiler(".a", |_, _, _| Err("boom".to_owned())).unwrap();
	assert!(engine.register_compiler("p[", |_, _, _| Ok(None)).is_err());

	let result = pool.run_until(engine.render(RenderOptions::new(".a").content("new"))).unwrap();
	let new = result.fragments[0];

	assert_eq!(engine.inspect(|dom| dom.text_content(only(dom, ".a"))), "new");
	assert_eq!(engine.take_errors(), [LifecycleError::Compile { selector: ".a".to_owned(), element: new, message: "boom".to_owned() }]);
	assert!(engine.take_errors().is_empty());
}

#[test]
fn steps_whose_target_vanished_mid_swap_are_skipped() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a">a</div><div class="b">b</div>"#), pool.spawner()).build();
	engine
		.register_compiler(".a", |dom, _, _| {
			let b = only(dom, ".b");
			dom.remove(b);
			Ok(None)
		})
		.unwrap();
	let rendered = Rc::new(Cell::new(0));

	let options = RenderOptions::new(".a, .b").content("new").on_rendered({
		let rendered = Rc::clone(&rendered);
		move |_| rendered.set(rendered.get() + 1)
	});
	let result = pool.run_until(engine.render(options)).unwrap();

	assert_eq!(result.fragments.len(), 1);
	assert_eq!(engine.inspect(|dom| dom.inner_html(dom.body())), r#"<div class="a">new</div>"#);
	assert_eq!(rendered.get(), 1);
	assert!(engine.take_errors().is_empty());
}

#[test]
fn detached_elements_lose_their_destructors() {
	let mut pool = LocalPool::new();
	let engine = Fragments::builder(page(r#"<div class="a"><p id="p1">1</p><p id="p2">2</p></div>"#), pool.spawner()).build();
	let log = Log::default();
	logging_compiler(&engine, "p", &log);
	engine.compile(engine.inspect(Dom::body));
	let registered = Rc::strong_count(&log);

	engine.mutate(|dom| {
		let p1 = only(dom, "#p1");
		dom.remove(p1);
		dom.free(p1);
	});
	assert_eq!(Rc::strong_count(&log), registered - 1);

	pool.run_until(engine.render(RenderOptions::new(".a").content("new"))).unwrap();
	assert_eq!(*log.borrow(), ["compile p1 revalidating=false", "compile p2 revalidating=false", "destroy p2"]);
	assert_eq!(Rc::strong_count(&log), registered - 2);
}
