use fragment_render::{config::MatchPolicy, resolve::origin_distance, Fragments, LayerId, LayerMode, QueryOptions, RenderError, Target};
use futures::executor::LocalPool;

mod fixture_;
use fixture_::{only, page};

const CARDS: &str = r#"<div class="card" id="c1"><a class="btn" id="b1">1</a></div><div class="card" id="c2"><p><a class="btn" id="b2">2</a></p></div>"#;

#[test]
fn origin_region_preference() {
	fixture_::init_logging();
	let pool = LocalPool::new();
	let engine = Fragments::builder(page(CARDS), pool.spawner()).build();
	let (c1, c2, b2) = engine.inspect(|dom| (only(dom, "#c1"), only(dom, "#c2"), only(dom, "#b2")));

	let near_b2 = QueryOptions::default().origin(b2);
	assert_eq!(engine.get(".card", &near_b2).unwrap(), Some(c2));
	assert_eq!(engine.get(".card", &near_b2.clone().match_policy(MatchPolicy::First)).unwrap(), Some(c1));
	assert_eq!(engine.get(".card", &QueryOptions::default()).unwrap(), Some(c1));
	assert_eq!(engine.all(".card", &near_b2).unwrap(), [c1, c2]);

	engine.inspect(|dom| {
		assert_eq!(origin_distance(dom, b2, c2), 2);
		assert_eq!(origin_distance(dom, b2, c1), 3);
	});
}

#[test]
fn extension_pseudo_selectors() {
	let pool = LocalPool::new();
	let engine = Fragments::builder(page(&format!("<main>m</main><div up-main>u</div>{}", CARDS)), pool.spawner()).build();
	let (body, main, up_main, c2, b2) =
		engine.inspect(|dom| (dom.body(), only(dom, "main"), only(dom, "[up-main]"), only(dom, "#c2"), only(dom, "#b2")));
	let options = QueryOptions::default().origin(b2);

	assert_eq!(engine.get(":main", &options).unwrap(), Some(up_main));
	assert_eq!(engine.get(":layer", &options).unwrap(), Some(body));
	assert_eq!(engine.get(":origin", &options).unwrap(), Some(b2));
	assert_eq!(engine.get(".card:has(:origin)", &options).unwrap(), Some(c2));
	assert_eq!(engine.get(":none", &options).unwrap(), None);
	assert_eq!(engine.get(":origin", &QueryOptions::default()).unwrap(), None);
	assert_eq!(engine.get(".nothing, main", &options).unwrap(), Some(main));

	engine.mutate(|dom| dom.remove_attribute(up_main, "up-main"));
	assert_eq!(engine.get(":main", &options).unwrap(), Some(main));
}

#[test]
fn elements_pass_through() {
	let pool = LocalPool::new();
	let engine = Fragments::builder(page(CARDS), pool.spawner()).build();
	let (c1, c2) = engine.inspect(|dom| (only(dom, "#c1"), only(dom, "#c2")));

	assert_eq!(engine.get(c2, &QueryOptions::default()).unwrap(), Some(c2));
	assert_eq!(engine.all(Target::Elements(vec![c2, c1]), &QueryOptions::default()).unwrap(), [c2, c1]);
}

#[test]
fn destroying_elements_are_invisible() {
	let pool = LocalPool::new();
	let engine = Fragments::builder(page(CARDS), pool.spawner()).build();
	let c1 = engine.inspect(|dom| only(dom, "#c1"));

	engine.mutate(|dom| dom.add_class(c1, "up-destroying"));
	assert_eq!(engine.all(".btn", &QueryOptions::default()).unwrap().len(), 1);

	engine.mutate(|dom| {
		dom.remove_class(c1, "up-destroying");
		dom.mark_destroying(c1);
	});
	assert_eq!(engine.get("#b1", &QueryOptions::default()).unwrap(), None);
}

#[test]
fn queries_stay_in_their_layer() {
	let pool = LocalPool::new();
	let engine = Fragments::builder(
		page(r#"<main class="a">root</main><div id="overlay"><div class="box"><p class="a">over</p></div></div>"#),
		pool.spawner(),
	)
	.build();
	let (main, overlay, boxed, p) = engine.inspect(|dom| (only(dom, "main"), only(dom, "#overlay"), only(dom, ".box"), only(dom, "p")));

	assert_eq!(engine.get(".a", &QueryOptions::default()).unwrap(), Some(main));

	let layer = engine.open_layer(overlay, boxed, LayerMode::Modal, false).unwrap();
	assert_eq!(engine.current_layer(), layer);
	assert_eq!(engine.layer_of(p), Some(layer));
	assert_eq!(engine.layer_of(main), Some(LayerId::ROOT));
	assert_eq!(engine.get(".a", &QueryOptions::default()).unwrap(), Some(p));
	assert_eq!(engine.get(".a", &QueryOptions::default().layer("root")).unwrap(), Some(main));
	assert_eq!(engine.get(":layer", &QueryOptions::default()).unwrap(), Some(boxed));
	assert_eq!(engine.get(".a", &QueryOptions::default().origin(main)).unwrap(), Some(main));
	assert_eq!(engine.with_layer(LayerId::ROOT, |engine| engine.get(".a", &QueryOptions::default()).unwrap()), Some(main));
	assert_eq!(engine.closest(p, "div").unwrap(), Some(boxed));

	assert!(matches!(engine.get(".a", &QueryOptions::default().layer("sideways")), Err(RenderError::UnknownLayer(_))));

	engine.close_layer(layer).unwrap();
	assert_eq!(engine.layer_count(), 1);
	assert_eq!(engine.get(".a", &QueryOptions::default()).unwrap(), Some(main));
	engine.inspect(|dom| assert!(!dom.is_attached(overlay)));
}
