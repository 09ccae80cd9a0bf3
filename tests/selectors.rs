use fragment_render::{
	dom::Dom,
	error::SelectorError,
	selector::{build_element, split_top_level, Selector},
};

mod fixture_;
use fixture_::{only, page};

fn texts(dom: &Dom, selector: &str) -> Vec<String> {
	Selector::parse(selector).unwrap().select(dom, dom.document()).into_iter().map(|n| dom.text_content(n)).collect()
}

#[test]
fn compounds_and_combinators() {
	let dom = page(r#"<ul id="list"><li class="a x">1</li><li class="b">2</li><li class="a" data-k="v w">3</li></ul><p>4</p>"#);

	assert_eq!(texts(&dom, "li.a"), ["1", "3"]);
	assert_eq!(texts(&dom, "#list > .b"), ["2"]);
	assert_eq!(texts(&dom, ".x + li"), ["2"]);
	assert_eq!(texts(&dom, ".x ~ li"), ["2", "3"]);
	assert_eq!(texts(&dom, "ul p"), Vec::<String>::new());
	assert_eq!(texts(&dom, "[data-k~=w]"), ["3"]);
	assert_eq!(texts(&dom, "[data-k^='v ']"), ["3"]);
	assert_eq!(texts(&dom, "li.b, p"), ["2", "4"]);
}

#[test]
fn structural_pseudo_classes() {
	let dom = page("<ol><li>1</li><li>2</li><li>3</li><li></li></ol>");

	assert_eq!(texts(&dom, "li:first-child"), ["1"]);
	assert_eq!(texts(&dom, "li:nth-child(odd)"), ["1", "3"]);
	assert_eq!(texts(&dom, "li:nth-child(2n)"), ["2", ""]);
	assert_eq!(texts(&dom, "li:not(:empty):last-child"), Vec::<String>::new());
	assert_eq!(Selector::parse("li:empty").unwrap().select(&dom, dom.document()).len(), 1);
}

#[test]
fn has_looks_into_the_subject() {
	let dom = page(r#"<div class="card"><b>x</b></div><div class="card"><i>y</i></div>"#);

	assert_eq!(texts(&dom, ".card:has(> i)"), ["y"]);
	assert_eq!(texts(&dom, ".card:is(:has(b), :has(u))"), ["x"]);
}

#[test]
fn closest_and_subtree() {
	let dom = page(r#"<section class="s"><div><span>t</span></div></section>"#);
	let span = only(&dom, "span");
	let section = only(&dom, "section");

	assert_eq!(Selector::parse(".s").unwrap().closest(&dom, span), Some(section));
	assert!(Selector::parse("section").unwrap().select(&dom, section).is_empty());
	assert_eq!(Selector::parse("section").unwrap().select_subtree(&dom, section), [section]);
}

#[test]
fn malformed_selectors() {
	assert!(matches!(Selector::parse(""), Err(_)));
	assert!(matches!(Selector::parse("a[b"), Err(SelectorError::Unbalanced(_))));
	assert!(matches!(Selector::parse("a:frobnicate"), Err(SelectorError::Unsupported(_))));
}

#[test]
fn top_level_splitting() {
	assert_eq!(split_top_level(r#"a:is(.b, .c), [d="e, f"] , g"#, ',').unwrap(), [r#"a:is(.b, .c)"#, r#"[d="e, f"]"#, "g"]);
}

#[test]
fn elements_from_selectors() {
	let mut dom = Dom::new();
	let element = build_element(&mut dom, "main .a#b[c=d]").unwrap();

	assert_eq!(dom.tag_name(element), Some("div"));
	assert_eq!(dom.attribute(element, "id"), Some("b"));
	assert!(dom.has_class(element, "a"));
	assert_eq!(dom.attribute(element, "c"), Some("d"));
	assert!(!dom.is_attached(element));
}
