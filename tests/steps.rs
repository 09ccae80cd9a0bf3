use fragment_render::{
	error::SelectorError,
	steps::{compress, parse_steps, Placement, TargetStep},
};

mod fixture_;
use fixture_::{only, page};

#[test]
fn suffixes_are_stripped() {
	let steps = parse_steps(".a:maybe, .b:content, ul::after, ol:before:maybe, :none, .c:is(.d, .e)").unwrap();
	let summary: Vec<_> = steps.iter().map(|s| (s.selector.as_str(), s.placement, s.maybe)).collect();

	assert_eq!(
		summary,
		[
			(".a", Placement::Swap, false),
			(".b", Placement::Content, false),
			("ul", Placement::After, false),
			("ol", Placement::Before, true),
			(".c:is(.d, .e)", Placement::Swap, false),
		]
	);
	assert!(steps[0].maybe);
}

#[test]
fn bare_suffixes_are_rejected() {
	assert!(matches!(parse_steps(".a, :content"), Err(SelectorError::Unsupported(_))));
	assert!(matches!(parse_steps(".a:is(.b"), Err(SelectorError::Unbalanced(_))));
}

fn step(selector: &str, placement: Placement, old: fragment_render::NodeId) -> TargetStep {
	TargetStep { old_element: Some(old), ..TargetStep::new(selector, placement, false) }
}

#[test]
fn nested_steps_are_absorbed() {
	let dom = page(r#"<div class="outer"><p class="inner">x</p></div><ul class="list"><li>1</li></ul>"#);
	let (outer, inner, list) = (only(&dom, ".outer"), only(&dom, ".inner"), only(&dom, ".list"));

	let compressed = compress(
		&dom,
		vec![
			step(".inner", Placement::Swap, inner),
			step(".list", Placement::After, list),
			step(".outer", Placement::Swap, outer),
			step(".outer", Placement::Content, outer),
			step("li", Placement::Swap, dom.children(list)[0]),
		],
	);

	let selectors: Vec<_> = compressed.iter().map(|s| (s.selector.as_str(), s.placement)).collect();
	assert_eq!(selectors, [(".list", Placement::After), (".outer", Placement::Swap), ("li", Placement::Swap)]);
}
