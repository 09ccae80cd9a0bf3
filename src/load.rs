use crate::{
	dom::{Dom, NodeId},
	html::{ParsedDocument, ParsedNode},
};

/// Loads `document` into `dom` as a new detached document and returns that document's node.
pub fn load_document(dom: &mut Dom, document: &ParsedDocument) -> NodeId {
	let root = dom.create_document();
	load_child_nodes(dom, root, &document.nodes);
	root
}

pub fn load_child_nodes(dom: &mut Dom, parent: NodeId, nodes: &[ParsedNode]) {
	for node in nodes {
		let child = load_node(dom, node);
		dom.append_child(parent, child);
	}
}

pub fn load_node(dom: &mut Dom, node: &ParsedNode) -> NodeId {
	match node {
		ParsedNode::Element { name, attributes, children } => {
			let element = dom.create_element(name, attributes.iter().cloned());
			load_child_nodes(dom, element, children);
			element
		}
		ParsedNode::Text(text) => dom.create_text(text.as_str()),
		ParsedNode::Comment(comment) => dom.create_comment(comment.as_str()),
	}
}

/// Parses `html` and loads it as a detached document.
///
/// # Errors
///
/// See [`crate::html::parse`].
pub fn load_html(dom: &mut Dom, html: &str) -> Result<NodeId, crate::error::ParseError> {
	Ok(load_document(dom, &crate::html::parse(html)?))
}

/// Replaces the live document's content with `html`.
///
/// # Errors
///
/// See [`crate::html::parse`].
pub fn load_live_document(dom: &mut Dom, html: &str) -> Result<(), crate::error::ParseError> {
	let parsed = crate::html::parse(html)?;
	let document = dom.document();
	dom.take_children(document);
	load_child_nodes(dom, document, &parsed.nodes);
	Ok(())
}
