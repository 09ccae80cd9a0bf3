//! [`DocumentParser`] backed by `html5ever`, which recovers from malformed markup the way browsers
//! do (implied end tags, `<tbody>`, misnested formatting elements).
//!
//! Bare fragments are parsed in a `<body>` context. Input counts as a full page iff it contains an
//! `<html>`, `<head>` or `<body>` tag.

use crate::{
	collaborators::DocumentParser,
	dom::Attribute,
	error::ParseError,
	html::{find_ignore_case, ParsedDocument, ParsedNode},
};
use html5ever::{local_name, namespace_url, ns, parse_document, parse_fragment, tendril::TendrilSink, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::{debug, trace_span};

#[derive(Debug, Default, Clone, Copy)]
pub struct Html5everParser;

impl DocumentParser for Html5everParser {
	fn parse(&self, html: &str) -> Result<ParsedDocument, ParseError> {
		let page = ["<html", "<head", "<body"].iter().any(|tag| find_ignore_case(html.as_bytes(), 0, tag.as_bytes()).is_some());
		let span = trace_span!("html5ever", page, len = html.len());
		let _enter = span.enter();

		let dom = if page {
			parse_document(RcDom::default(), ParseOpts::default()).one(html)
		} else {
			parse_fragment(RcDom::default(), ParseOpts::default(), QualName::new(None, ns!(html), local_name!("body")), Vec::new()).one(html)
		};
		if !dom.errors.is_empty() {
			debug!(errors = dom.errors.len(), "Recovered from malformed markup.");
		}

		let mut nodes = Vec::new();
		if page {
			convert_children(&dom.document, &mut nodes);
		} else {
			// The fragment parser puts its result into a synthetic `<html>` root.
			for root in dom.document.children.borrow().iter() {
				convert_children(root, &mut nodes);
			}
		}
		Ok(ParsedDocument::new(nodes, page))
	}
}

fn convert_children(parent: &Handle, out: &mut Vec<ParsedNode>) {
	for child in parent.children.borrow().iter() {
		convert(child, out);
	}
}

fn convert(handle: &Handle, out: &mut Vec<ParsedNode>) {
	match &handle.data {
		NodeData::Element { name, attrs, template_contents, .. } => {
			let attributes = attrs.borrow().iter().map(|a| Attribute::new(&*a.name.local, &*a.value)).collect();
			let mut children = Vec::new();
			match &*template_contents.borrow() {
				Some(contents) => convert_children(contents, &mut children),
				None => convert_children(handle, &mut children),
			}
			out.push(ParsedNode::Element { name: name.local.to_string(), attributes, children });
		}
		NodeData::Text { contents } => out.push(ParsedNode::Text(contents.borrow().to_string())),
		NodeData::Comment { contents } => out.push(ParsedNode::Comment(contents.to_string())),
		NodeData::Document => convert_children(handle, out),
		NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => (),
	}
}
