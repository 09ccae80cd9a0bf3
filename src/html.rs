//! A tolerant HTML parser producing a [`ParsedDocument`] independent of any arena.
//!
//! It understands full pages as well as bare fragments, void elements, raw text elements,
//! comments, doctypes and the common character references. It does not implement the full
//! HTML tree construction algorithm: Unmatched end tags are ignored and open elements are closed
//! implicitly at the end of input.

use crate::{dom::is_void_element, dom::Attribute, error::ParseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedNode {
	Element { name: String, attributes: Vec<Attribute>, children: Vec<ParsedNode> },
	Text(String),
	Comment(String),
}

impl ParsedNode {
	#[must_use]
	pub fn name(&self) -> Option<&str> {
		match self {
			Self::Element { name, .. } => Some(name),
			_ => None,
		}
	}

	#[must_use]
	pub fn children(&self) -> &[ParsedNode] {
		match self {
			Self::Element { children, .. } => children,
			_ => &[],
		}
	}

	fn find(&self, name: &str) -> Option<&ParsedNode> {
		if self.name() == Some(name) {
			return Some(self);
		}
		self.children().iter().find_map(|c| c.find(name))
	}

	fn text(&self) -> String {
		match self {
			Self::Text(text) => text.clone(),
			Self::Comment(_) => String::new(),
			Self::Element { children, .. } => children.iter().map(ParsedNode::text).collect(),
		}
	}
}

/// The output of the document-parsing collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
	/// Text of the first `<title>`, if any.
	pub title: Option<String>,
	/// Top-level nodes. For a full page that is the `<html>` element (plus comments).
	pub nodes: Vec<ParsedNode>,
	/// Whether the input was a full page rather than a bare fragment.
	pub page: bool,
}

impl ParsedDocument {
	pub(crate) fn new(nodes: Vec<ParsedNode>, page: bool) -> Self {
		let title = nodes.iter().find_map(|n| n.find("title")).map(|t| t.text().trim().to_owned());
		Self { title, nodes, page }
	}

	#[must_use]
	pub fn head(&self) -> Option<&ParsedNode> {
		self.nodes.iter().find_map(|n| n.find("head"))
	}

	#[must_use]
	pub fn body(&self) -> Option<&ParsedNode> {
		self.nodes.iter().find_map(|n| n.find("body"))
	}
}

/// Parses a full page or a bare fragment.
///
/// # Errors
///
/// Iff a start tag is cut off by the end of input.
pub fn parse(html: &str) -> Result<ParsedDocument, ParseError> {
	let mut parser = Parser { html, bytes: html.as_bytes(), i: 0, stack: vec![Frame::root()] };
	parser.run()?;
	let nodes = parser.finish();
	let page = nodes.iter().any(|n| matches!(n.name(), Some("html" | "body" | "head")));
	Ok(ParsedDocument::new(nodes, page))
}

struct Frame {
	name: String,
	attributes: Vec<Attribute>,
	children: Vec<ParsedNode>,
}

impl Frame {
	fn root() -> Self {
		Self { name: String::new(), attributes: Vec::new(), children: Vec::new() }
	}
}

struct Parser<'a> {
	html: &'a str,
	bytes: &'a [u8],
	i: usize,
	stack: Vec<Frame>,
}

impl Parser<'_> {
	fn top(&mut self) -> &mut Frame {
		let last = self.stack.len() - 1;
		&mut self.stack[last]
	}

	fn run(&mut self) -> Result<(), ParseError> {
		while self.i < self.bytes.len() {
			if self.starts_with("<!--") {
				let start = self.i + 4;
				let end = find(self.bytes, start, b"-->").unwrap_or(self.bytes.len());
				let comment = self.html[start..end].to_owned();
				self.top().children.push(ParsedNode::Comment(comment));
				self.i = (end + 3).min(self.bytes.len());
			} else if self.starts_with("<!") || self.starts_with("<?") {
				self.i = find(self.bytes, self.i, b">").map_or(self.bytes.len(), |end| end + 1);
			} else if self.starts_with("</") && self.bytes.get(self.i + 2).map_or(false, u8::is_ascii_alphabetic) {
				let (name, next) = self.end_tag()?;
				self.i = next;
				self.close(&name);
			} else if self.bytes[self.i] == b'<' && self.bytes.get(self.i + 1).map_or(false, u8::is_ascii_alphabetic) {
				self.start_tag()?;
			} else {
				let start = self.i;
				self.i += 1;
				while self.i < self.bytes.len() && self.bytes[self.i] != b'<' {
					self.i += 1;
				}
				self.text(start, self.i);
			}
		}
		Ok(())
	}

	fn starts_with(&self, needle: &str) -> bool {
		self.bytes[self.i..].starts_with(needle.as_bytes())
	}

	fn text(&mut self, start: usize, end: usize) {
		let text = decode_character_references(&self.html[start..end]);
		match self.top().children.last_mut() {
			Some(ParsedNode::Text(previous)) => previous.push_str(&text),
			_ => self.top().children.push(ParsedNode::Text(text)),
		}
	}

	fn start_tag(&mut self) -> Result<(), ParseError> {
		let at = self.i;
		self.i += 1;
		let name = self.name().to_ascii_lowercase();
		let mut attributes = Vec::new();
		let mut self_closing = false;

		loop {
			self.skip_whitespace();
			match self.bytes.get(self.i) {
				None => return Err(ParseError::new(at, format!("unclosed start tag <{}", name))),
				Some(b'>') => {
					self.i += 1;
					break;
				}
				Some(b'/') => {
					self.i += 1;
					if self.bytes.get(self.i) == Some(&b'>') {
						self_closing = true;
						self.i += 1;
						break;
					}
				}
				Some(_) => {
					let attribute_name = self.attribute_name().to_ascii_lowercase();
					if attribute_name.is_empty() {
						// Stray character such as a lone quote.
						self.i += 1;
						continue;
					}
					self.skip_whitespace();
					let value = if self.bytes.get(self.i) == Some(&b'=') {
						self.i += 1;
						self.skip_whitespace();
						self.attribute_value(at)?
					} else {
						String::new()
					};
					if !attributes.iter().any(|a: &Attribute| a.name == attribute_name) {
						attributes.push(Attribute { name: attribute_name, value });
					}
				}
			}
		}

		if matches!(name.as_str(), "script" | "style" | "textarea" | "title") && !self_closing {
			let closing = format!("</{}", name);
			let end = find_ignore_case(self.bytes, self.i, closing.as_bytes()).unwrap_or(self.bytes.len());
			let raw = &self.html[self.i..end];
			let text = if name == "textarea" || name == "title" { decode_character_references(raw) } else { raw.to_owned() };
			let children = if text.is_empty() { Vec::new() } else { vec![ParsedNode::Text(text)] };
			self.top().children.push(ParsedNode::Element { name, attributes, children });
			self.i = find(self.bytes, end, b">").map_or(self.bytes.len(), |gt| gt + 1);
			return Ok(());
		}

		if self_closing || is_void_element(&name) {
			self.top().children.push(ParsedNode::Element { name, attributes, children: Vec::new() });
		} else {
			self.stack.push(Frame { name, attributes, children: Vec::new() });
		}
		Ok(())
	}

	fn end_tag(&mut self) -> Result<(String, usize), ParseError> {
		let at = self.i;
		self.i += 2;
		let name = self.name().to_ascii_lowercase();
		match find(self.bytes, self.i, b">") {
			Some(gt) => Ok((name, gt + 1)),
			None => Err(ParseError::new(at, format!("unclosed end tag </{}", name))),
		}
	}

	/// Pops open elements up to and including the innermost `name`. Unmatched end tags are ignored.
	fn close(&mut self, name: &str) {
		let Some(position) = self.stack.iter().rposition(|f| f.name == name) else {
			return;
		};
		if position == 0 {
			return;
		}
		while self.stack.len() > position {
			self.pop();
		}
	}

	fn pop(&mut self) {
		if let Some(frame) = self.stack.pop() {
			let element = ParsedNode::Element { name: frame.name, attributes: frame.attributes, children: frame.children };
			self.top().children.push(element);
		}
	}

	fn finish(mut self) -> Vec<ParsedNode> {
		while self.stack.len() > 1 {
			self.pop();
		}
		self.stack.pop().map(|root| root.children).unwrap_or_default()
	}

	fn name(&mut self) -> &str {
		let start = self.i;
		while self.i < self.bytes.len() && (self.bytes[self.i].is_ascii_alphanumeric() || matches!(self.bytes[self.i], b'-' | b'_' | b':')) {
			self.i += 1;
		}
		&self.html[start..self.i]
	}

	fn attribute_name(&mut self) -> &str {
		let start = self.i;
		while self.i < self.bytes.len() && !self.bytes[self.i].is_ascii_whitespace() && !matches!(self.bytes[self.i], b'=' | b'>' | b'/' | b'"' | b'\'') {
			self.i += 1;
		}
		&self.html[start..self.i]
	}

	fn attribute_value(&mut self, tag_start: usize) -> Result<String, ParseError> {
		match self.bytes.get(self.i) {
			Some(&quote) if quote == b'"' || quote == b'\'' => {
				let start = self.i + 1;
				let end = self.bytes[start..]
					.iter()
					.position(|&b| b == quote)
					.map(|offset| start + offset)
					.ok_or_else(|| ParseError::new(tag_start, "unclosed quoted attribute value"))?;
				self.i = end + 1;
				Ok(decode_character_references(&self.html[start..end]))
			}
			_ => {
				let start = self.i;
				while self.i < self.bytes.len() && !self.bytes[self.i].is_ascii_whitespace() && self.bytes[self.i] != b'>' {
					self.i += 1;
				}
				Ok(decode_character_references(&self.html[start..self.i]))
			}
		}
	}

	fn skip_whitespace(&mut self) {
		while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_whitespace() {
			self.i += 1;
		}
	}
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
	if from > haystack.len() {
		return None;
	}
	haystack[from..].windows(needle.len()).position(|w| w == needle).map(|p| from + p)
}

pub(crate) fn find_ignore_case(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
	if from > haystack.len() {
		return None;
	}
	haystack[from..].windows(needle.len()).position(|w| w.eq_ignore_ascii_case(needle)).map(|p| from + p)
}

/// Decodes the named references HTML content commonly uses, and all numeric ones.
///
/// Unknown references are kept verbatim.
#[must_use]
pub fn decode_character_references(text: &str) -> String {
	if !text.contains('&') {
		return text.to_owned();
	}
	let mut decoded = String::with_capacity(text.len());
	let mut rest = text;
	while let Some(amp) = rest.find('&') {
		decoded.push_str(&rest[..amp]);
		rest = &rest[amp..];
		let semicolon = match rest[1..].find(';') {
			Some(offset) if offset <= 10 => offset + 1,
			_ => {
				decoded.push('&');
				rest = &rest[1..];
				continue;
			}
		};
		let entity = &rest[1..semicolon];
		let replacement = match entity {
			"amp" => Some('&'),
			"lt" => Some('<'),
			"gt" => Some('>'),
			"quot" => Some('"'),
			"apos" => Some('\''),
			"nbsp" => Some('\u{a0}'),
			_ => entity.strip_prefix('#').and_then(|number| {
				let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
					Some(hex) => u32::from_str_radix(hex, 16).ok(),
					None => number.parse().ok(),
				};
				code.and_then(char::from_u32)
			}),
		};
		match replacement {
			Some(c) => {
				decoded.push(c);
				rest = &rest[semicolon + 1..];
			}
			None => {
				decoded.push('&');
				rest = &rest[1..];
			}
		}
	}
	decoded.push_str(rest);
	decoded
}
