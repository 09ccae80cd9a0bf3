//! An arena DOM.
//!
//! The live document and any number of detached documents (parsed responses, inline content)
//! share a single node arena, so [`NodeId`]s stay comparable across them and moving a node from
//! new content into the live page is just re-parenting.
//!
//! A removed node keeps its id and subtree, but is detached from its parent, until it is
//! [freed](`Dom::free`). Freed slots are reused under a new generation, so a stale [`NodeId`]
//! never refers to a different node.

use core::{cmp::Ordering, fmt::Write as _};
use tracing::error;

/// Identifies a node in a [`Dom`] arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
	index: usize,
	generation: u32,
}

impl NodeId {
	#[must_use]
	pub fn index(self) -> usize {
		self.index
	}
}

impl core::fmt::Debug for NodeId {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self.generation {
			0 => write!(f, "NodeId({})", self.index),
			generation => write!(f, "NodeId({}v{})", self.index, generation),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name: String,
	pub value: String,
}

impl Attribute {
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self { name: name.into(), value: value.into() }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
	name: String,
	attributes: Vec<Attribute>,
}

impl Element {
	/// The lowercase tag name.
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn attributes(&self) -> &[Attribute] {
		&self.attributes
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.iter().find(|a| a.name == name).map(|a| a.value.as_str())
	}

	pub fn classes(&self) -> impl Iterator<Item = &str> {
		self.attribute("class").unwrap_or("").split_ascii_whitespace()
	}

	#[must_use]
	pub fn has_class(&self, class: &str) -> bool {
		self.classes().any(|c| c == class)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	Document,
	Element(Element),
	Text(String),
	Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	kind: NodeKind,
	destroying: bool,
}

#[derive(Debug, Clone)]
struct Slot {
	generation: u32,
	node: Option<Node>,
}

#[derive(Debug, Clone)]
pub struct Dom {
	slots: Vec<Slot>,
	free: Vec<usize>,
	document: NodeId,
}

impl Default for Dom {
	fn default() -> Self {
		Self::new()
	}
}

impl Dom {
	/// Creates an arena containing only an empty live document.
	#[must_use]
	pub fn new() -> Self {
		let mut dom = Self { slots: Vec::new(), free: Vec::new(), document: NodeId { index: 0, generation: 0 } };
		dom.document = dom.push(NodeKind::Document);
		dom
	}

	fn push(&mut self, kind: NodeKind) -> NodeId {
		let node = Node { parent: None, children: Vec::new(), kind, destroying: false };
		match self.free.pop() {
			Some(index) => {
				let slot = &mut self.slots[index];
				slot.node = Some(node);
				NodeId { index, generation: slot.generation }
			}
			None => {
				self.slots.push(Slot { generation: 0, node: Some(node) });
				NodeId { index: self.slots.len() - 1, generation: 0 }
			}
		}
	}

	fn node(&self, id: NodeId) -> Option<&Node> {
		self.slots.get(id.index).filter(|slot| slot.generation == id.generation)?.node.as_ref()
	}

	fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
		self.slots.get_mut(id.index).filter(|slot| slot.generation == id.generation)?.node.as_mut()
	}

	/// The number of nodes currently allocated, attached or not.
	#[must_use]
	pub fn node_count(&self) -> usize {
		self.slots.len() - self.free.len()
	}

	/// Frees the detached subtree at `root` and returns the freed elements.
	///
	/// Nothing happens if `root` is part of the live document or was already freed.
	pub fn free(&mut self, root: NodeId) -> Vec<NodeId> {
		if self.node(root).is_none() {
			return Vec::new();
		}
		if self.is_attached(root) {
			error!("Refusing to free {:?}, which is part of the live document.", root);
			return Vec::new();
		}
		self.remove(root);

		let mut elements = Vec::new();
		let mut stack = vec![root];
		while let Some(id) = stack.pop() {
			let Some(node) = self.slots.get_mut(id.index).filter(|slot| slot.generation == id.generation).and_then(|slot| {
				slot.generation = slot.generation.wrapping_add(1);
				slot.node.take()
			}) else {
				continue;
			};
			if matches!(node.kind, NodeKind::Element(_)) {
				elements.push(id);
			}
			stack.extend(node.children);
			self.free.push(id.index);
		}
		elements
	}

	/// The live document.
	#[must_use]
	pub fn document(&self) -> NodeId {
		self.document
	}

	/// The first `<body>` element of `document`, or `document` itself if there is none.
	#[must_use]
	pub fn body_of(&self, document: NodeId) -> NodeId {
		self.descendants(document)
			.find(|&node| self.tag_name(node) == Some("body"))
			.unwrap_or(document)
	}

	#[must_use]
	pub fn body(&self) -> NodeId {
		self.body_of(self.document)
	}

	/// Creates a new, detached document node.
	pub fn create_document(&mut self) -> NodeId {
		self.push(NodeKind::Document)
	}

	pub fn create_element(&mut self, name: &str, attributes: impl IntoIterator<Item = Attribute>) -> NodeId {
		self.push(NodeKind::Element(Element {
			name: name.to_ascii_lowercase(),
			attributes: attributes.into_iter().collect(),
		}))
	}

	pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
		self.push(NodeKind::Text(text.into()))
	}

	pub fn create_comment(&mut self, comment: impl Into<String>) -> NodeId {
		self.push(NodeKind::Comment(comment.into()))
	}

	/// # Panics
	///
	/// Iff `node` doesn't belong to this arena or was freed.
	#[must_use]
	pub fn kind(&self, node: NodeId) -> &NodeKind {
		match self.node(node) {
			Some(node) => &node.kind,
			None => panic!("{:?} is not a live node of this arena", node),
		}
	}

	/// Whether `node` belongs to this arena and wasn't freed.
	#[must_use]
	pub fn contains_node(&self, node: NodeId) -> bool {
		self.node(node).is_some()
	}

	#[must_use]
	pub fn element(&self, node: NodeId) -> Option<&Element> {
		match &self.node(node)?.kind {
			NodeKind::Element(element) => Some(element),
			_ => None,
		}
	}

	fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
		match &mut self.node_mut(node)?.kind {
			NodeKind::Element(element) => Some(element),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_element(&self, node: NodeId) -> bool {
		self.element(node).is_some()
	}

	#[must_use]
	pub fn is_document(&self, node: NodeId) -> bool {
		matches!(self.node(node).map(|n| &n.kind), Some(NodeKind::Document))
	}

	#[must_use]
	pub fn tag_name(&self, node: NodeId) -> Option<&str> {
		self.element(node).map(Element::name)
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
		self.element(node)?.attribute(name)
	}

	#[must_use]
	pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
		self.attribute(node, name).is_some()
	}

	pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
		let value = value.into();
		match self.element_mut(node) {
			Some(element) => match element.attributes.iter_mut().find(|a| a.name == name) {
				Some(attribute) => attribute.value = value,
				None => element.attributes.push(Attribute { name: name.to_owned(), value }),
			},
			None => error!("Tried to set attribute {:?} on non-element {:?}. Ignoring.", name, node),
		}
	}

	pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Option<String> {
		let element = self.element_mut(node)?;
		let index = element.attributes.iter().position(|a| a.name == name)?;
		Some(element.attributes.remove(index).value)
	}

	#[must_use]
	pub fn has_class(&self, node: NodeId, class: &str) -> bool {
		self.element(node).map_or(false, |e| e.has_class(class))
	}

	pub fn add_class(&mut self, node: NodeId, class: &str) {
		if self.has_class(node, class) || !self.is_element(node) {
			return;
		}
		let classes = match self.attribute(node, "class") {
			Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
			_ => class.to_owned(),
		};
		self.set_attribute(node, "class", classes);
	}

	pub fn remove_class(&mut self, node: NodeId, class: &str) {
		let remaining = match self.element(node) {
			Some(element) if element.has_class(class) => element.classes().filter(|&c| c != class).collect::<Vec<_>>().join(" "),
			_ => return,
		};
		self.set_attribute(node, "class", remaining);
	}

	#[must_use]
	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.node(node)?.parent
	}

	#[must_use]
	pub fn children(&self, node: NodeId) -> &[NodeId] {
		self.node(node).map_or(&[], |n| n.children.as_slice())
	}

	#[must_use]
	pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
		self.children(node).iter().copied().filter(|&c| self.is_element(c)).collect()
	}

	/// The first element child, skipping text and comments.
	#[must_use]
	pub fn first_element_child(&self, node: NodeId) -> Option<NodeId> {
		self.children(node).iter().copied().find(|&c| self.is_element(c))
	}

	#[must_use]
	pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
		let parent = self.parent(node)?;
		self.children(parent).iter().position(|&c| c == node)
	}

	#[must_use]
	pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
		let parent = self.parent(node)?;
		let index = self.index_in_parent(node)?;
		self.children(parent).get(index + 1).copied()
	}

	#[must_use]
	pub fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
		let parent = self.parent(node)?;
		let index = self.index_in_parent(node)?;
		self.children(parent)[..index].iter().rev().copied().find(|&c| self.is_element(c))
	}

	/// Proper ancestors, closest first.
	pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		core::iter::successors(self.parent(node), move |&n| self.parent(n))
	}

	/// `node` followed by its ancestors.
	pub fn self_and_ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		core::iter::successors(Some(node), move |&n| self.parent(n))
	}

	#[must_use]
	pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
		self.self_and_ancestors(node).any(|n| n == ancestor)
	}

	#[must_use]
	pub fn depth(&self, node: NodeId) -> usize {
		self.ancestors(node).count()
	}

	#[must_use]
	pub fn root_of(&self, node: NodeId) -> NodeId {
		self.self_and_ancestors(node).last().unwrap_or(node)
	}

	/// Whether `node` is part of the live document.
	#[must_use]
	pub fn is_attached(&self, node: NodeId) -> bool {
		self.root_of(node) == self.document
	}

	/// All nodes below `node` in document order, excluding `node` itself.
	#[must_use]
	pub fn descendants(&self, node: NodeId) -> Descendants<'_> {
		let mut stack = self.children(node).to_vec();
		stack.reverse();
		Descendants { dom: self, stack }
	}

	/// Elements of the subtree rooted at `node` in document order, including `node` if it is one.
	#[must_use]
	pub fn subtree_elements(&self, node: NodeId) -> Vec<NodeId> {
		let mut elements = Vec::new();
		if self.is_element(node) {
			elements.push(node);
		}
		elements.extend(self.descendants(node).filter(|&n| self.is_element(n)));
		elements
	}

	/// Orders nodes by their position in document order.
	///
	/// Nodes in different trees are ordered by the ids of their roots.
	#[must_use]
	pub fn document_order(&self, a: NodeId, b: NodeId) -> Ordering {
		if a == b {
			return Ordering::Equal;
		}
		let path = |node: NodeId| {
			let mut path: Vec<usize> = self.self_and_ancestors(node).filter_map(|n| self.index_in_parent(n)).collect();
			path.reverse();
			path
		};
		let (root_a, root_b) = (self.root_of(a), self.root_of(b));
		if root_a != root_b {
			return root_a.cmp(&root_b);
		}
		path(a).cmp(&path(b))
	}

	#[must_use]
	pub fn is_destroying(&self, node: NodeId) -> bool {
		self.node(node).map_or(false, |n| n.destroying)
	}

	/// Flags `node` as being removed. Matching ignores flagged nodes and their descendants.
	pub fn mark_destroying(&mut self, node: NodeId) {
		if let Some(n) = self.node_mut(node) {
			n.destroying = true;
		}
	}

	/// Detaches `node` from its parent, if any.
	pub fn remove(&mut self, node: NodeId) {
		let Some(parent) = self.node(node).and_then(|n| n.parent) else {
			return;
		};
		if let Some(parent) = self.node_mut(parent) {
			parent.children.retain(|&c| c != node);
		}
		if let Some(node) = self.node_mut(node) {
			node.parent = None;
		}
	}

	pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
		self.insert_before(parent, child, None)
	}

	/// Inserts `child` into `parent` before `reference`, or at the end if `reference` is [`None`].
	///
	/// `child` is detached from its previous parent first.
	pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
		if self.is_ancestor_or_self(child, parent) {
			return error!("Refusing to insert {:?} into its own subtree at {:?}.", child, parent);
		}
		if !self.contains_node(parent) || !self.contains_node(child) {
			return error!("Refusing to insert {:?} into {:?}: freed node.", child, parent);
		}
		self.remove(child);
		let index = match reference.and_then(|r| self.children(parent).iter().position(|&c| c == r)) {
			Some(index) => index,
			None => {
				if reference.is_some() {
					error!("Reference node {:?} is not a child of {:?}. Appending instead.", reference, parent);
				}
				self.children(parent).len()
			}
		};
		if let Some(parent) = self.node_mut(parent) {
			parent.children.insert(index, child);
		}
		if let Some(child) = self.node_mut(child) {
			child.parent = Some(parent);
		}
	}

	/// Puts `new` where `old` is and detaches `old`.
	pub fn replace(&mut self, old: NodeId, new: NodeId) {
		match self.parent(old) {
			Some(parent) => {
				self.insert_before(parent, new, Some(old));
				self.remove(old);
			}
			None => error!("Cannot replace detached node {:?}. Ignoring.", old),
		}
	}

	/// Detaches and returns all children of `node`.
	pub fn take_children(&mut self, node: NodeId) -> Vec<NodeId> {
		let children = self.node_mut(node).map(|n| core::mem::take(&mut n.children)).unwrap_or_default();
		for &child in &children {
			if let Some(child) = self.node_mut(child) {
				child.parent = None;
			}
		}
		children
	}

	#[must_use]
	pub fn text_content(&self, node: NodeId) -> String {
		let Some(kind) = self.node(node).map(|n| &n.kind) else {
			return String::new();
		};
		match kind {
			NodeKind::Text(text) => text.clone(),
			NodeKind::Comment(_) => String::new(),
			NodeKind::Document | NodeKind::Element(_) => self
				.descendants(node)
				.filter_map(|n| match self.kind(n) {
					NodeKind::Text(text) => Some(text.as_str()),
					_ => None,
				})
				.collect(),
		}
	}

	#[must_use]
	pub fn outer_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		self.serialize(node, &Serialization::default(), &mut html);
		html
	}

	#[must_use]
	pub fn inner_html(&self, node: NodeId) -> String {
		let mut html = String::new();
		for &child in self.children(node) {
			self.serialize(child, &Serialization::default(), &mut html);
		}
		html
	}

	/// Serializes `node` with sorted attributes, collapsed whitespace and without the `ignored` attributes.
	///
	/// Two subtrees with equal normalized HTML are considered the same content.
	#[must_use]
	pub fn normalized_outer_html(&self, node: NodeId, ignored: &[String]) -> String {
		let mut html = String::new();
		self.serialize(node, &Serialization { ignored, normalize: true }, &mut html);
		html
	}

	fn serialize(&self, node: NodeId, options: &Serialization<'_>, out: &mut String) {
		let Some(kind) = self.node(node).map(|n| &n.kind) else {
			return;
		};
		match kind {
			NodeKind::Document => {
				for &child in self.children(node) {
					self.serialize(child, options, out)
				}
			}
			NodeKind::Text(text) => {
				if options.normalize {
					let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
					out.push_str(&escape_text(&collapsed))
				} else {
					out.push_str(&escape_text(text))
				}
			}
			NodeKind::Comment(comment) => {
				if !options.normalize {
					let _ = write!(out, "<!--{}-->", comment);
				}
			}
			NodeKind::Element(element) => {
				out.push('<');
				out.push_str(&element.name);
				let mut attributes: Vec<_> = element.attributes.iter().filter(|a| !options.ignored.contains(&a.name)).collect();
				if options.normalize {
					attributes.sort_by(|a, b| a.name.cmp(&b.name));
				}
				for attribute in attributes {
					let _ = write!(out, " {}=\"{}\"", attribute.name, escape_attribute(&attribute.value));
				}
				out.push('>');
				if is_void_element(&element.name) {
					return;
				}
				for &child in self.children(node) {
					self.serialize(child, options, out)
				}
				let _ = write!(out, "</{}>", element.name);
			}
		}
	}
}

#[derive(Default)]
struct Serialization<'a> {
	ignored: &'a [String],
	normalize: bool,
}

/// Pre-order traversal below a node. See [`Dom::descendants`].
#[derive(Debug)]
pub struct Descendants<'a> {
	dom: &'a Dom,
	stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
	type Item = NodeId;

	fn next(&mut self) -> Option<Self::Item> {
		let node = self.stack.pop()?;
		self.stack.extend(self.dom.children(node).iter().rev().copied());
		Some(node)
	}
}

#[must_use]
pub fn is_void_element(name: &str) -> bool {
	matches!(
		name,
		"area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "param" | "source" | "track" | "wbr"
	)
}

fn escape_text(text: &str) -> String {
	text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
	value.replace('&', "&amp;").replace('"', "&quot;")
}
