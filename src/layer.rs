//! The layer directory: The root page plus a stack of overlays.
//!
//! Layers live in a `Vec` indexed by [`LayerId`]. A node belongs to a layer by DOM ancestry only:
//! The innermost overlay element containing it, or the root layer for everything else in the live
//! document.

use crate::{
	dom::{Dom, NodeId},
	error::RenderError,
};
use core::fmt;
use tracing::{debug, warn};

/// Index of a layer in the stack. The root layer is always `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(usize);

impl LayerId {
	pub const ROOT: Self = Self(0);

	#[must_use]
	pub fn index(self) -> usize {
		self.0
	}

	#[must_use]
	pub fn is_root(self) -> bool {
		self == Self::ROOT
	}
}

impl fmt::Display for LayerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "layer {}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerMode {
	Root,
	Modal,
	Drawer,
	Popup,
	Cover,
}

impl LayerMode {
	#[must_use]
	pub fn name(self) -> &'static str {
		match self {
			Self::Root => "root",
			Self::Modal => "modal",
			Self::Drawer => "drawer",
			Self::Popup => "popup",
			Self::Cover => "cover",
		}
	}

	#[must_use]
	pub fn is_overlay(self) -> bool {
		self != Self::Root
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
	id: LayerId,
	element: NodeId,
	content: NodeId,
	mode: LayerMode,
	history: bool,
}

impl Layer {
	#[must_use]
	pub fn id(&self) -> LayerId {
		self.id
	}

	/// The element bounding this layer's queries. For the root layer, that's the live document.
	#[must_use]
	pub fn element(&self) -> NodeId {
		self.element
	}

	/// The first swappable element, which `:layer` refers to.
	#[must_use]
	pub fn content(&self) -> NodeId {
		self.content
	}

	#[must_use]
	pub fn mode(&self) -> LayerMode {
		self.mode
	}

	/// Whether renders in this layer update the browser history.
	#[must_use]
	pub fn history(&self) -> bool {
		self.history
	}

	#[must_use]
	pub fn is_overlay(&self) -> bool {
		self.mode.is_overlay()
	}
}

#[derive(Debug, Clone)]
pub struct LayerDirectory {
	layers: Vec<Layer>,
}

impl LayerDirectory {
	/// Creates a directory with only the root layer, spanning `dom`'s live document.
	#[must_use]
	pub fn new(dom: &Dom) -> Self {
		Self {
			layers: vec![Layer { id: LayerId::ROOT, element: dom.document(), content: dom.body(), mode: LayerMode::Root, history: true }],
		}
	}

	#[must_use]
	pub fn root(&self) -> &Layer {
		&self.layers[0]
	}

	#[must_use]
	pub fn front(&self) -> &Layer {
		&self.layers[self.layers.len() - 1]
	}

	#[must_use]
	pub fn get(&self, id: LayerId) -> Option<&Layer> {
		self.layers.get(id.0)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.layers.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		false
	}

	/// Layers back to front.
	pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Layer> {
		self.layers.iter()
	}

	/// The layer directly below `id`.
	#[must_use]
	pub fn parent(&self, id: LayerId) -> Option<LayerId> {
		id.0.checked_sub(1).filter(|&index| index < self.layers.len()).map(LayerId)
	}

	/// Refreshes the root layer's first swappable element after the live document was replaced.
	pub fn sync_root(&mut self, dom: &Dom) {
		self.layers[0].content = dom.body();
	}

	/// Pushes an overlay whose queries are bounded by `element` and whose `:layer` is `content`.
	///
	/// # Errors
	///
	/// Iff `element` isn't attached, `content` isn't inside it, or `mode` is [`LayerMode::Root`].
	pub fn open(&mut self, dom: &Dom, element: NodeId, content: NodeId, mode: LayerMode, history: bool) -> Result<LayerId, RenderError> {
		if !mode.is_overlay() {
			return Err(RenderError::InvalidOptions("only overlays can be opened".to_owned()));
		}
		if !dom.is_attached(element) || !dom.is_element(element) {
			return Err(RenderError::InvalidOptions(format!("overlay element {:?} is not an attached element", element)));
		}
		if !dom.is_ancestor_or_self(element, content) {
			return Err(RenderError::InvalidOptions(format!("overlay content {:?} is outside of its element {:?}", content, element)));
		}
		let id = LayerId(self.layers.len());
		debug!("Opening {} ({}) at {:?}.", id, mode.name(), element);
		self.layers.push(Layer { id, element, content, mode, history });
		Ok(id)
	}

	/// Closes `id` and every layer above it, returning the closed layers front to back.
	///
	/// # Errors
	///
	/// Iff `id` is the root layer or doesn't exist.
	pub fn close(&mut self, id: LayerId) -> Result<Vec<Layer>, RenderError> {
		if id.is_root() {
			return Err(RenderError::InvalidOptions("the root layer cannot be closed".to_owned()));
		}
		if id.0 >= self.layers.len() {
			return Err(RenderError::UnknownLayer(id.to_string()));
		}
		let mut closed = self.layers.split_off(id.0);
		closed.reverse();
		debug!("Closed {} layer(s) from {} upwards.", closed.len(), id);
		Ok(closed)
	}

	/// The layer `node` belongs to, or [`None`] for nodes outside the live document.
	#[must_use]
	pub fn layer_of(&self, dom: &Dom, node: NodeId) -> Option<LayerId> {
		for ancestor in dom.self_and_ancestors(node) {
			if let Some(layer) = self.layers[1..].iter().rev().find(|l| l.element == ancestor) {
				return Some(layer.id);
			}
			if ancestor == dom.document() {
				return Some(LayerId::ROOT);
			}
		}
		None
	}

	#[must_use]
	pub fn contains(&self, dom: &Dom, layer: LayerId, node: NodeId) -> bool {
		self.layer_of(dom, node) == Some(layer)
	}

	/// Resolves a layer query to a priority-ordered, duplicate-free list of layers.
	///
	/// # Errors
	///
	/// [`RenderError::UnknownLayer`] for unknown keywords, indices beyond the stack, or queries that
	/// resolve to no layer at all.
	pub fn resolve(&self, query: &LayerQuery, current: LayerId, origin: Option<LayerId>) -> Result<Vec<LayerId>, RenderError> {
		let unknown = || RenderError::UnknownLayer(query.to_string());
		let mut resolved: Vec<LayerId> = Vec::new();
		let push = |id: LayerId, resolved: &mut Vec<LayerId>| {
			if !resolved.contains(&id) {
				resolved.push(id)
			}
		};
		let overlays_front_to_back = || self.layers[1..].iter().rev().map(|l| l.id);

		let tokens = match query {
			LayerQuery::Layer(id) => {
				return if id.0 < self.layers.len() { Ok(vec![*id]) } else { Err(unknown()) };
			}
			LayerQuery::Spec(spec) => spec.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()).collect::<Vec<_>>(),
		};

		for token in tokens {
			match token {
				"root" => push(LayerId::ROOT, &mut resolved),
				"front" => push(self.front().id, &mut resolved),
				"current" => push(current, &mut resolved),
				"parent" => {
					if let Some(parent) = self.parent(current) {
						push(parent, &mut resolved)
					}
				}
				"origin" => match origin {
					Some(origin) => push(origin, &mut resolved),
					None => warn!("Layer query {:?} refers to the origin, but no attached origin was given.", query),
				},
				"closest" => {
					for index in (0..=current.0).rev() {
						push(LayerId(index), &mut resolved)
					}
				}
				"ancestor" => {
					for index in (0..current.0).rev() {
						push(LayerId(index), &mut resolved)
					}
				}
				"child" => {
					if current.0 + 1 < self.layers.len() {
						push(LayerId(current.0 + 1), &mut resolved)
					}
				}
				"descendant" => {
					for index in current.0 + 1..self.layers.len() {
						push(LayerId(index), &mut resolved)
					}
				}
				"overlay" => {
					for id in overlays_front_to_back() {
						push(id, &mut resolved)
					}
				}
				"any" => {
					push(current, &mut resolved);
					for id in overlays_front_to_back() {
						push(id, &mut resolved)
					}
					push(LayerId::ROOT, &mut resolved);
				}
				index => match index.parse::<usize>() {
					Ok(index) if index < self.layers.len() => push(LayerId(index), &mut resolved),
					_ => return Err(unknown()),
				},
			}
		}

		if resolved.is_empty() {
			Err(unknown())
		} else {
			Ok(resolved)
		}
	}
}

/// Which layer(s) a query or render call applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerQuery {
	/// A space/comma separated priority list of keywords and indices, e.g. `"current root"`.
	Spec(String),
	Layer(LayerId),
}

impl fmt::Display for LayerQuery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Spec(spec) => f.write_str(spec),
			Self::Layer(id) => write!(f, "{}", id.0),
		}
	}
}

impl From<&str> for LayerQuery {
	fn from(spec: &str) -> Self {
		Self::Spec(spec.to_owned())
	}
}

impl From<String> for LayerQuery {
	fn from(spec: String) -> Self {
		Self::Spec(spec)
	}
}

impl From<LayerId> for LayerQuery {
	fn from(id: LayerId) -> Self {
		Self::Layer(id)
	}
}

/// The "current layer": A stack of scoped overrides on top of the front layer.
#[derive(Debug, Clone, Default)]
pub struct LayerContext {
	stack: Vec<LayerId>,
}

impl LayerContext {
	pub fn push(&mut self, layer: LayerId) {
		self.stack.push(layer)
	}

	pub fn pop(&mut self) -> Option<LayerId> {
		self.stack.pop()
	}

	/// The innermost scoped layer that still exists, or the front layer.
	#[must_use]
	pub fn current(&self, directory: &LayerDirectory) -> LayerId {
		self.stack.iter().rev().copied().find(|id| directory.get(*id).is_some()).unwrap_or_else(|| directory.front().id)
	}
}
