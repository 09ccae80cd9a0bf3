//! The target resolver: From a target (selector, element or element list) to live elements.
//!
//! Every query is confined to one layer at a time. The extension pseudo-selectors are expanded
//! here, before anything reaches [`Selector`].

use crate::{
	config::{FragmentConfig, MatchPolicy},
	deriver::TargetDeriver,
	dom::{Dom, NodeId},
	error::RenderError,
	layer::{LayerContext, LayerDirectory, LayerId, LayerMode, LayerQuery},
	selector::{split_top_level, Selector},
};
use tracing::{instrument, trace, warn};

/// What to resolve. Elements are passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	Selector(String),
	Element(NodeId),
	Elements(Vec<NodeId>),
}

impl From<&str> for Target {
	fn from(selector: &str) -> Self {
		Self::Selector(selector.to_owned())
	}
}

impl From<String> for Target {
	fn from(selector: String) -> Self {
		Self::Selector(selector)
	}
}

impl From<NodeId> for Target {
	fn from(element: NodeId) -> Self {
		Self::Element(element)
	}
}

impl From<Vec<NodeId>> for Target {
	fn from(elements: Vec<NodeId>) -> Self {
		Self::Elements(elements)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
	pub layer: Option<LayerQuery>,
	/// The element the user interacted with.
	pub origin: Option<NodeId>,
	/// Overrides [`FragmentConfig::match_policy`].
	pub match_policy: Option<MatchPolicy>,
}

impl QueryOptions {
	#[must_use]
	pub fn layer(mut self, layer: impl Into<LayerQuery>) -> Self {
		self.layer = Some(layer.into());
		self
	}

	#[must_use]
	pub fn origin(mut self, origin: NodeId) -> Self {
		self.origin = Some(origin);
		self
	}

	#[must_use]
	pub fn match_policy(mut self, match_policy: MatchPolicy) -> Self {
		self.match_policy = Some(match_policy);
		self
	}
}

/// Where a single query looks.
#[derive(Debug, Clone, Copy)]
pub struct Scope {
	/// The node below which (inclusively) matches are searched.
	pub root: NodeId,
	/// [`Some`] for queries in the live document. Matches outside of this layer are discarded.
	pub layer: Option<LayerId>,
	/// Decides which main targets `:main` expands to.
	pub mode: LayerMode,
	pub origin: Option<NodeId>,
	pub match_policy: MatchPolicy,
}

/// One top-level alternative of a target, classified by its extension pseudo-selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece<'a> {
	/// Plain CSS, possibly still containing `:layer` or `:origin` inside a compound.
	Css(&'a str),
	/// Contains `:main`, which is tried with each configured main target in turn.
	Main(&'a str),
	Layer,
	Origin,
	None,
}

impl<'a> Piece<'a> {
	fn classify(alternative: &'a str) -> Self {
		match alternative {
			":none" => Self::None,
			":layer" => Self::Layer,
			":origin" => Self::Origin,
			_ if find_pseudo(alternative, ":main").is_some() => Self::Main(alternative),
			_ => Self::Css(alternative),
		}
	}
}

/// Finds `pseudo` as a whole pseudo-class (not as a prefix of a longer identifier).
pub(crate) fn find_pseudo(selector: &str, pseudo: &str) -> Option<usize> {
	let mut start = 0;
	while let Some(found) = selector[start..].find(pseudo) {
		let at = start + found;
		let end = at + pseudo.len();
		let followed_by_identifier = selector[end..].chars().next().map_or(false, |c| c.is_alphanumeric() || c == '-' || c == '_');
		let doubled = at > 0 && selector[..at].ends_with(':');
		if !followed_by_identifier && !doubled {
			return Some(at);
		}
		start = end;
	}
	None
}

pub(crate) fn replace_pseudo(selector: &str, pseudo: &str, replacement: &str) -> String {
	let mut replaced = selector.to_owned();
	while let Some(at) = find_pseudo(&replaced, pseudo) {
		replaced.replace_range(at..at + pseudo.len(), replacement);
	}
	replaced
}

/// Borrowed view of everything a query needs.
pub struct Resolver<'a> {
	pub dom: &'a Dom,
	pub layers: &'a LayerDirectory,
	pub context: &'a LayerContext,
	pub config: &'a FragmentConfig,
	pub deriver: &'a dyn TargetDeriver,
}

impl<'a> Resolver<'a> {
	/// The layers a query with `options` applies to, in priority order.
	///
	/// Explicit layer, else the origin's layer (if the origin is attached), else the current layer.
	///
	/// # Errors
	///
	/// [`RenderError::UnknownLayer`] if `options.layer` names no existing layer.
	pub fn layers_for(&self, options: &QueryOptions) -> Result<Vec<LayerId>, RenderError> {
		let current = self.context.current(self.layers);
		let origin_layer = options.origin.and_then(|origin| self.layers.layer_of(self.dom, origin));
		match &options.layer {
			Some(query) => self.layers.resolve(query, current, origin_layer),
			None => Ok(vec![origin_layer.unwrap_or(current)]),
		}
	}

	/// The scope of a query in the live `layer`.
	#[must_use]
	pub fn layer_scope(&self, layer: LayerId, options: &QueryOptions) -> Scope {
		let (root, mode) = self.layers.get(layer).map_or((self.dom.document(), LayerMode::Root), |l| (l.element(), l.mode()));
		Scope {
			root,
			layer: Some(layer),
			mode,
			origin: options.origin.filter(|&origin| self.dom.is_attached(origin)),
			match_policy: options.match_policy.unwrap_or(self.config.match_policy),
		}
	}

	/// The scope of a query in a detached document, such as new content.
	///
	/// No layer filtering applies. `:main` expands as for a layer of `mode`.
	#[must_use]
	pub fn detached_scope(&self, root: NodeId, mode: LayerMode, origin: Option<NodeId>) -> Scope {
		Scope { root, layer: None, mode, origin, match_policy: MatchPolicy::First }
	}

	/// The best match for `target`, trying each requested layer in order.
	///
	/// # Errors
	///
	/// For unknown layers and malformed selectors. A missing match is [`Ok(None)`](`Option::None`).
	#[instrument(skip(self))]
	pub fn get(&self, target: &Target, options: &QueryOptions) -> Result<Option<NodeId>, RenderError> {
		match target {
			Target::Element(element) => Ok(Some(*element)),
			Target::Elements(elements) => Ok(elements.first().copied()),
			Target::Selector(selector) => {
				for layer in self.layers_for(options)? {
					let scope = self.layer_scope(layer, options);
					if let Some(found) = self.get_in(&scope, selector)? {
						trace!(?found, %layer, "Matched.");
						return Ok(Some(found));
					}
				}
				Ok(None)
			}
		}
	}

	/// Every match for `target` in the first requested layer that has any, in document order.
	///
	/// # Errors
	///
	/// For unknown layers and malformed selectors. No matches is an empty [`Vec`].
	#[instrument(skip(self))]
	pub fn all(&self, target: &Target, options: &QueryOptions) -> Result<Vec<NodeId>, RenderError> {
		match target {
			Target::Element(element) => Ok(vec![*element]),
			Target::Elements(elements) => Ok(elements.clone()),
			Target::Selector(selector) => {
				for layer in self.layers_for(options)? {
					let scope = self.layer_scope(layer, options);
					let found = self.all_in(&scope, selector)?;
					if !found.is_empty() {
						return Ok(found);
					}
				}
				Ok(Vec::new())
			}
		}
	}

	/// Matches in the subtree rooted at `root`, including `root`. Origin preference is ignored.
	///
	/// # Errors
	///
	/// Iff `selector` is malformed.
	pub fn subtree(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, RenderError> {
		let scope = self.node_scope(root);
		let parsed = Selector::parse(selector)?;
		Ok(parsed.select_subtree(self.dom, root).into_iter().filter(|&n| self.admissible(&scope, n)).collect())
	}

	/// The closest ancestor-or-self of `node` matching `selector`, within `node`'s layer.
	///
	/// # Errors
	///
	/// Iff `selector` is malformed.
	pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, RenderError> {
		let scope = self.node_scope(node);
		let parsed = Selector::parse(selector)?;
		Ok(self.dom.self_and_ancestors(node).find(|&n| parsed.matches(self.dom, n) && self.admissible(&scope, n)))
	}

	fn node_scope(&self, node: NodeId) -> Scope {
		let layer = self.layers.layer_of(self.dom, node);
		let mode = layer.and_then(|l| self.layers.get(l)).map_or(LayerMode::Root, |l| l.mode());
		Scope { root: self.dom.root_of(node), layer, mode, origin: None, match_policy: MatchPolicy::First }
	}

	/// The single best match for `selector` in `scope`, honoring its match policy.
	///
	/// # Errors
	///
	/// Iff `selector` is malformed.
	pub fn get_in(&self, scope: &Scope, selector: &str) -> Result<Option<NodeId>, RenderError> {
		for alternative in split_top_level(selector, ',')? {
			let alternative = alternative.trim();
			if alternative.is_empty() {
				continue;
			}
			let (found, origin_agnostic) = self.resolve_piece(scope, Piece::classify(alternative))?;
			let best = if origin_agnostic { found.first().copied() } else { self.prefer(scope, &found) };
			if best.is_some() {
				return Ok(best);
			}
		}
		Ok(None)
	}

	/// Like [`Self::get_in`], but also returns the alternative that matched with `:main` expanded,
	/// so that the same selector can be looked up in new content.
	///
	/// # Errors
	///
	/// Iff `selector` is malformed.
	pub fn pin(&self, scope: &Scope, selector: &str) -> Result<Option<(NodeId, String)>, RenderError> {
		for alternative in split_top_level(selector, ',')? {
			let alternative = alternative.trim();
			if let Piece::Main(template) = Piece::classify(alternative) {
				let agnostic = Scope { origin: None, ..*scope };
				for main_target in self.config.main_targets_for(scope.mode) {
					if find_pseudo(&main_target, ":main").is_some() {
						continue;
					}
					let expanded = replace_pseudo(template, ":main", &main_target);
					if let Some(found) = self.get_in(&agnostic, &expanded)? {
						return Ok(Some((found, expanded)));
					}
				}
			} else if let Some(found) = self.get_in(scope, alternative)? {
				return Ok(Some((found, alternative.to_owned())));
			}
		}
		Ok(None)
	}

	/// Every match for `selector` in `scope`, in document order and without duplicates.
	///
	/// # Errors
	///
	/// Iff `selector` is malformed.
	pub fn all_in(&self, scope: &Scope, selector: &str) -> Result<Vec<NodeId>, RenderError> {
		let mut matches: Vec<NodeId> = Vec::new();
		for alternative in split_top_level(selector, ',')? {
			let alternative = alternative.trim();
			if alternative.is_empty() {
				continue;
			}
			for found in self.resolve_piece(scope, Piece::classify(alternative))?.0 {
				if !matches.contains(&found) {
					matches.push(found);
				}
			}
		}
		matches.sort_by(|&a, &b| self.dom.document_order(a, b));
		Ok(matches)
	}

	/// Matches of one alternative, plus whether they must be taken as-is (`:main`, `:layer`).
	fn resolve_piece(&self, scope: &Scope, piece: Piece<'_>) -> Result<(Vec<NodeId>, bool), RenderError> {
		match piece {
			Piece::None => Ok((Vec::new(), true)),
			Piece::Layer => Ok((self.layer_element(scope).into_iter().filter(|&n| self.admissible(scope, n)).collect(), true)),
			Piece::Origin => Ok((scope.origin.into_iter().filter(|&n| self.admissible(scope, n)).collect(), true)),
			Piece::Main(template) => {
				let agnostic = Scope { origin: None, ..*scope };
				for main_target in self.config.main_targets_for(scope.mode) {
					let expanded = replace_pseudo(template, ":main", &main_target);
					if find_pseudo(&expanded, ":main").is_some() {
						warn!("Main target {:?} refers to `:main` itself. Skipping it.", main_target);
						continue;
					}
					let mut found = Vec::new();
					for alternative in split_top_level(&expanded, ',')? {
						found.extend(self.resolve_piece(&agnostic, Piece::classify(alternative.trim()))?.0);
					}
					if !found.is_empty() {
						trace!(main_target = %main_target, "Expanded `:main`.");
						found.dedup();
						return Ok((found, true));
					}
				}
				Ok((Vec::new(), true))
			}
			Piece::Css(css) => {
				let css = self.substitute(scope, css)?;
				let Some(css) = css else {
					return Ok((Vec::new(), false));
				};
				let parsed = Selector::parse(&css)?;
				let found = parsed.select_subtree(self.dom, scope.root).into_iter().filter(|&n| self.admissible(scope, n)).collect();
				Ok((found, false))
			}
		}
	}

	/// Textually expands `:layer` and `:origin` inside compounds via the target deriver.
	///
	/// [`None`] iff the selector can't match anything, e.g. because there is no origin.
	fn substitute(&self, scope: &Scope, css: &str) -> Result<Option<String>, RenderError> {
		let mut css = css.to_owned();
		for (pseudo, element) in [(":layer", self.layer_element(scope)), (":origin", scope.origin)] {
			if find_pseudo(&css, pseudo).is_none() {
				continue;
			}
			let Some(element) = element else {
				return Ok(None);
			};
			match self.deriver.derive(self.dom, element) {
				Ok(derived) => css = replace_pseudo(&css, pseudo, &derived),
				Err(error) => {
					warn!("{} Treating {:?} as unmatchable.", error, css);
					return Ok(None);
				}
			}
		}
		Ok(Some(css))
	}

	/// `:layer`'s element: The layer's content, or the body (else first element) of a detached
	/// document.
	fn layer_element(&self, scope: &Scope) -> Option<NodeId> {
		match scope.layer {
			Some(layer) => self.layers.get(layer).map(|l| l.content()),
			None => {
				let body = self.dom.body_of(scope.root);
				if self.dom.is_element(body) {
					Some(body)
				} else {
					self.dom.first_element_child(scope.root)
				}
			}
		}
	}

	/// Whether `node` may be returned from a query in `scope`.
	fn admissible(&self, scope: &Scope, node: NodeId) -> bool {
		if self.is_destroying(node) {
			return false;
		}
		match scope.layer {
			Some(layer) if self.dom.is_attached(node) => self.layers.contains(self.dom, layer, node),
			_ => true,
		}
	}

	/// Whether `node` or an ancestor is flagged or classed as being removed.
	#[must_use]
	pub fn is_destroying(&self, node: NodeId) -> bool {
		self.dom
			.self_and_ancestors(node)
			.any(|n| self.dom.is_destroying(n) || self.dom.has_class(n, &self.config.destroying_class))
	}

	/// Applies the region policy: The match whose subtree most tightly encloses the origin.
	fn prefer(&self, scope: &Scope, found: &[NodeId]) -> Option<NodeId> {
		match (scope.match_policy, scope.origin) {
			(MatchPolicy::Region, Some(origin)) if found.len() > 1 => {
				found.iter().copied().min_by_key(|&candidate| origin_distance(self.dom, origin, candidate))
			}
			_ => found.first().copied(),
		}
	}
}

/// Steps from `origin` up to the lowest ancestor-or-self it shares with `candidate`.
///
/// Candidates in another tree are infinitely far away.
#[must_use]
pub fn origin_distance(dom: &Dom, origin: NodeId, candidate: NodeId) -> usize {
	dom.self_and_ancestors(origin).position(|ancestor| dom.is_ancestor_or_self(ancestor, candidate)).unwrap_or(usize::MAX)
}
