use crate::layer::LayerMode;

/// How [`get`](`crate::render::Fragments::get`)-style lookups choose among several matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
	/// The first match in document order.
	First,
	/// The match closest to the origin, if an attached origin is given.
	Region,
}

/// Which in-flight requests a new render call aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortPolicy {
	None,
	/// Requests whose target elements overlap the new call's target elements.
	Target,
	/// Requests rendering into the same layer.
	Layer,
	All,
}

/// What to try when the primary target can't be matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
	Disabled,
	/// The targeted layer's main targets.
	MainTargets,
	/// Alternative targets, tried in order.
	Targets(Vec<String>),
}

impl From<bool> for Fallback {
	fn from(enabled: bool) -> Self {
		if enabled {
			Self::MainTargets
		} else {
			Self::Disabled
		}
	}
}

/// Whether a stale cache hit is followed by a revalidating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
	/// Revalidate stale hits only.
	Auto,
	Never,
}

#[derive(Debug, Clone)]
pub struct FragmentConfig {
	/// Main targets for every layer, tried in order after the mode-specific ones.
	pub main_targets: Vec<String>,
	/// Main targets for any overlay, tried before [`Self::main_targets`].
	pub overlay_main_targets: Vec<String>,
	pub match_policy: MatchPolicy,
	pub abort: AbortPolicy,
	pub fallback: Fallback,
	pub keep_enabled: bool,
	/// Attributes ignored when comparing kept elements by HTML.
	pub keep_volatile_attributes: Vec<String>,
	pub revalidate: Revalidate,
	/// Tag of the transient container used to insert mixed content before/after existing children.
	pub wrapper_tag: String,
	/// Elements with this class are treated like elements flagged as destroying.
	pub destroying_class: String,
}

impl Default for FragmentConfig {
	fn default() -> Self {
		Self {
			main_targets: vec!["[up-main='']".to_owned(), "main".to_owned(), ":layer".to_owned()],
			overlay_main_targets: vec!["[up-main~=overlay]".to_owned()],
			match_policy: MatchPolicy::Region,
			abort: AbortPolicy::Target,
			fallback: Fallback::Disabled,
			keep_enabled: true,
			keep_volatile_attributes: ["up-etag", "up-time", "up-source", "nonce"].iter().map(|&a| a.to_owned()).collect(),
			revalidate: Revalidate::Auto,
			wrapper_tag: "up-wrapper".to_owned(),
			destroying_class: "up-destroying".to_owned(),
		}
	}
}

impl FragmentConfig {
	/// The main targets for a layer of `mode`, most specific first.
	#[must_use]
	pub fn main_targets_for(&self, mode: LayerMode) -> Vec<String> {
		let mut targets = Vec::new();
		if mode.is_overlay() {
			targets.push(format!("[up-main~={}]", mode.name()));
			targets.extend(self.overlay_main_targets.iter().cloned());
		} else {
			targets.push("[up-main~=root]".to_owned());
		}
		targets.extend(self.main_targets.iter().cloned());
		targets
	}
}
