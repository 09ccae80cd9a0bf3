use crate::dom::NodeId;
use thiserror::Error;

/// The ways a render call (or a query on behalf of one) can fail.
///
/// Cloneable so that the same failure can settle both the rendered and the finished phase of a
/// [`RenderHandle`](`crate::render::RenderHandle`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
	/// No (complete) target could be matched in the current page and/or the new content.
	#[error("could not match target {target:?}")]
	CannotMatch { target: String },

	#[error("unknown layer {0:?}")]
	UnknownLayer(String),

	/// Superseded by a newer render call or vetoed by a guard listener.
	#[error("render aborted: {reason}")]
	Aborted { reason: String },

	/// Transport failure or timeout reported by the network collaborator.
	#[error("network failure: {0}")]
	Offline(String),

	/// The server responded with a non-success status.
	#[error("server responded with status {status}")]
	ServerError { status: u16 },

	#[error(transparent)]
	Selector(#[from] SelectorError),

	#[error(transparent)]
	Parse(#[from] ParseError),

	#[error("invalid render options: {0}")]
	InvalidOptions(String),
}

impl RenderError {
	pub(crate) fn cannot_match(target: impl Into<String>) -> Self {
		Self::CannotMatch { target: target.into() }
	}

	pub(crate) fn aborted(reason: impl Into<String>) -> Self {
		Self::Aborted { reason: reason.into() }
	}

	#[must_use]
	pub fn is_aborted(&self) -> bool {
		matches!(self, Self::Aborted { .. })
	}

	#[must_use]
	pub fn is_offline(&self) -> bool {
		matches!(self, Self::Offline(_))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
	#[error("empty selector")]
	Empty,
	#[error("unbalanced brackets, parentheses or quotes in selector {0:?}")]
	Unbalanced(String),
	#[error("unsupported selector {0:?}")]
	Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTML parse error at byte {offset}: {message}")]
pub struct ParseError {
	pub offset: usize,
	pub message: String,
}

impl ParseError {
	pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
		Self { offset, message: message.into() }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot derive a target selector for node {0:?}")]
pub struct CannotDeriveTarget(pub NodeId);

/// A compiler or destructor failed.
///
/// These never reject a render call. They are collected on the engine's error channel instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
	#[error("compiler for {selector:?} failed on {element:?}: {message}")]
	Compile { selector: String, element: NodeId, message: String },
	#[error("destructor failed on {element:?}: {message}")]
	Destroy { element: NodeId, message: String },
}
