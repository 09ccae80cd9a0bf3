//! Compilers run on newly attached elements. Destructors they return run when those elements are
//! removed again.
//!
//! Failures of either are collected on an error channel and never abort the surrounding render.

use crate::{
	collaborators::Response,
	dom::{Dom, NodeId},
	error::{LifecycleError, SelectorError},
	layer::LayerId,
	selector::Selector,
	temp_set::TempNodeSet,
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{debug, error, trace, trace_span};

/// Passed to every compiler call.
#[derive(Debug, Clone, Copy)]
pub struct CompileMeta<'a> {
	pub layer: Option<LayerId>,
	/// Whether this compile happens for revalidated content.
	pub revalidating: bool,
	pub response: Option<&'a Response>,
}

pub type Destructor = Box<dyn FnOnce(&mut Dom, NodeId) -> Result<(), String>>;
pub type Compiler = Rc<dyn Fn(&mut Dom, NodeId, &CompileMeta<'_>) -> Result<Option<Destructor>, String>>;

struct Registration {
	source: String,
	selector: Selector,
	compiler: Compiler,
}

#[derive(Default)]
pub struct Lifecycle {
	compilers: Vec<Registration>,
	destructors: HashMap<NodeId, Vec<Destructor>>,
	errors: Vec<LifecycleError>,
	skip_set: TempNodeSet,
}

impl core::fmt::Debug for Lifecycle {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Lifecycle")
			.field("compilers", &self.compilers.iter().map(|r| r.source.as_str()).collect::<Vec<_>>())
			.field("destructors", &self.destructors.len())
			.field("errors", &self.errors)
			.finish()
	}
}

impl Lifecycle {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `compiler` for elements matching `selector`. Compilers run in registration order.
	///
	/// # Errors
	///
	/// Iff `selector` doesn't parse.
	pub fn register(
		&mut self,
		selector: &str,
		compiler: impl Fn(&mut Dom, NodeId, &CompileMeta<'_>) -> Result<Option<Destructor>, String> + 'static,
	) -> Result<(), SelectorError> {
		self.compilers.push(Registration { source: selector.to_owned(), selector: Selector::parse(selector)?, compiler: Rc::new(compiler) });
		Ok(())
	}

	/// Runs all matching compilers on the elements of the subtree at `root`, in document order.
	///
	/// Subtrees rooted at an element of `skip` are left alone.
	pub fn compile(&mut self, dom: &mut Dom, root: NodeId, meta: &CompileMeta<'_>, skip: &[NodeId]) {
		let span = trace_span!("compile", ?root, revalidating = meta.revalidating);
		let _enter = span.enter();

		let elements = self.unskipped_elements(dom, root, skip);
		for element in elements {
			for registration in &self.compilers {
				if !registration.selector.matches(dom, element) {
					continue;
				}
				match (registration.compiler)(dom, element, meta) {
					Ok(Some(destructor)) => self.destructors.entry(element).or_default().push(destructor),
					Ok(None) => (),
					Err(message) => {
						error!("Compiler for {:?} failed on {:?}: {}", registration.source, element, message);
						self.errors.push(LifecycleError::Compile { selector: registration.source.clone(), element, message });
					}
				}
			}
		}
	}

	/// Runs and forgets the destructors registered for the subtree at `root`, in document order.
	///
	/// Subtrees rooted at an element of `skip` keep their destructors.
	pub fn destroy(&mut self, dom: &mut Dom, root: NodeId, skip: &[NodeId]) {
		let span = trace_span!("destroy", ?root);
		let _enter = span.enter();

		let elements = self.unskipped_elements(dom, root, skip);
		for element in elements {
			for destructor in self.destructors.remove(&element).unwrap_or_default() {
				if let Err(message) = destructor(dom, element) {
					error!("Destructor failed on {:?}: {}", element, message);
					self.errors.push(LifecycleError::Destroy { element, message });
				}
			}
		}
	}

	fn unskipped_elements(&mut self, dom: &Dom, root: NodeId, skip: &[NodeId]) -> Vec<NodeId> {
		let skipped = self.skip_set.temp();
		for &kept in skip {
			skipped.extend(dom.subtree_elements(kept));
		}
		let elements = dom.subtree_elements(root).into_iter().filter(|e| !skipped.contains(e)).collect::<Vec<_>>();
		let skipped = skipped.len();
		trace!(elements = elements.len(), skipped, scratch_capacity = self.skip_set.capacity(), "Collected elements.");
		elements
	}

	/// Forgets the destructors of elements that were freed without being destroyed.
	pub fn forget(&mut self, elements: &[NodeId]) {
		let before = self.destructors.len();
		for element in elements {
			self.destructors.remove(element);
		}
		let forgotten = before - self.destructors.len();
		if forgotten > 0 {
			trace!(forgotten, "Forgot destructors of freed elements.");
		}
	}

	/// Forgets the destructors of elements that were detached from the live document other than
	/// through [`destroy`](`Lifecycle::destroy`), e.g. by a compiler or a host mutation.
	pub fn prune(&mut self, dom: &Dom) {
		let before = self.destructors.len();
		self.destructors.retain(|&element, _| dom.is_attached(element));
		let pruned = before - self.destructors.len();
		if pruned > 0 {
			debug!(pruned, "Dropped destructors of detached elements without running them.");
		}
	}

	/// Whether any destructor is registered for `element`.
	#[must_use]
	pub fn has_destructors(&self, element: NodeId) -> bool {
		self.destructors.get(&element).map_or(false, |d| !d.is_empty())
	}

	/// Drains the error channel.
	pub fn take_errors(&mut self) -> Vec<LifecycleError> {
		core::mem::take(&mut self.errors)
	}
}
