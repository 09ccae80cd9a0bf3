use crate::dom::NodeId;
use hashbrown::HashSet;

/// A reusable scratch set of nodes.
#[derive(Debug, Default)]
pub struct TempNodeSet(HashSet<NodeId>);
impl TempNodeSet {
	pub fn new() -> Self {
		Self(HashSet::new())
	}

	/// Clears the set and lends it out.
	pub fn temp(&mut self) -> &mut HashSet<NodeId> {
		self.0.clear();
		&mut self.0
	}

	/// Retrieves the set's capacity without clearing it first.
	pub fn capacity(&self) -> usize {
		self.0.capacity()
	}
}
