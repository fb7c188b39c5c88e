// Copyright 2025 Irreducible Inc.
use cranelift_entity::PrimaryMap;

/// A node in the namespace tree of one run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(u32);
cranelift_entity::entity_impl!(Namespace);

struct Node {
	name: String,
	parent: Namespace,
}

/// Hierarchy of [`CircuitBuilder::subcircuit`] names.
///
/// [`CircuitBuilder::subcircuit`]: crate::CircuitBuilder::subcircuit
pub struct NamespaceTree {
	root: Namespace,
	nodes: PrimaryMap<Namespace, Node>,
}

impl NamespaceTree {
	/// Creates a tree holding only the unnamed root.
	pub fn new() -> Self {
		let mut nodes = PrimaryMap::new();
		let root = nodes.push(Node {
			name: String::new(),
			parent: Namespace(0),
		});
		Self { root, nodes }
	}

	/// Adds a child named `name` under `parent`.
	pub fn extend(&mut self, parent: Namespace, name: impl Into<String>) -> Namespace {
		self.nodes.push(Node {
			name: name.into(),
			parent,
		})
	}

	/// The dotted path of `ns`, e.g. `ecdsa.mul.limb0`. The root is the empty string.
	pub fn path(&self, ns: Namespace) -> String {
		let mut names = Vec::new();
		let mut current = ns;
		while current != self.root {
			names.push(self.nodes[current].name.as_str());
			current = self.nodes[current].parent;
		}
		names.reverse();
		names.join(".")
	}

	/// The dotted path of `name` placed under `ns`.
	pub fn child_path(&self, ns: Namespace, name: &str) -> String {
		let parent = self.path(ns);
		if parent.is_empty() {
			name.to_string()
		} else {
			format!("{parent}.{name}")
		}
	}

	/// Returns the parent of the given namespace or `None` for the root.
	pub fn parent(&self, ns: Namespace) -> Option<Namespace> {
		if ns == self.root {
			return None;
		}
		Some(self.nodes[ns].parent)
	}

	/// The name of the last segment.
	pub fn name(&self, ns: Namespace) -> &str {
		&self.nodes[ns].name
	}

	/// Returns the root of the tree.
	pub fn root(&self) -> Namespace {
		self.root
	}
}

impl Default for NamespaceTree {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_paths() {
		let mut tree = NamespaceTree::new();
		let root = tree.root();
		let a = tree.extend(root, "a");
		let b = tree.extend(a, "b");
		assert_eq!(tree.path(root), "");
		assert_eq!(tree.path(b), "a.b");
		assert_eq!(tree.child_path(b, "check"), "a.b.check");
		assert_eq!(tree.child_path(root, "check"), "check");
		assert_eq!(tree.parent(b), Some(a));
		assert_eq!(tree.parent(root), None);
	}
}
