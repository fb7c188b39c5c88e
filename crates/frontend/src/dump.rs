// Copyright 2025 Irreducible Inc.
//! Breakdown of the emitted gates by subcircuit.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
	namespace::{Namespace, NamespaceTree},
	recorder::Emission,
};

/// Counts of emitted items by gate kind. Generic gates are counted in halves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GateBreakdown {
	/// Shows how many items of every kind there are.
	pub by_kind: BTreeMap<String, usize>,
}

impl GateBreakdown {
	fn count<'a>(emissions: impl IntoIterator<Item = &'a Emission>) -> GateBreakdown {
		let mut breakdown = GateBreakdown::default();
		for emission in emissions {
			let kind = emission.item.kind().name().to_string();
			*breakdown.by_kind.entry(kind).or_insert(0) += 1;
		}
		breakdown
	}

	fn merge(mut self, other: &GateBreakdown) -> GateBreakdown {
		for (kind, count) in &other.by_kind {
			*self.by_kind.entry(kind.clone()).or_insert(0) += count;
		}
		self
	}

	/// Total number of items.
	pub fn total(&self) -> usize {
		self.by_kind.values().sum()
	}
}

/// One subcircuit of a [`Composition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Composition {
	/// Dotted path of the subcircuit. The root has an empty path.
	pub name: String,
	/// Items emitted by the subcircuit and its children.
	pub n_gates: usize,
	/// Items emitted directly by this subcircuit.
	pub own: GateBreakdown,
	/// Items emitted by this subcircuit and its children.
	pub breakdown: GateBreakdown,
	/// Nested subcircuits that emitted anything, in creation order.
	pub children: Vec<Composition>,
}

impl Composition {
	/// Buckets the emissions of a run by the namespace that produced them.
	///
	/// Namespaces without emissions in their subtree are left out.
	pub fn collect(namespaces: &NamespaceTree, emissions: &[Emission]) -> Composition {
		let mut own: BTreeMap<Namespace, Vec<&Emission>> = BTreeMap::new();
		for emission in emissions {
			own.entry(emission.origin).or_default().push(emission);
		}

		// Every ancestor of a namespace with emissions is part of the hierarchy.
		let mut needed = BTreeSet::from([namespaces.root()]);
		for &ns in own.keys() {
			let mut current = Some(ns);
			while let Some(ns) = current {
				if !needed.insert(ns) {
					break;
				}
				current = namespaces.parent(ns);
			}
		}

		let mut children: BTreeMap<Namespace, Vec<Namespace>> = BTreeMap::new();
		for &ns in &needed {
			if let Some(parent) = namespaces.parent(ns) {
				children.entry(parent).or_default().push(ns);
			}
		}

		build(namespaces, &own, &children, namespaces.root())
	}

	/// Hierarchical JSON representation.
	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}

	/// Finds a subcircuit by its dotted path.
	pub fn find(&self, path: &str) -> Option<&Composition> {
		if self.name == path {
			return Some(self);
		}
		self.children.iter().find_map(|child| child.find(path))
	}
}

fn build(
	namespaces: &NamespaceTree,
	own: &BTreeMap<Namespace, Vec<&Emission>>,
	tree: &BTreeMap<Namespace, Vec<Namespace>>,
	ns: Namespace,
) -> Composition {
	let own_breakdown = GateBreakdown::count(own.get(&ns).into_iter().flatten().copied());
	let children: Vec<Composition> = tree
		.get(&ns)
		.into_iter()
		.flatten()
		.map(|&child| build(namespaces, own, tree, child))
		.collect();
	let breakdown = children
		.iter()
		.fold(own_breakdown.clone(), |acc, child| acc.merge(&child.breakdown));
	Composition {
		name: namespaces.path(ns),
		n_gates: breakdown.total(),
		own: own_breakdown,
		breakdown,
		children,
	}
}
