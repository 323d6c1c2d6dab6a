//! The immutable task dependency graph.

use crate::task::TaskUnit;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// An immutable directed acyclic graph of task units.
///
/// Built through [`GraphBuilder`](super::GraphBuilder), which enforces
/// acyclicity and edge validity, so consumers can rely on those
/// invariants without re-checking.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    name: String,
    units: HashMap<String, TaskUnit>,
    predecessors: BTreeMap<String, BTreeSet<String>>,
    successors: BTreeMap<String, BTreeSet<String>>,
    topo_order: Vec<String>,
}

impl TaskGraph {
    /// Assembles a graph from validated parts. Only the builder calls
    /// this; invariants are assumed to hold.
    pub(super) fn new(
        name: String,
        units: HashMap<String, TaskUnit>,
        predecessors: BTreeMap<String, BTreeSet<String>>,
        successors: BTreeMap<String, BTreeSet<String>>,
        topo_order: Vec<String>,
    ) -> Self {
        Self {
            name,
            units,
            predecessors,
            successors,
            topo_order,
        }
    }

    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of units in the graph.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Returns a unit by name.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&TaskUnit> {
        self.units.get(name)
    }

    /// Returns all unit names in a deterministic topological order.
    #[must_use]
    pub fn topo_order(&self) -> &[String] {
        &self.topo_order
    }

    /// Returns the direct predecessors of a unit.
    #[must_use]
    pub fn predecessors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.predecessors
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Returns the direct successors of a unit.
    #[must_use]
    pub fn successors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.successors
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Returns the units with no predecessors.
    #[must_use]
    pub fn entry_units(&self) -> Vec<&str> {
        self.topo_order
            .iter()
            .filter(|name| self.predecessors(name).next().is_none())
            .map(String::as_str)
            .collect()
    }

    /// Returns the units with no successors.
    #[must_use]
    pub fn exit_units(&self) -> Vec<&str> {
        self.topo_order
            .iter()
            .filter(|name| self.successors(name).next().is_none())
            .map(String::as_str)
            .collect()
    }

    /// Returns true if `ancestor` reaches `descendant` through edges.
    #[must_use]
    pub fn reaches(&self, ancestor: &str, descendant: &str) -> bool {
        let mut stack = vec![ancestor];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == descendant {
                return true;
            }
            for succ in self.successors(current) {
                if seen.insert(succ) {
                    stack.push(succ);
                }
            }
        }
        false
    }

    /// Iterates over all units.
    pub fn units(&self) -> impl Iterator<Item = &TaskUnit> {
        self.topo_order.iter().filter_map(|name| self.units.get(name))
    }
}
