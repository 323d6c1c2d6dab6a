//! Explicit graph construction.
//!
//! Units and edges are declared explicitly and validated together at
//! build time; there is no ambient registration of units into a
//! process-wide graph.

use super::dag::TaskGraph;
use crate::errors::{CycleDetectedError, GraphValidationError};
use crate::task::TaskUnit;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Builder producing an immutable [`TaskGraph`].
///
/// Declaration order is free: an edge may name units added later.
/// All validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    name: String,
    units: Vec<TaskUnit>,
    edges: Vec<(String, String)>,
}

impl GraphBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Adds a task unit.
    #[must_use]
    pub fn unit(mut self, unit: TaskUnit) -> Self {
        self.units.push(unit);
        self
    }

    /// Adds a directed edge: `from` must complete before `to` starts.
    #[must_use]
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Adds a chain of edges between consecutive unit names.
    #[must_use]
    pub fn chain(mut self, names: &[&str]) -> Self {
        for pair in names.windows(2) {
            self.edges.push((pair[0].to_string(), pair[1].to_string()));
        }
        self
    }

    /// Returns the number of units declared so far.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Validates the declarations and builds the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph is empty, a unit name is invalid or
    /// duplicated, an edge references an unknown unit or itself, an edge
    /// is duplicated, or the graph contains a cycle.
    pub fn build(self) -> Result<TaskGraph, GraphValidationError> {
        if self.units.is_empty() {
            return Err(GraphValidationError::new("Task graph has no units"));
        }

        let mut units: HashMap<String, TaskUnit> = HashMap::new();
        for unit in self.units {
            unit.validate()?;
            if units.contains_key(&unit.name) {
                return Err(GraphValidationError::new(format!(
                    "Duplicate task unit name '{}'",
                    unit.name
                ))
                .with_units(vec![unit.name]));
            }
            units.insert(unit.name.clone(), unit);
        }

        let mut predecessors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut successors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in &self.edges {
            for endpoint in [from, to] {
                if !units.contains_key(endpoint) {
                    return Err(GraphValidationError::new(format!(
                        "Edge '{from}' -> '{to}' references unknown unit '{endpoint}'"
                    ))
                    .with_units(vec![from.clone(), to.clone()]));
                }
            }
            if from == to {
                return Err(GraphValidationError::new(format!(
                    "Unit '{from}' cannot depend on itself"
                ))
                .with_units(vec![from.clone()]));
            }
            let inserted = successors
                .entry(from.clone())
                .or_default()
                .insert(to.clone());
            if !inserted {
                return Err(GraphValidationError::new(format!(
                    "Duplicate edge '{from}' -> '{to}'"
                ))
                .with_units(vec![from.clone(), to.clone()]));
            }
            predecessors.entry(to.clone()).or_default().insert(from.clone());
        }

        // Acyclicity implies every unit is reachable from an entry unit:
        // walking predecessors from any node must bottom out at a unit
        // with none.
        let topo_order = topological_order(&units, &predecessors)?;

        Ok(TaskGraph::new(
            self.name,
            units,
            predecessors,
            successors,
            topo_order,
        ))
    }
}

/// Computes a deterministic topological order, or reports a cycle.
fn topological_order(
    units: &HashMap<String, TaskUnit>,
    predecessors: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>, GraphValidationError> {
    let mut order = Vec::with_capacity(units.len());
    let mut visited = HashSet::new();
    let mut on_path = HashSet::new();
    let mut path = Vec::new();

    // Sorted iteration keeps the order stable across builds.
    let mut names: Vec<&String> = units.keys().collect();
    names.sort();

    for name in names {
        visit(name, predecessors, &mut visited, &mut on_path, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit(
    node: &str,
    predecessors: &BTreeMap<String, BTreeSet<String>>,
    visited: &mut HashSet<String>,
    on_path: &mut HashSet<String>,
    path: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<(), GraphValidationError> {
    if visited.contains(node) {
        return Ok(());
    }
    if on_path.contains(node) {
        let start = path.iter().position(|n| n == node).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..].to_vec();
        cycle.push(node.to_string());
        return Err(CycleDetectedError::new(cycle).into());
    }

    on_path.insert(node.to_string());
    path.push(node.to_string());

    if let Some(preds) = predecessors.get(node) {
        for pred in preds {
            visit(pred, predecessors, visited, on_path, path, order)?;
        }
    }

    path.pop();
    on_path.remove(node);
    visited.insert(node.to_string());
    order.push(node.to_string());
    Ok(())
}
