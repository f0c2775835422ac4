//! # Dependency Graph
//!
//! Per-type map from a property to the properties its value is computed
//! from. An edge `A → B` means "A depends on B": writing B makes A
//! outdated, and A is evaluated after B.
//!
//! Edges come from explicit schema `dependencies`, `depends_on` overrides,
//! and the variables of template defaults. Instances add their own edges
//! when a template is written as a raw value.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// The dependency relation could not be ordered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency cycle between {}", members.join(", "))]
pub struct CycleError {
    /// Properties left unordered, in declaration order.
    pub members: Vec<String>,
}

/// Property → properties it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `property → inputs` edges. Self edges are ignored.
    pub fn add<I, S>(&mut self, property: &str, inputs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.edges.entry(property.to_string()).or_default();
        for i in inputs {
            let i = i.into();
            if i != property {
                entry.insert(i);
            }
        }
        if entry.is_empty() {
            self.edges.remove(property);
        }
    }

    /// Union with another graph.
    pub fn merge(&mut self, other: &DependencyGraph) {
        for (k, v) in &other.edges {
            self.add(k, v.iter().cloned());
        }
    }

    /// Direct inputs of `property`.
    pub fn inputs(&self, property: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(property)
    }

    /// Properties that depend on `property`, directly or transitively.
    pub fn dependents(&self, property: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut queue = vec![property.to_string()];
        while let Some(p) = queue.pop() {
            for (k, inputs) in &self.edges {
                if inputs.contains(&p) && out.insert(k.clone()) {
                    queue.push(k.clone());
                }
            }
        }
        out.remove(property);
        out
    }

    /// All edges.
    pub fn as_map(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.edges
    }

    /// Whether there is no edge.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Order `keys` so that every key comes after its inputs.
///
/// Only edges between members of `keys` count. Among keys ready at the same
/// time, the one earlier in `keys` (declaration order) goes first.
///
/// # Errors
///
/// Returns the keys that could not be ordered when the edges form a cycle.
pub fn evaluation_order<F>(keys: &[String], inputs_of: F) -> Result<Vec<String>, CycleError>
where
    F: Fn(&str) -> BTreeSet<String>,
{
    let position: BTreeMap<&str, usize> = keys
        .iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();
    let mut pending: Vec<usize> = vec![0; keys.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
    for (i, k) in keys.iter().enumerate() {
        for input in inputs_of(k) {
            if let Some(&j) = position.get(input.as_str()) {
                if j != i {
                    pending[i] += 1;
                    dependents[j].push(i);
                }
            }
        }
    }
    let mut ready: BTreeSet<usize> = (0..keys.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(keys.len());
    while let Some(i) = ready.pop_first() {
        order.push(keys[i].clone());
        for &d in &dependents[i] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.insert(d);
            }
        }
    }
    if order.len() == keys.len() {
        Ok(order)
    } else {
        Err(CycleError {
            members: (0..keys.len())
                .filter(|&i| pending[i] > 0)
                .map(|i| keys[i].clone())
                .collect(),
        })
    }
}
