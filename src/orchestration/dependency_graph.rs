//! # Dependency Graph Analysis
//!
//! Builds the "depends on" graph between bundled definitions from their
//! sub-definition references, detects cycles and yields the activation order.
//!
//! Nodes are definition names. A depth-first search tracks the current path;
//! reaching a node that is still on that path is a back-edge and the slice of the
//! path starting at that node is reported as a cycle. Nodes are appended to the
//! order when their search finishes (post-order), so every dependency precedes its
//! dependents. References to names outside the analysed set are ignored.
//!
//! When a cycle exists the order is still returned but is not authoritative;
//! callers must refuse to proceed.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::definitions::BundledDefinition;

/// A graph node: a definition name and the names it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub name: String,
    pub dependencies: Vec<String>,
}

impl DependencyNode {
    pub fn new(name: impl Into<String>, dependencies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            dependencies,
        }
    }
}

impl From<&BundledDefinition> for DependencyNode {
    fn from(definition: &BundledDefinition) -> Self {
        Self::new(definition.name.clone(), definition.dependency_names.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphAnalysis {
    pub has_cycle: bool,
    /// Each cycle as the path slice starting at the repeated node
    pub cycles: Vec<Vec<String>>,
    /// Dependency-first order; only meaningful when `has_cycle` is false
    pub order: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DependencyGraphAnalyzer;

impl DependencyGraphAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_definitions(&self, definitions: &[BundledDefinition]) -> GraphAnalysis {
        let nodes: Vec<DependencyNode> = definitions.iter().map(DependencyNode::from).collect();
        self.analyze(&nodes)
    }

    pub fn analyze(&self, nodes: &[DependencyNode]) -> GraphAnalysis {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut roots: Vec<&str> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let edges = adjacency.entry(node.name.as_str()).or_default();
            edges.extend(node.dependencies.iter().map(String::as_str));
            if !roots.contains(&node.name.as_str()) {
                roots.push(node.name.as_str());
            }
        }

        let mut search = Search {
            adjacency: &adjacency,
            visited: HashSet::new(),
            on_path: HashSet::new(),
            path: Vec::new(),
            cycles: Vec::new(),
            order: Vec::new(),
        };
        for root in roots {
            search.visit(root);
        }

        GraphAnalysis {
            has_cycle: !search.cycles.is_empty(),
            cycles: search.cycles,
            order: search.order,
        }
    }
}

struct Search<'a> {
    adjacency: &'a HashMap<&'a str, Vec<&'a str>>,
    visited: HashSet<&'a str>,
    on_path: HashSet<&'a str>,
    path: Vec<&'a str>,
    cycles: Vec<Vec<String>>,
    order: Vec<String>,
}

impl<'a> Search<'a> {
    fn visit(&mut self, name: &'a str) {
        if self.on_path.contains(name) {
            if let Some(start) = self.path.iter().position(|n| *n == name) {
                self.cycles
                    .push(self.path[start..].iter().map(|n| n.to_string()).collect());
            }
            return;
        }
        if self.visited.contains(name) {
            return;
        }

        self.on_path.insert(name);
        self.path.push(name);

        let adjacency = self.adjacency;
        if let Some(dependencies) = adjacency.get(name) {
            for dependency in dependencies {
                // unknown references point outside the bundle
                if adjacency.contains_key(dependency) {
                    self.visit(dependency);
                }
            }
        }

        self.path.pop();
        self.on_path.remove(name);
        self.visited.insert(name);
        self.order.push(name.to_string());
    }
}
