// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node-to-node dependencies and evaluation order.

use crate::error::{Result, ShaderGraphError};
use crate::graph::Graph;
use crate::node::NodeId;
use indexmap::IndexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Directed "producer before consumer" edges between the nodes of a graph
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    dependencies: Vec<IndexSet<NodeId>>,
    dependents: Vec<IndexSet<NodeId>>,
}

impl DependencyGraph {
    /// Collect one edge per distinct producer of each node's linked inputs
    pub fn build(graph: &Graph) -> Self {
        let count = graph.node_count();
        let mut dependencies = vec![IndexSet::new(); count];
        let mut dependents = vec![IndexSet::new(); count];

        for (consumer, node) in graph.node_ids().zip(graph.nodes()) {
            for link in node.inputs().iter().filter_map(|i| i.link()) {
                dependencies[consumer.0].insert(link.node);
                dependents[link.node.0].insert(consumer);
            }
        }

        Self {
            dependencies,
            dependents,
        }
    }

    /// Number of vertices
    pub fn node_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Nodes that must be emitted before `node`, in input order
    pub fn dependencies(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.dependencies[node.0].iter().copied()
    }

    /// Nodes consuming an output of `node`
    pub fn dependents(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.dependents[node.0].iter().copied()
    }

    /// Nodes ordered so that every dependency precedes its dependents
    ///
    /// Depth-first from each node in insertion order, dependencies first, so
    /// the order only depends on node order and links.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut marks = vec![Mark::Unvisited; self.node_count()];
        let mut order = Vec::with_capacity(self.node_count());

        for node in (0..self.node_count()).map(NodeId) {
            self.visit(node, &mut marks, &mut order)?;
        }

        Ok(order)
    }

    fn visit(&self, node: NodeId, marks: &mut [Mark], order: &mut Vec<NodeId>) -> Result<()> {
        match marks[node.0] {
            Mark::InProgress => return Err(ShaderGraphError::CircularLinks),
            Mark::Done => return Ok(()),
            Mark::Unvisited => {}
        }

        marks[node.0] = Mark::InProgress;
        for dependency in self.dependencies(node) {
            self.visit(dependency, marks, order)?;
        }
        marks[node.0] = Mark::Done;
        order.push(node);

        Ok(())
    }

    /// The single node nothing else depends on
    pub fn sink(&self) -> Result<NodeId> {
        let sinks: Vec<NodeId> = (0..self.node_count())
            .map(NodeId)
            .filter(|n| self.dependents[n.0].is_empty())
            .collect();

        match sinks.as_slice() {
            [] => Err(ShaderGraphError::NoSinkNode),
            [sink] => Ok(*sink),
            many => Err(ShaderGraphError::MultipleSinkNodes(many.iter().map(|n| n.0).collect())),
        }
    }
}
