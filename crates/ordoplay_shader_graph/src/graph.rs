// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure owning nodes and the links between their ports.
//!
//! Nodes are stored in insertion order and addressed by [`NodeId`]. Every link
//! is recorded on both of its ends; all mutation goes through [`Graph`] so the
//! input's link and the output's link list never disagree.

use crate::connection::Connection;
use crate::error::{Result, ShaderGraphError};
use crate::node::{NodeId, ShaderNode};
use crate::port::{InputPort, InputRef, OutputPort, OutputRef};

/// An arena of shader nodes and their links
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<ShaderNode>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from nodes and link descriptors
    ///
    /// Fails on out of range indices, incompatible types, or an input that
    /// is linked more than once.
    pub fn with_connections(nodes: Vec<ShaderNode>, connections: &[Connection]) -> Result<Self> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }
        for connection in connections {
            graph.connect(connection)?;
        }
        Ok(graph)
    }

    /// Add a node to the graph
    ///
    /// Links the node may have had in another graph are dropped.
    pub fn add_node(&mut self, mut node: ShaderNode) -> NodeId {
        node.clear_links();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Remove a node, unlinking it first
    ///
    /// Nodes after the removed one shift down by one position.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<ShaderNode> {
        let node = self.try_node(node_id)?;
        let (num_inputs, num_outputs) = (node.inputs().len(), node.outputs().len());
        for port in 0..num_inputs {
            self.unlink(InputRef::new(node_id, port))?;
        }
        for port in 0..num_outputs {
            self.unlink_all(OutputRef::new(node_id, port))?;
        }

        let removed = self.nodes.remove(node_id.0);
        let shift = |id: NodeId| if id > node_id { NodeId(id.0 - 1) } else { id };
        for node in &mut self.nodes {
            for input in node.inputs_mut() {
                input.remap(shift);
            }
            for output in node.outputs_mut() {
                output.remap(shift);
            }
        }
        Ok(removed)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&ShaderNode> {
        self.nodes.get(node_id.0)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &ShaderNode> {
        self.nodes.iter()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Rename a node
    pub fn set_display_name(&mut self, node_id: NodeId, name: impl Into<String>) -> Result<()> {
        self.try_node_mut(node_id)?.set_display_name(name);
        Ok(())
    }

    /// Replace a node's editor metadata
    pub fn set_metadata(&mut self, node_id: NodeId, metadata: serde_json::Value) -> Result<()> {
        self.try_node_mut(node_id)?.set_metadata(metadata);
        Ok(())
    }

    /// Override the default value of an input
    pub fn set_default_value(&mut self, input: InputRef, value: Option<String>) -> Result<()> {
        self.input_mut(input)?.set_default_value(value);
        Ok(())
    }

    /// Get an input port
    pub fn input(&self, input: InputRef) -> Result<&InputPort> {
        self.try_node(input.node)?
            .input(input.port)
            .ok_or(ShaderGraphError::InputNotFound(input))
    }

    /// Get an output port
    pub fn output(&self, output: OutputRef) -> Result<&OutputPort> {
        self.try_node(output.node)?
            .output(output.port)
            .ok_or(ShaderGraphError::OutputNotFound(output))
    }

    /// Link an output to an input
    ///
    /// Fails with an invalid state error if the input already has a link.
    /// Both ends must belong to different nodes.
    pub fn link(&mut self, from: OutputRef, to: InputRef) -> Result<()> {
        let source_type = self.output(from)?.port_type();
        let target = self.input(to)?;
        if from.node == to.node {
            return Err(ShaderGraphError::SelfLink(to.node.0));
        }
        if target.is_linked() {
            return Err(ShaderGraphError::AlreadyLinked(to));
        }
        if !source_type.can_connect_to(&target.port_type()) {
            return Err(ShaderGraphError::IncompatiblePorts {
                from: source_type.to_string(),
                to: target.port_type().to_string(),
            });
        }

        self.input_mut(to)?.set_link(from);
        self.output_mut(from)?.add_link(to);
        Ok(())
    }

    /// Link an input to an output, the input side view of [`Graph::link`]
    pub fn link_input(&mut self, to: InputRef, from: OutputRef) -> Result<()> {
        self.link(from, to)
    }

    /// Apply a link descriptor
    ///
    /// Unlike [`Graph::link`], a second link to the same input is reported as
    /// a malformed graph rather than a state conflict.
    pub fn connect(&mut self, connection: &Connection) -> Result<()> {
        match self.link(connection.source(), connection.target()) {
            Err(ShaderGraphError::AlreadyLinked(input)) => Err(ShaderGraphError::DuplicateInputLink(input)),
            other => other,
        }
    }

    /// Remove the link of an input, if any
    pub fn unlink(&mut self, to: InputRef) -> Result<()> {
        if let Some(from) = self.input_mut(to)?.take_link() {
            self.output_mut(from)?.remove_link(to);
        }
        Ok(())
    }

    /// Remove one link of an output; no-op if the input is fed by something else
    pub fn unlink_output(&mut self, from: OutputRef, to: InputRef) -> Result<()> {
        self.output(from)?;
        if self.input(to)?.link() == Some(from) {
            self.unlink(to)?;
        }
        Ok(())
    }

    /// Remove every link of an output
    pub fn unlink_all(&mut self, from: OutputRef) -> Result<()> {
        let targets = self.output_mut(from)?.take_links();
        for to in targets {
            self.input_mut(to)?.take_link();
        }
        Ok(())
    }

    /// All links, ordered by consuming node then input index
    pub fn connections(&self) -> Vec<Connection> {
        self.node_ids()
            .flat_map(|id| {
                self.nodes[id.0]
                    .inputs()
                    .iter()
                    .enumerate()
                    .filter_map(move |(port, input)| {
                        input.link().map(|from| Connection::from((from, InputRef::new(id, port))))
                    })
            })
            .collect()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> Vec<Connection> {
        self.connections()
            .into_iter()
            .filter(|c| c.involves_node(node_id))
            .collect()
    }

    /// Get the number of links
    pub fn connection_count(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.inputs())
            .filter(|i| i.is_linked())
            .count()
    }

    fn try_node(&self, node_id: NodeId) -> Result<&ShaderNode> {
        self.nodes
            .get(node_id.0)
            .ok_or(ShaderGraphError::NodeNotFound(node_id.0))
    }

    fn try_node_mut(&mut self, node_id: NodeId) -> Result<&mut ShaderNode> {
        self.nodes
            .get_mut(node_id.0)
            .ok_or(ShaderGraphError::NodeNotFound(node_id.0))
    }

    fn input_mut(&mut self, input: InputRef) -> Result<&mut InputPort> {
        self.try_node_mut(input.node)?
            .inputs_mut()
            .get_mut(input.port)
            .ok_or(ShaderGraphError::InputNotFound(input))
    }

    fn output_mut(&mut self, output: OutputRef) -> Result<&mut OutputPort> {
        self.try_node_mut(output.node)?
            .outputs_mut()
            .get_mut(output.port)
            .ok_or(ShaderGraphError::OutputNotFound(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ShaderContext;
    use crate::error::ErrorKind;
    use crate::resolver::FragmentLibrary;

    const SOURCE: &str = "float4 main(float4 color) { return color * 0.4f; }";
    const SCALAR: &str = "float main(float v) { return v; }";

    fn graph_of(count: usize) -> Graph {
        let ctx = ShaderContext::new(FragmentLibrary::new());
        let mut graph = Graph::new();
        for _ in 0..count {
            graph.add_node(ShaderNode::from_source(SOURCE, &ctx).unwrap());
        }
        graph
    }

    fn out(node: usize) -> OutputRef {
        OutputRef::new(NodeId(node), 0)
    }

    fn inp(node: usize) -> InputRef {
        InputRef::new(NodeId(node), 0)
    }

    #[test]
    fn test_link_both_ends() {
        let mut graph = graph_of(2);
        graph.link(out(0), inp(1)).unwrap();
        assert_eq!(graph.input(inp(1)).unwrap().link(), Some(out(0)));
        assert_eq!(graph.output(out(0)).unwrap().links(), &[inp(1)]);
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_relink_is_invalid_state() {
        let mut graph = graph_of(3);
        graph.link(out(0), inp(2)).unwrap();
        let err = graph.link_input(inp(2), out(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        // Nothing changed on the rejected producer.
        assert!(!graph.output(out(1)).unwrap().is_linked());

        graph.unlink(inp(2)).unwrap();
        assert!(!graph.output(out(0)).unwrap().is_linked());
        graph.link(out(1), inp(2)).unwrap();
        assert_eq!(graph.input(inp(2)).unwrap().link(), Some(out(1)));
    }

    #[test]
    fn test_unlink_unlinked_is_noop() {
        let mut graph = graph_of(1);
        graph.unlink(inp(0)).unwrap();
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_unlink_all() {
        let mut graph = graph_of(4);
        for consumer in 1..4 {
            graph.link(out(0), inp(consumer)).unwrap();
        }
        assert_eq!(graph.output(out(0)).unwrap().links().len(), 3);

        graph.unlink_all(out(0)).unwrap();
        for consumer in 1..4 {
            assert!(!graph.input(inp(consumer)).unwrap().is_linked());
        }
        assert!(!graph.output(out(0)).unwrap().is_linked());
    }

    #[test]
    fn test_unlink_output_single() {
        let mut graph = graph_of(3);
        graph.link(out(0), inp(1)).unwrap();
        graph.link(out(0), inp(2)).unwrap();
        graph.unlink_output(out(0), inp(1)).unwrap();
        assert_eq!(graph.output(out(0)).unwrap().links(), &[inp(2)]);
        assert!(!graph.input(inp(1)).unwrap().is_linked());

        // Input fed by a different producer stays linked.
        graph.unlink_output(out(1), inp(2)).unwrap();
        assert!(graph.input(inp(2)).unwrap().is_linked());
    }

    #[test]
    fn test_bad_references() {
        let mut graph = graph_of(2);
        assert!(matches!(
            graph.link(OutputRef::new(NodeId(0), 4), inp(1)),
            Err(ShaderGraphError::OutputNotFound(_))
        ));
        assert!(matches!(
            graph.link(out(0), InputRef::new(NodeId(1), 9)),
            Err(ShaderGraphError::InputNotFound(_))
        ));
        assert!(matches!(graph.link(out(5), inp(1)), Err(ShaderGraphError::NodeNotFound(5))));
    }

    #[test]
    fn test_self_link_rejected() {
        let mut graph = graph_of(2);
        let err = graph.link(out(0), inp(0)).unwrap_err();
        assert_eq!(err, ShaderGraphError::SelfLink(0));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!graph.input(inp(0)).unwrap().is_linked());
        assert!(!graph.output(out(0)).unwrap().is_linked());
        assert_eq!(graph.connection_count(), 0);

        let err = Graph::with_connections(graph.nodes().cloned().collect(), &[Connection::new(1, 0, 1, 0)]).unwrap_err();
        assert_eq!(err, ShaderGraphError::SelfLink(1));
    }

    #[test]
    fn test_incompatible_types() {
        let ctx = ShaderContext::new(FragmentLibrary::new());
        let mut graph = graph_of(1);
        graph.add_node(ShaderNode::from_source(SCALAR, &ctx).unwrap());
        let err = graph.link(out(1), inp(0)).unwrap_err();
        assert!(matches!(err, ShaderGraphError::IncompatiblePorts { .. }));
    }

    #[test]
    fn test_connect_duplicate_is_invalid_argument() {
        let err = Graph::with_connections(
            graph_of(3).nodes().cloned().collect(),
            &[Connection::new(0, 0, 2, 0), Connection::new(1, 0, 2, 0)],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(matches!(err, ShaderGraphError::DuplicateInputLink(_)));
    }

    #[test]
    fn test_remove_node_unlinks_and_remaps() {
        let mut graph = graph_of(3);
        graph.link(out(0), inp(1)).unwrap();
        graph.link(out(1), inp(2)).unwrap();

        graph.remove_node(NodeId(0)).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(!graph.input(inp(0)).unwrap().is_linked());
        assert_eq!(graph.connections(), vec![Connection::new(0, 0, 1, 0)]);
        assert_eq!(graph.output(out(0)).unwrap().links(), &[inp(1)]);
    }

    #[test]
    fn test_add_node_drops_foreign_links() {
        let mut graph = graph_of(2);
        graph.link(out(0), inp(1)).unwrap();
        let copy = graph.node(NodeId(1)).unwrap().clone();

        let mut other = Graph::new();
        let id = other.add_node(copy);
        assert!(!other.input(InputRef::new(id, 0)).unwrap().is_linked());
    }

    #[test]
    fn test_connections_for_node() {
        let mut graph = graph_of(3);
        graph.link(out(0), inp(1)).unwrap();
        graph.link(out(1), inp(2)).unwrap();
        assert_eq!(graph.connections_for_node(NodeId(1)).len(), 2);
        assert_eq!(graph.connections_for_node(NodeId(2)), vec![Connection::new(1, 0, 2, 0)]);
    }
}
