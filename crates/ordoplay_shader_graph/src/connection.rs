// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (link) descriptors between node ports.

use crate::node::NodeId;
use crate::port::{InputRef, OutputRef};
use serde::{Deserialize, Serialize};

/// A link from an output port of one node to an input port of another
///
/// Port indices address the node's output and input lists, not the
/// parameter positions of the entry point signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Source node
    pub from_node: NodeId,
    /// Index into the source node's outputs
    pub from_port: usize,
    /// Sink node
    pub to_node: NodeId,
    /// Index into the sink node's inputs
    pub to_port: usize,
}

impl Connection {
    /// Create a new connection
    pub fn new(from_node: usize, from_port: usize, to_node: usize, to_port: usize) -> Self {
        Self {
            from_node: NodeId(from_node),
            from_port,
            to_node: NodeId(to_node),
            to_port,
        }
    }

    /// Producing end
    pub fn source(&self) -> OutputRef {
        OutputRef::new(self.from_node, self.from_port)
    }

    /// Consuming end
    pub fn target(&self) -> InputRef {
        InputRef::new(self.to_node, self.to_port)
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }
}

impl From<(OutputRef, InputRef)> for Connection {
    fn from((source, target): (OutputRef, InputRef)) -> Self {
        Self {
            from_node: source.node,
            from_port: source.port,
            to_node: target.node,
            to_port: target.port,
        }
    }
}
