// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader node definitions.
//!
//! A node is either an *equation*, a single fragment whose ports come from its
//! entry point signature, or a *graph*, a compiled composite of other nodes
//! whose ports are the subgraph's free ports.

use crate::codegen::{self, CompiledGraph};
use crate::connection::Connection;
use crate::context::ShaderContext;
use crate::error::Result;
use crate::graph::Graph;
use crate::identity::SourceId;
use crate::params::ShaderParameter;
use crate::port::{InputPort, OutputPort, Port};
use crate::signature::{ParamQualifier, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a node inside its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A leaf fragment and its dissected entry point
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    source: String,
    signature: Signature,
}

impl Equation {
    /// Dissect a fragment
    pub fn new(source: String, entry_point: &str) -> Result<Self> {
        let signature = Signature::dissect(&source, entry_point)?;
        Ok(Self { source, signature })
    }

    /// Fragment text, verbatim
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Dissected entry point
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    fn ports(&self) -> (Vec<InputPort>, Vec<OutputPort>) {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();

        if let Some(return_type) = self.signature.return_type {
            outputs.push(OutputPort::new(Port::return_value(return_type)));
        }
        for (index, param) in self.signature.parameters.iter().enumerate() {
            match param.qualifier {
                ParamQualifier::In => {
                    let mut port = Port::input(&param.name, param.port_type, index);
                    port.default_value.clone_from(&param.default_value);
                    inputs.push(InputPort::new(port));
                }
                ParamQualifier::Out => {
                    outputs.push(OutputPort::new(Port::output(&param.name, param.port_type, index)));
                }
            }
        }
        (inputs, outputs)
    }
}

/// A composite node: its children and their compiled form
#[derive(Debug, Clone)]
pub struct ShaderGraph {
    children: Graph,
    compiled: CompiledGraph,
}

impl ShaderGraph {
    /// The linked child nodes
    pub fn children(&self) -> &Graph {
        &self.children
    }

    /// Compilation result
    pub fn compiled(&self) -> &CompiledGraph {
        &self.compiled
    }
}

/// What a node is made of
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Leaf fragment
    Equation(Equation),
    /// Compiled composite
    Graph(Box<ShaderGraph>),
}

/// A node of a material shader graph
#[derive(Debug, Clone)]
pub struct ShaderNode {
    display_name: String,
    class_name: String,
    metadata: serde_json::Value,
    kind: NodeKind,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
    id: SourceId,
}

impl ShaderNode {
    /// Create an equation node from fragment text
    pub fn from_source(source: impl Into<String>, ctx: &ShaderContext) -> Result<Self> {
        let equation = Equation::new(source.into(), &ctx.options().entry_point)?;
        Ok(Self::from_kind(NodeKind::Equation(equation), String::new(), ctx))
    }

    /// Create an equation node from a fragment registered with the resolver
    pub fn from_file(name: &str, ctx: &ShaderContext) -> Result<Self> {
        let source = ctx.resolver().load_fragment_source(name)?;
        let equation = Equation::new(source, &ctx.options().entry_point)?;
        Ok(Self::from_kind(NodeKind::Equation(equation), name.to_string(), ctx))
    }

    /// Create a graph node from nodes and link descriptors, compiling it immediately
    pub fn from_graph(nodes: Vec<ShaderNode>, connections: &[Connection], ctx: &ShaderContext) -> Result<Self> {
        let children = Graph::with_connections(nodes, connections)?;
        Self::from_linked_graph(children, ctx)
    }

    /// Create a graph node from an already linked graph, compiling it immediately
    pub fn from_linked_graph(children: Graph, ctx: &ShaderContext) -> Result<Self> {
        let compiled = codegen::compile(&children, ctx.options())?;
        let kind = NodeKind::Graph(Box::new(ShaderGraph { children, compiled }));
        let node = Self::from_kind(kind, String::new(), ctx);
        tracing::debug!("Built shader graph node {} with {} parameters", node.id, node.parameters().len());
        Ok(node)
    }

    fn from_kind(kind: NodeKind, class_name: String, ctx: &ShaderContext) -> Self {
        let mut node = Self {
            display_name: String::new(),
            class_name,
            metadata: serde_json::Value::Null,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            id: SourceId::default(),
        };
        node.refresh(ctx);
        node
    }

    // Ports and identity follow the kind.
    fn refresh(&mut self, ctx: &ShaderContext) {
        let (inputs, outputs) = match &self.kind {
            NodeKind::Equation(equation) => equation.ports(),
            NodeKind::Graph(graph) => (
                graph.compiled.inputs.iter().cloned().map(InputPort::new).collect(),
                graph.compiled.outputs.iter().cloned().map(OutputPort::new).collect(),
            ),
        };
        self.inputs = inputs;
        self.outputs = outputs;
        self.id = ctx.identity().id_for(self.shader_code());
    }

    /// Replace the fragment text; on failure the node is unchanged
    pub fn set_source_code(&mut self, source: impl Into<String>, ctx: &ShaderContext) -> Result<()> {
        let equation = Equation::new(source.into(), &ctx.options().entry_point)?;
        self.kind = NodeKind::Equation(equation);
        self.class_name.clear();
        self.refresh(ctx);
        Ok(())
    }

    /// Replace the fragment with one loaded by name; on failure the node is unchanged
    pub fn set_source_file(&mut self, name: &str, ctx: &ShaderContext) -> Result<()> {
        let source = ctx.resolver().load_fragment_source(name)?;
        let equation = Equation::new(source, &ctx.options().entry_point)?;
        self.kind = NodeKind::Equation(equation);
        self.class_name = name.to_string();
        self.refresh(ctx);
        Ok(())
    }

    /// Replace the subgraph and recompile
    ///
    /// A failed compile leaves the previously compiled state in place.
    pub fn set_graph(&mut self, nodes: Vec<ShaderNode>, connections: &[Connection], ctx: &ShaderContext) -> Result<()> {
        let children = Graph::with_connections(nodes, connections)?;
        self.set_linked_graph(children, ctx)
    }

    /// Replace the subgraph with an already linked one and recompile
    ///
    /// A failed compile leaves the previously compiled state in place.
    pub fn set_linked_graph(&mut self, children: Graph, ctx: &ShaderContext) -> Result<()> {
        let compiled = match codegen::compile(&children, ctx.options()) {
            Ok(compiled) => compiled,
            Err(err) => {
                if self.is_graph() {
                    tracing::warn!(
                        "Recompiling shader graph '{}' failed, keeping previous result: {}",
                        self.display_name,
                        err
                    );
                }
                return Err(err);
            }
        };
        self.kind = NodeKind::Graph(Box::new(ShaderGraph { children, compiled }));
        self.refresh(ctx);
        tracing::debug!("Recompiled shader graph node {} as {}", self.display_name, self.id);
        Ok(())
    }

    /// Set the display name used for generated parameter names
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Display name, may be empty
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Set the display name
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }

    /// Class name used to re-create this node from a description
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Set the class name
    pub fn set_class_name(&mut self, name: impl Into<String>) {
        self.class_name = name.into();
    }

    /// Opaque editor metadata
    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    /// Set the opaque editor metadata
    pub fn set_metadata(&mut self, metadata: serde_json::Value) {
        self.metadata = metadata;
    }

    /// Node contents
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether this is a composite node
    pub fn is_graph(&self) -> bool {
        matches!(self.kind, NodeKind::Graph(_))
    }

    /// Composite contents, if this is a graph node
    pub fn as_graph(&self) -> Option<&ShaderGraph> {
        match &self.kind {
            NodeKind::Graph(graph) => Some(graph),
            NodeKind::Equation(_) => None,
        }
    }

    /// Fragment text, or the generated source of a graph node
    pub fn shader_code(&self) -> &str {
        match &self.kind {
            NodeKind::Equation(equation) => equation.source(),
            NodeKind::Graph(graph) => &graph.compiled.source,
        }
    }

    /// Content derived identity, equal for equal shader code
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Input ports
    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    /// Output ports
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&InputPort> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&OutputPort> {
        self.outputs.get(index)
    }

    /// Find an input port index by name
    pub fn find_input(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name() == name)
    }

    /// Find an output port index by name
    pub fn find_output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name() == name)
    }

    /// Parameter list of this node: every port except the return value
    pub fn parameters(&self) -> Vec<ShaderParameter> {
        let inputs = self.inputs.iter().map(|p| ShaderParameter::from_port(p.port()));
        let outputs = self
            .outputs
            .iter()
            .filter(|p| !p.port().is_return())
            .map(|p| ShaderParameter::from_port(p.port()));
        inputs.chain(outputs).collect()
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut [InputPort] {
        &mut self.inputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut [OutputPort] {
        &mut self.outputs
    }

    pub(crate) fn clear_links(&mut self) {
        for input in &mut self.inputs {
            input.take_link();
        }
        for output in &mut self.outputs {
            output.take_links();
        }
    }
}
