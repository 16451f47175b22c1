// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.
//!
//! Ports never point at each other directly. A link is stored as a pair of
//! [`InputRef`]/[`OutputRef`] handles into the owning [`Graph`](crate::Graph),
//! which keeps both ends consistent.

use crate::error::ShaderGraphError;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Handle of an input port: owning node and position in its input list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputRef {
    /// Owning node
    pub node: NodeId,
    /// Index into the node's inputs
    pub port: usize,
}

impl InputRef {
    /// Create a new input handle
    pub fn new(node: NodeId, port: usize) -> Self {
        Self { node, port }
    }
}

/// Handle of an output port: owning node and position in its output list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    /// Owning node
    pub node: NodeId,
    /// Index into the node's outputs
    pub port: usize,
}

impl OutputRef {
    /// Create a new output handle
    pub fn new(node: NodeId, port: usize) -> Self {
        Self { node, port }
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Position of a port in the entry point signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamIndex {
    /// The function's return value
    Return,
    /// The n-th declared parameter
    Param(usize),
}

/// Data types a material fragment may exchange through its ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// `bool`
    #[serde(rename = "bool")]
    Bool,
    /// `int`
    #[serde(rename = "int")]
    Int,
    /// `int2`
    #[serde(rename = "int2")]
    Int2,
    /// `int3`
    #[serde(rename = "int3")]
    Int3,
    /// `int4`
    #[serde(rename = "int4")]
    Int4,
    /// `uint`
    #[serde(rename = "uint")]
    Uint,
    /// `float`
    #[serde(rename = "float")]
    Float,
    /// `float2`
    #[serde(rename = "float2")]
    Float2,
    /// `float3`
    #[serde(rename = "float3")]
    Float3,
    /// `float4`, also used for colors
    #[serde(rename = "float4")]
    Float4,
    /// `float3x3`
    #[serde(rename = "float3x3")]
    Float3x3,
    /// `float4x4`
    #[serde(rename = "float4x4")]
    Float4x4,
    /// Sampled color texture handle
    #[serde(rename = "MapColor2D")]
    MapColor2D,
    /// Sampled scalar texture handle
    #[serde(rename = "MapValue2D")]
    MapValue2D,
}

impl PortType {
    /// All supported types
    pub const ALL: [PortType; 14] = [
        Self::Bool,
        Self::Int,
        Self::Int2,
        Self::Int3,
        Self::Int4,
        Self::Uint,
        Self::Float,
        Self::Float2,
        Self::Float3,
        Self::Float4,
        Self::Float3x3,
        Self::Float4x4,
        Self::MapColor2D,
        Self::MapValue2D,
    ];

    /// Type name as written in shader source
    pub fn hlsl_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int2 => "int2",
            Self::Int3 => "int3",
            Self::Int4 => "int4",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Float2 => "float2",
            Self::Float3 => "float3",
            Self::Float4 => "float4",
            Self::Float3x3 => "float3x3",
            Self::Float4x4 => "float4x4",
            Self::MapColor2D => "MapColor2D",
            Self::MapValue2D => "MapValue2D",
        }
    }

    /// Look up a type by its shader source name
    pub fn from_hlsl(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.hlsl_name() == name)
    }

    /// Check if an output of this type can feed an input of the other type
    ///
    /// Arguments are passed through generated variables, so only identical
    /// types are accepted.
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        self == other
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hlsl_name())
    }
}

impl FromStr for PortType {
    type Err = ShaderGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hlsl(s).ok_or_else(|| ShaderGraphError::UnsupportedType(s.to_string()))
    }
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, empty for return values
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Position in the entry point signature
    pub index: ParamIndex,
    /// Default value expression (for inputs)
    pub default_value: Option<String>,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, port_type: PortType, index: usize) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            port_type,
            index: ParamIndex::Param(index),
            default_value: None,
        }
    }

    /// Create a new output port bound to an `out` parameter
    pub fn output(name: impl Into<String>, port_type: PortType, index: usize) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            port_type,
            index: ParamIndex::Param(index),
            default_value: None,
        }
    }

    /// Create the output port carrying the function's return value
    pub fn return_value(port_type: PortType) -> Self {
        Self {
            name: String::new(),
            direction: PortDirection::Output,
            port_type,
            index: ParamIndex::Return,
            default_value: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Whether this port carries the return value
    pub fn is_return(&self) -> bool {
        self.index == ParamIndex::Return
    }
}

/// An input port and its optional incoming link
#[derive(Debug, Clone, PartialEq)]
pub struct InputPort {
    port: Port,
    link: Option<OutputRef>,
}

impl InputPort {
    /// Wrap an unlinked port
    pub fn new(port: Port) -> Self {
        Self { port, link: None }
    }

    /// Port description
    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.port.name
    }

    /// Port type
    pub fn port_type(&self) -> PortType {
        self.port.port_type
    }

    /// Default value expression
    pub fn default_value(&self) -> Option<&str> {
        self.port.default_value.as_deref()
    }

    /// Producer this input is linked to
    pub fn link(&self) -> Option<OutputRef> {
        self.link
    }

    /// Whether the input has a producer
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    pub(crate) fn set_default_value(&mut self, value: Option<String>) {
        self.port.default_value = value;
    }

    pub(crate) fn set_link(&mut self, source: OutputRef) {
        self.link = Some(source);
    }

    pub(crate) fn take_link(&mut self) -> Option<OutputRef> {
        self.link.take()
    }

    pub(crate) fn remap(&mut self, map: impl Fn(NodeId) -> NodeId) {
        if let Some(link) = &mut self.link {
            link.node = map(link.node);
        }
    }
}

/// An output port and the inputs it feeds
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPort {
    port: Port,
    links: Vec<InputRef>,
}

impl OutputPort {
    /// Wrap an unlinked port
    pub fn new(port: Port) -> Self {
        Self {
            port,
            links: Vec::new(),
        }
    }

    /// Port description
    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.port.name
    }

    /// Port type
    pub fn port_type(&self) -> PortType {
        self.port.port_type
    }

    /// Consumers of this output, in link order
    pub fn links(&self) -> &[InputRef] {
        &self.links
    }

    /// Whether any input consumes this output
    pub fn is_linked(&self) -> bool {
        !self.links.is_empty()
    }

    pub(crate) fn add_link(&mut self, target: InputRef) {
        self.links.push(target);
    }

    pub(crate) fn remove_link(&mut self, target: InputRef) {
        self.links.retain(|l| *l != target);
    }

    pub(crate) fn take_links(&mut self) -> Vec<InputRef> {
        std::mem::take(&mut self.links)
    }

    pub(crate) fn remap(&mut self, map: impl Fn(NodeId) -> NodeId) {
        for link in &mut self.links {
            link.node = map(link.node);
        }
    }
}
