// SPDX-License-Identifier: MIT OR Apache-2.0
//! Free port discovery and parameter naming.
//!
//! A port is free when nothing is linked to it. Free ports of a subgraph
//! become the parameters of the composite node, named
//! `<displayName>_<portName>`.

use crate::config::CompilerOptions;
use crate::error::{Result, ShaderGraphError};
use crate::graph::Graph;
use crate::node::{NodeId, ShaderNode};
use crate::port::{Port, PortDirection, PortType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Port name used in composite names for return values
const RETURN_PORT_NAME: &str = "result";

/// One entry of a compiled parameter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderParameter {
    /// Externally visible name
    pub name: String,
    /// Shader type of the parameter
    pub type_name: PortType,
    /// Whether the parameter is written by the shader
    pub is_output: bool,
    /// Default value expression (for inputs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl ShaderParameter {
    /// Describe a port as a parameter
    pub fn from_port(port: &Port) -> Self {
        Self {
            name: port.name.clone(),
            type_name: port.port_type,
            is_output: port.direction == PortDirection::Output,
            default_value: port.default_value.clone(),
        }
    }
}

/// A free port of a child node
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FreePort {
    /// Owning node
    pub node: NodeId,
    /// Index into the node's inputs or outputs
    pub port: usize,
    /// Identifier used in the generated entry point signature
    pub argument: String,
    /// Port of the composite node
    pub composite: Port,
}

/// Free ports of a subgraph, in emission order
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FreePorts {
    pub inputs: Vec<FreePort>,
    pub outputs: Vec<FreePort>,
    /// Type of the sink's return value, which becomes the graph's return value
    pub return_type: Option<PortType>,
}

impl FreePorts {
    /// Ports of the composite node: inputs, then the return value and outputs
    pub fn composite_ports(&self) -> (Vec<Port>, Vec<Port>) {
        let inputs = self.inputs.iter().map(|p| p.composite.clone()).collect();
        let outputs = self
            .return_type
            .map(Port::return_value)
            .into_iter()
            .chain(self.outputs.iter().map(|p| p.composite.clone()))
            .collect();
        (inputs, outputs)
    }
}

/// Name a node by its display name, or by its position when it has none
pub(crate) fn node_label(node: &ShaderNode, position: usize) -> String {
    if node.display_name().is_empty() {
        format!("node{position}")
    } else {
        node.display_name().to_string()
    }
}

fn composite_name(label: &str, port: &Port) -> String {
    let port_name = if port.name.is_empty() {
        RETURN_PORT_NAME
    } else {
        port.name.as_str()
    };
    format!("{label}_{port_name}")
}

/// Collect free inputs and outputs following `order`
///
/// The sink's return value is not a free output; it is the graph's return
/// value. Fails if two free ports end up with the same composite name.
pub(crate) fn collect_free_ports(
    graph: &Graph,
    order: &[NodeId],
    sink: NodeId,
    options: &CompilerOptions,
) -> Result<FreePorts> {
    let mut free = FreePorts::default();
    let mut names = HashSet::new();
    let mut claim = |name: String| {
        if names.insert(name.clone()) {
            Ok(name)
        } else {
            Err(ShaderGraphError::DuplicateParameterName(name))
        }
    };

    let mut outputs = Vec::new();
    for (position, &id) in order.iter().enumerate() {
        let Some(node) = graph.node(id) else {
            return Err(ShaderGraphError::NodeNotFound(id.0));
        };
        let label = node_label(node, position);

        for (port, input) in node.inputs().iter().enumerate() {
            if input.is_linked() {
                continue;
            }
            let name = claim(composite_name(&label, input.port()))?;
            let index = free.inputs.len();
            let mut composite = Port::input(name, input.port_type(), index);
            composite.default_value = input.default_value().map(str::to_string);
            free.inputs.push(FreePort {
                node: id,
                port,
                argument: format!("{}{index}", options.param_prefix),
                composite,
            });
        }

        for (port, output) in node.outputs().iter().enumerate() {
            if output.is_linked() {
                continue;
            }
            if id == sink && output.port().is_return() {
                free.return_type = Some(output.port_type());
                continue;
            }
            let name = claim(composite_name(&label, output.port()))?;
            outputs.push((id, port, name, output.port_type()));
        }
    }

    // Outputs follow the inputs in the generated signature.
    let first_output = free.inputs.len();
    free.outputs = outputs
        .into_iter()
        .enumerate()
        .map(|(k, (node, port, name, port_type))| {
            let index = first_output + k;
            FreePort {
                node,
                port,
                argument: format!("{}{index}", options.param_prefix),
                composite: Port::output(name, port_type, index),
            }
        })
        .collect();

    Ok(free)
}
