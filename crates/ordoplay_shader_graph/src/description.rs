// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON graph descriptions.
//!
//! A description lists nodes by class (a fragment or nested graph name known
//! to the resolver) and links between their ports. Nodes are referenced by
//! numeric id or by name and ports by index or by name, whichever the author
//! knows.
//!
//! ```json
//! {
//!   "header": { "contentType": "material" },
//!   "nodes": [
//!     { "id": 0, "class": "sample", "displayName": "Sample" },
//!     { "name": "darken", "class": "darken", "inputs": [{}, 0.4] }
//!   ],
//!   "links": [
//!     { "srcId": 0, "srcPortIdx": 0, "dstName": "darken", "dstPortName": "color" }
//!   ]
//! }
//! ```

use crate::context::ShaderContext;
use crate::error::{Result, ShaderGraphError};
use crate::graph::Graph;
use crate::node::{NodeId, ShaderNode};
use crate::port::{InputRef, OutputRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Description header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphHeader {
    /// Kind of graph, `"material"` for shader graphs
    pub content_type: String,
}

/// One node of a description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescription {
    /// Numeric id links may refer to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Name links may refer to, doubles as display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fragment or nested graph to instantiate
    #[serde(rename = "class")]
    pub class_name: String,
    /// Display name, overrides `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Opaque editor metadata
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub meta: Value,
    /// Default values of the node's inputs, `{}` or `null` keeps the fragment's own
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Value>,
}

/// One link of a description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDescription {
    /// Producing node id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_id: Option<i64>,
    /// Producing node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_name: Option<String>,
    /// Output index on the producing node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_port_idx: Option<usize>,
    /// Output name on the producing node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_port_name: Option<String>,
    /// Consuming node id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_id: Option<i64>,
    /// Consuming node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_name: Option<String>,
    /// Input index on the consuming node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port_idx: Option<usize>,
    /// Input name on the consuming node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port_name: Option<String>,
}

fn write_endpoint(
    f: &mut fmt::Formatter<'_>,
    id: Option<i64>,
    name: Option<&str>,
    port_idx: Option<usize>,
    port_name: Option<&str>,
) -> fmt::Result {
    f.write_str(name.unwrap_or_default())?;
    if let Some(id) = id {
        write!(f, "({id})")?;
    }
    match (port_idx, port_name) {
        (Some(idx), _) => write!(f, ":{idx}"),
        (None, Some(name)) => write!(f, ":{name}"),
        (None, None) => f.write_str(":?"),
    }
}

impl fmt::Display for LinkDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_endpoint(
            f,
            self.src_id,
            self.src_name.as_deref(),
            self.src_port_idx,
            self.src_port_name.as_deref(),
        )?;
        f.write_str(" and ")?;
        write_endpoint(
            f,
            self.dst_id,
            self.dst_name.as_deref(),
            self.dst_port_idx,
            self.dst_port_name.as_deref(),
        )
    }
}

/// A whole graph description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    /// Header carrying the content type
    pub header: GraphHeader,
    /// Nodes, in graph order
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    /// Links between node ports
    #[serde(default)]
    pub links: Vec<LinkDescription>,
}

impl GraphDescription {
    /// Parse a description
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render as pretty printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Describe a linked graph
    ///
    /// Nodes are identified by their position and ports by index. Every node
    /// needs a class name so the description can be loaded again.
    pub fn from_graph(graph: &Graph, content_type: &str) -> Result<Self> {
        let mut nodes = Vec::with_capacity(graph.node_count());
        for (id, node) in graph.node_ids().zip(graph.nodes()) {
            if node.class_name().is_empty() {
                return Err(ShaderGraphError::InvalidDescription(format!(
                    "node {id} has no class name and cannot be saved"
                )));
            }
            let inputs = if node.inputs().iter().any(|i| i.default_value().is_some()) {
                node.inputs()
                    .iter()
                    .map(|i| match i.default_value() {
                        Some(value) => Value::String(value.to_string()),
                        None => Value::Object(serde_json::Map::new()),
                    })
                    .collect()
            } else {
                Vec::new()
            };
            nodes.push(NodeDescription {
                id: Some(id.0 as i64),
                name: None,
                class_name: node.class_name().to_string(),
                display_name: Some(node.display_name().to_string()).filter(|n| !n.is_empty()),
                meta: node.metadata().clone(),
                inputs,
            });
        }

        let links = graph
            .connections()
            .into_iter()
            .map(|c| LinkDescription {
                src_id: Some(c.from_node.0 as i64),
                src_port_idx: Some(c.from_port),
                dst_id: Some(c.to_node.0 as i64),
                dst_port_idx: Some(c.to_port),
                ..LinkDescription::default()
            })
            .collect();

        Ok(Self {
            header: GraphHeader {
                content_type: content_type.to_string(),
            },
            nodes,
            links,
        })
    }

    /// Instantiate and link the described nodes
    pub fn build(&self, ctx: &ShaderContext) -> Result<Graph> {
        self.build_nested(ctx, 0)
    }

    fn build_nested(&self, ctx: &ShaderContext, depth: usize) -> Result<Graph> {
        let expected = &ctx.options().content_type;
        if &self.header.content_type != expected {
            return Err(ShaderGraphError::ContentTypeMismatch {
                expected: expected.clone(),
                found: self.header.content_type.clone(),
            });
        }

        let lookup = NodeLookup::new(&self.nodes)?;
        let mut graph = Graph::new();
        for desc in &self.nodes {
            let node = instantiate(&desc.class_name, ctx, depth)?;
            let id = graph.add_node(node);
            apply_node_description(&mut graph, id, desc)?;
        }

        for link in &self.links {
            resolve_link(&graph, &lookup, link)
                .and_then(|(from, to)| graph.link(from, to).map_err(|err| err.to_string()))
                .map_err(|message| ShaderGraphError::InvalidLink {
                    message,
                    link: link.to_string(),
                })?;
        }

        tracing::debug!(
            "Loaded graph description: {} nodes, {} links",
            graph.node_count(),
            graph.connection_count()
        );
        Ok(graph)
    }
}

/// Load and compile a graph node from a JSON description
pub fn load_graph(json: &str, ctx: &ShaderContext) -> Result<ShaderNode> {
    let graph = GraphDescription::from_json(json)?.build(ctx)?;
    ShaderNode::from_linked_graph(graph, ctx)
}

/// Save a linked graph as a JSON description
pub fn save_graph(graph: &Graph, ctx: &ShaderContext) -> Result<String> {
    GraphDescription::from_graph(graph, &ctx.options().content_type)?.to_json()
}

fn instantiate(class_name: &str, ctx: &ShaderContext, depth: usize) -> Result<ShaderNode> {
    let Some(json) = ctx.resolver().load_graph_description(class_name)? else {
        return ShaderNode::from_file(class_name, ctx);
    };
    if depth >= ctx.options().max_nesting_depth {
        return Err(ShaderGraphError::NestingTooDeep(class_name.to_string()));
    }

    tracing::debug!("Loading nested graph '{}' at depth {}", class_name, depth + 1);
    let children = GraphDescription::from_json(&json)?.build_nested(ctx, depth + 1)?;
    let mut node = ShaderNode::from_linked_graph(children, ctx)?;
    node.set_class_name(class_name);
    Ok(node)
}

fn apply_node_description(graph: &mut Graph, id: NodeId, desc: &NodeDescription) -> Result<()> {
    if let Some(name) = desc.display_name.as_ref().or(desc.name.as_ref()) {
        graph.set_display_name(id, name.as_str())?;
    }
    graph.set_metadata(id, desc.meta.clone())?;

    for (port, value) in desc.inputs.iter().enumerate() {
        let value = match value {
            Value::Null => continue,
            Value::Object(map) if map.is_empty() => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(ShaderGraphError::InvalidDescription(format!(
                    "default input of node {id} must be a string, a number or {{}}, found {other}"
                )))
            }
        };
        let input = InputRef::new(id, port);
        graph.input(input).map_err(|_| {
            ShaderGraphError::InvalidDescription(format!("node {id} has no input {port} to set a default for"))
        })?;
        graph.set_default_value(input, Some(value))?;
    }
    Ok(())
}

/// Node positions by id and by name
struct NodeLookup {
    ids: HashMap<i64, usize>,
    names: HashMap<String, usize>,
}

impl NodeLookup {
    fn new(nodes: &[NodeDescription]) -> Result<Self> {
        let mut ids = HashMap::new();
        let mut names = HashMap::new();
        for (position, node) in nodes.iter().enumerate() {
            if node.id.is_none() && node.name.is_none() {
                return Err(ShaderGraphError::InvalidDescription(format!(
                    "node {position} must have either id or name"
                )));
            }
            if let Some(id) = node.id {
                if ids.insert(id, position).is_some() {
                    return Err(ShaderGraphError::InvalidDescription(format!(
                        "node ids must be unique, {id} is used twice"
                    )));
                }
            }
            if let Some(name) = &node.name {
                if names.insert(name.clone(), position).is_some() {
                    return Err(ShaderGraphError::InvalidDescription(format!(
                        "node names must be unique, '{name}' is used twice"
                    )));
                }
            }
        }
        Ok(Self { ids, names })
    }

    fn find(&self, id: Option<i64>, name: Option<&str>) -> std::result::Result<NodeId, String> {
        let position = match (id, name) {
            (Some(id), _) => self.ids.get(&id),
            (None, Some(name)) => self.names.get(name),
            (None, None) => return Err("Link must reference a node by id or name".to_string()),
        };
        position.copied().map(NodeId).ok_or_else(|| "Node was not found".to_string())
    }
}

fn resolve_link(
    graph: &Graph,
    lookup: &NodeLookup,
    link: &LinkDescription,
) -> std::result::Result<(OutputRef, InputRef), String> {
    let src = lookup.find(link.src_id, link.src_name.as_deref())?;
    let dst = lookup.find(link.dst_id, link.dst_name.as_deref())?;
    let src_node = graph.node(src).ok_or("Node was not found")?;
    let dst_node = graph.node(dst).ok_or("Node was not found")?;

    let src_port = match (link.src_port_idx, &link.src_port_name) {
        (Some(idx), _) => Some(idx).filter(|&i| i < src_node.outputs().len()),
        (None, Some(name)) => src_node.find_output(name),
        (None, None) => return Err("Link must reference an output port by index or name".to_string()),
    }
    .ok_or("Output port was not found")?;
    let dst_port = match (link.dst_port_idx, &link.dst_port_name) {
        (Some(idx), _) => Some(idx).filter(|&i| i < dst_node.inputs().len()),
        (None, Some(name)) => dst_node.find_input(name),
        (None, None) => return Err("Link must reference an input port by index or name".to_string()),
    }
    .ok_or("Input port was not found")?;

    Ok((OutputRef::new(src, src_port), InputRef::new(dst, dst_port)))
}
