// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader source generation for linked graphs.
//!
//! Each node's fragment is wrapped in its own namespace (`sub<N>`, N being the
//! node's position in topological order) with its entry point renamed to
//! `sub<N>_main`. A generated entry point then calls every node in order,
//! passing producer variables (`__node<N>_return`,
//! `__node<N>_outparam<I>_<port>`, I being the output index) to consumers and free ports through its own
//! parameters (`param<K>`).

use crate::config::CompilerOptions;
use crate::dependency::DependencyGraph;
use crate::error::{Result, ShaderGraphError};
use crate::graph::Graph;
use crate::node::{NodeId, NodeKind, ShaderNode};
use crate::params::{collect_free_ports, FreePorts, ShaderParameter};
use crate::port::{InputRef, OutputRef, ParamIndex, Port};
use crate::signature::replace_span;
use std::collections::HashMap;
use std::ops::Range;

/// Output of compiling a graph
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGraph {
    /// Flattened shader source
    pub source: String,
    /// Ports of the composite node's inputs, one per free input
    pub inputs: Vec<Port>,
    /// Ports of the composite node's outputs: the return value, then free outputs
    pub outputs: Vec<Port>,
    /// Emission order of the child nodes
    pub order: Vec<NodeId>,
    /// Child whose return value is the graph's return value
    pub sink: NodeId,
    /// Byte range of the generated entry point's name in `source`
    pub entry_span: Range<usize>,
}

impl CompiledGraph {
    /// Ordered parameter list for binding: inputs, then outputs
    pub fn parameters(&self) -> Vec<ShaderParameter> {
        self.inputs
            .iter()
            .chain(self.outputs.iter().filter(|p| !p.is_return()))
            .map(ShaderParameter::from_port)
            .collect()
    }
}

/// Compile a linked graph into a single shader
pub fn compile(graph: &Graph, options: &CompilerOptions) -> Result<CompiledGraph> {
    let deps = DependencyGraph::build(graph);
    let order = deps.topological_order()?;
    let sink = deps.sink()?;
    let free = collect_free_ports(graph, &order, sink, options)?;

    let mut positions = vec![0; graph.node_count()];
    for (position, id) in order.iter().enumerate() {
        positions[id.0] = position;
    }

    let mut source = String::new();
    for (position, &id) in order.iter().enumerate() {
        source.push_str(&wrap_fragment(node(graph, id)?, position, options));
    }

    let free_arguments: HashMap<InputRef, &str> = free
        .inputs
        .iter()
        .map(|p| (InputRef::new(p.node, p.port), p.argument.as_str()))
        .collect();
    let mut body = String::new();
    for (position, &id) in order.iter().enumerate() {
        let call = Call {
            graph,
            id,
            position,
            positions: &positions,
            free_arguments: &free_arguments,
            options,
        };
        body.push_str(&call.emit()?);
    }
    for output in &free.outputs {
        let port = graph.output(OutputRef::new(output.node, output.port))?.port();
        let variable = output_variable(positions[output.node.0], output.port, port);
        body.push_str(&format!("    {} = {variable};\n", output.argument));
    }
    if free.return_type.is_some() {
        let variable = return_variable(positions[sink.0]);
        body.push_str(&format!("    return {variable};\n"));
    }

    let entry_span = write_entry_point(&mut source, &free, &body, options);
    let (inputs, outputs) = free.composite_ports();

    tracing::debug!(
        "Compiled shader graph: {} nodes, {} inputs, {} outputs",
        order.len(),
        inputs.len(),
        outputs.len()
    );

    Ok(CompiledGraph {
        source,
        inputs,
        outputs,
        order,
        sink,
        entry_span,
    })
}

fn node(graph: &Graph, id: NodeId) -> Result<&ShaderNode> {
    graph.node(id).ok_or(ShaderGraphError::NodeNotFound(id.0))
}

fn scope_name(position: usize, options: &CompilerOptions) -> String {
    format!("{}{position}", options.scope_prefix)
}

fn function_name(position: usize, options: &CompilerOptions) -> String {
    format!("{}_{}", scope_name(position, options), options.entry_point)
}

fn return_variable(position: usize) -> String {
    format!("__node{position}_return")
}

// The output index keeps names unique after sanitizing.
fn output_variable(position: usize, output: usize, port: &Port) -> String {
    if port.is_return() {
        return return_variable(position);
    }
    let name: String = port
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("__node{position}_outparam{output}_{name}")
}

fn wrap_fragment(node: &ShaderNode, position: usize, options: &CompilerOptions) -> String {
    let function = function_name(position, options);
    let renamed = match node.kind() {
        NodeKind::Equation(equation) => equation.signature().rename_entry_point(equation.source(), &function),
        NodeKind::Graph(graph) => {
            let compiled = graph.compiled();
            replace_span(&compiled.source, &compiled.entry_span, &function)
        }
    };
    let scope = scope_name(position, options);
    format!(
        "namespace {scope} {{\n{}\n}} // namespace {scope}\n\n",
        renamed.trim_end()
    )
}

fn write_entry_point(source: &mut String, free: &FreePorts, body: &str, options: &CompilerOptions) -> Range<usize> {
    let parameters: Vec<String> = free
        .inputs
        .iter()
        .map(|p| format!("{} {}", p.composite.port_type, p.argument))
        .chain(
            free.outputs
                .iter()
                .map(|p| format!("out {} {}", p.composite.port_type, p.argument)),
        )
        .collect();

    source.push_str(free.return_type.map_or("void", |t| t.hlsl_name()));
    source.push(' ');
    let start = source.len();
    source.push_str(&options.entry_point);
    let entry_span = start..source.len();
    source.push_str(&format!("({}) {{\n", parameters.join(", ")));
    source.push_str(body);
    source.push_str("}\n");
    entry_span
}

/// The statements invoking one node
struct Call<'a> {
    graph: &'a Graph,
    id: NodeId,
    position: usize,
    positions: &'a [usize],
    free_arguments: &'a HashMap<InputRef, &'a str>,
    options: &'a CompilerOptions,
}

impl Call<'_> {
    fn emit(&self) -> Result<String> {
        let node = node(self.graph, self.id)?;
        let mut statements = String::new();
        let mut arguments: Vec<(usize, String)> = Vec::new();

        for (port, input) in node.inputs().iter().enumerate() {
            let ParamIndex::Param(index) = input.port().index else {
                continue;
            };
            let argument = match input.link() {
                Some(from) => {
                    let producer = self.graph.output(from)?.port();
                    output_variable(self.positions[from.node.0], from.port, producer)
                }
                None => {
                    let target = InputRef::new(self.id, port);
                    self.free_arguments
                        .get(&target)
                        .ok_or(ShaderGraphError::InputNotFound(target))?
                        .to_string()
                }
            };
            arguments.push((index, argument));
        }

        let mut result = None;
        for (port, output) in node.outputs().iter().enumerate() {
            let variable = output_variable(self.position, port, output.port());
            statements.push_str(&format!("    {} {variable};\n", output.port_type()));
            match output.port().index {
                ParamIndex::Return => result = Some(variable),
                ParamIndex::Param(index) => arguments.push((index, variable)),
            }
        }

        arguments.sort_by_key(|(index, _)| *index);
        let arguments: Vec<String> = arguments.into_iter().map(|(_, a)| a).collect();
        let call = format!(
            "{}::{}({})",
            scope_name(self.position, self.options),
            function_name(self.position, self.options),
            arguments.join(", ")
        );
        match result {
            Some(variable) => statements.push_str(&format!("    {variable} = {call};\n")),
            None => statements.push_str(&format!("    {call};\n")),
        }

        tracing::trace!("Emitted call for node {} at position {}", self.id, self.position);
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::context::ShaderContext;
    use crate::error::ErrorKind;
    use crate::port::PortType;
    use crate::resolver::FragmentLibrary;
    use crate::signature::Signature;

    const TINT: &str = "float4 main(float4 color) { return color; }";
    const DARKEN: &str = "float4 main(float4 color) {\n   return color*0.4f;\n}";
    const SAMPLE: &str = "float4 main(MapColor2D map) {\n    return map.tex.Sample(map.samp, g_tex0);\n}";
    const COMBINE: &str = "float4 main(float4 a, float4 b) { return a * b; }";
    const ADDER: &str = "float main(float a, float b) {  return a+b;}";
    const SUBTRACTOR: &str = "float main(float a, float b) {  return a-b;}";
    const MAD4: &str = "void main(float a, float b, float c, out float o) {  o = a*b+c;}";

    fn ctx() -> ShaderContext {
        ShaderContext::new(FragmentLibrary::new())
    }

    fn nodes(ctx: &ShaderContext, sources: &[(&str, &str)]) -> Vec<ShaderNode> {
        sources
            .iter()
            .map(|(name, source)| ShaderNode::from_source(*source, ctx).unwrap().with_display_name(*name))
            .collect()
    }

    fn compile_nodes(nodes: Vec<ShaderNode>, links: &[Connection]) -> Result<CompiledGraph> {
        let graph = Graph::with_connections(nodes, links)?;
        compile(&graph, &CompilerOptions::default())
    }

    #[test]
    fn test_exact_output() {
        let ctx = ctx();
        let compiled = compile_nodes(
            nodes(&ctx, &[("Tint", TINT), ("Darken", DARKEN)]),
            &[Connection::new(0, 0, 1, 0)],
        )
        .unwrap();

        let expected = "\
namespace sub0 {
float4 sub0_main(float4 color) { return color; }
} // namespace sub0

namespace sub1 {
float4 sub1_main(float4 color) {
   return color*0.4f;
}
} // namespace sub1

float4 main(float4 param0) {
    float4 __node0_return;
    __node0_return = sub0::sub0_main(param0);
    float4 __node1_return;
    __node1_return = sub1::sub1_main(__node0_return);
    return __node1_return;
}
";
        assert_eq!(compiled.source, expected);
        assert_eq!(&compiled.source[compiled.entry_span.clone()], "main");
        assert_eq!(compiled.parameters()[0].name, "Tint_color");
    }

    #[test]
    fn test_make_graph_with_out_param() {
        let ctx = ctx();
        let compiled = compile_nodes(
            nodes(&ctx, &[("Add", ADDER), ("Sub", SUBTRACTOR), ("Mad", MAD4)]),
            &[Connection::new(0, 0, 2, 0), Connection::new(1, 0, 2, 1)],
        )
        .unwrap();

        assert_eq!(compiled.inputs.len(), 5);
        assert_eq!(compiled.outputs.len(), 1);
        assert_eq!(compiled.outputs[0].name, "Mad_o");
        assert!(compiled.source.contains(
            "void main(float param0, float param1, float param2, float param3, float param4, out float param5) {"
        ));
        assert!(compiled
            .source
            .contains("    sub2::sub2_main(__node0_return, __node1_return, param4, __node2_outparam0_o);\n"));
        assert!(compiled.source.contains("    param5 = __node2_outparam0_o;\n"));
        assert!(!compiled.source.contains("return __node"));
    }

    #[test]
    fn test_fan_out_example() {
        let ctx = ctx();
        let build = || {
            compile_nodes(
                nodes(
                    &ctx,
                    &[("Sample", SAMPLE), ("Darken1", DARKEN), ("Darken2", DARKEN), ("Combine", COMBINE)],
                ),
                &[
                    Connection::new(0, 0, 1, 0),
                    Connection::new(0, 0, 2, 0),
                    Connection::new(1, 0, 3, 0),
                    Connection::new(2, 0, 3, 1),
                ],
            )
            .unwrap()
        };
        let compiled = build();

        assert_eq!(compiled.order, vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)]);
        assert_eq!(compiled.sink, NodeId(3));
        assert_eq!(compiled.inputs.len(), 1);
        assert_eq!(compiled.inputs[0].name, "Sample_map");
        assert_eq!(compiled.inputs[0].port_type, PortType::MapColor2D);
        assert_eq!(compiled.outputs.len(), 1);
        assert!(compiled.outputs[0].is_return());
        assert_eq!(compiled.source.matches("namespace sub").count(), 4);
        assert!(compiled.source.contains("float4 main(MapColor2D param0) {"));
        assert!(compiled
            .source
            .contains("__node3_return = sub3::sub3_main(__node1_return, __node2_return);"));

        // The generated shader is itself a valid fragment.
        let signature = Signature::dissect(&compiled.source, "main").unwrap();
        assert_eq!(signature.parameters.len(), 1);
        assert_eq!(signature.return_type, Some(PortType::Float4));

        assert_eq!(build(), compiled);
    }

    #[test]
    fn test_cycle_fails() {
        let ctx = ctx();
        let err = compile_nodes(
            nodes(&ctx, &[("A", TINT), ("B", TINT)]),
            &[Connection::new(0, 0, 1, 0), Connection::new(1, 0, 0, 0)],
        )
        .unwrap_err();
        assert_eq!(err, ShaderGraphError::CircularLinks);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_multiple_sinks_fail() {
        let ctx = ctx();
        let err = compile_nodes(nodes(&ctx, &[("A", TINT), ("B", TINT)]), &[]).unwrap_err();
        assert!(matches!(err, ShaderGraphError::MultipleSinkNodes(_)));
    }

    #[test]
    fn test_empty_graph_fails() {
        let err = compile(&Graph::new(), &CompilerOptions::default()).unwrap_err();
        assert_eq!(err, ShaderGraphError::NoSinkNode);
    }

    #[test]
    fn test_graph_without_sink_fails() {
        // Every node feeds another one, so the cycle is reported before the missing sink.
        let ctx = ctx();
        let err = compile_nodes(
            nodes(&ctx, &[("A", TINT), ("B", TINT), ("C", TINT)]),
            &[
                Connection::new(0, 0, 1, 0),
                Connection::new(1, 0, 2, 0),
                Connection::new(2, 0, 0, 0),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ShaderGraphError::CircularLinks);
    }

    #[test]
    fn test_out_params_with_similar_names() {
        let ctx = ctx();
        let copy = "float4 main(float4 c, out float4 o) { o = c; return c; }";
        let inner = ShaderNode::from_graph(
            nodes(&ctx, &[("Base Color", copy), ("Base_Color", copy), ("Combine", COMBINE)]),
            &[Connection::new(0, 0, 2, 0), Connection::new(1, 0, 2, 1)],
            &ctx,
        )
        .unwrap()
        .with_display_name("Inner");
        let names: Vec<_> = inner.outputs().iter().map(|o| o.name()).collect();
        assert_eq!(names, ["", "Base Color_o", "Base_Color_o"]);

        let compiled = compile_nodes(vec![inner], &[]).unwrap();
        let first = "__node0_outparam1_Base_Color_o";
        let second = "__node0_outparam2_Base_Color_o";
        assert_eq!(compiled.source.matches(&format!("float4 {first};")).count(), 1);
        assert_eq!(compiled.source.matches(&format!("float4 {second};")).count(), 1);
        assert!(compiled
            .source
            .contains(&format!("__node0_return = sub0::sub0_main(param0, param1, {first}, {second});")));
        assert!(compiled.source.contains(&format!("    param2 = {first};\n")));
        assert!(compiled.source.contains(&format!("    param3 = {second};\n")));
        assert_eq!(compiled.outputs[1].name, "Inner_Base Color_o");
        assert_eq!(compiled.outputs[2].name, "Inner_Base_Color_o");
    }

    #[test]
    fn test_free_return_of_non_sink() {
        // Split writes its scaled value through `o` and returns its input unchanged.
        let ctx = ctx();
        let split = "float4 main(float4 c, out float4 o) { o = c * 2; return c; }";
        let compiled = compile_nodes(
            nodes(&ctx, &[("Split", split), ("Tint", TINT)]),
            &[Connection::new(0, 1, 1, 0)],
        )
        .unwrap();
        assert_eq!(compiled.outputs.len(), 2);
        assert_eq!(compiled.outputs[1].name, "Split_result");
        assert!(compiled.source.contains("__node1_return = sub1::sub1_main(__node0_outparam1_o);"));
        assert!(compiled.source.contains("    param1 = __node0_return;\n"));
    }

    #[test]
    fn test_nested_graph() {
        let ctx = ctx();
        let inner = ShaderNode::from_graph(
            nodes(&ctx, &[("Tint", TINT), ("Darken", DARKEN)]),
            &[Connection::new(0, 0, 1, 0)],
            &ctx,
        )
        .unwrap()
        .with_display_name("Inner");
        assert_eq!(inner.inputs().len(), 1);
        assert_eq!(inner.input(0).unwrap().name(), "Tint_color");

        let outer = vec![inner, ShaderNode::from_source(DARKEN, &ctx).unwrap()];
        let compiled = compile_nodes(outer, &[Connection::new(0, 0, 1, 0)]).unwrap();
        assert_eq!(compiled.inputs[0].name, "Inner_Tint_color");
        assert!(compiled.source.contains("float4 sub0_main(float4 param0) {"));
        assert!(compiled.source.contains("__node0_return = sub0::sub0_main(param0);"));
        assert_eq!(compiled.source.matches("float4 main(").count(), 1);
    }

    #[test]
    fn test_custom_options() {
        let ctx = ctx();
        let options = CompilerOptions {
            scope_prefix: "mtl".to_string(),
            param_prefix: "arg".to_string(),
            ..CompilerOptions::default()
        };
        let graph = Graph::with_connections(nodes(&ctx, &[("Tint", TINT)]), &[]).unwrap();
        let compiled = compile(&graph, &options).unwrap();
        assert!(compiled.source.contains("namespace mtl0 {"));
        assert!(compiled.source.contains("__node0_return = mtl0::mtl0_main(arg0);"));
    }
}
