// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material shader graph compiler for `OrdoPlay`.
//!
//! Material shaders are assembled from small HLSL fragments, each exporting a
//! single `main` function. This crate links fragments into graphs and flattens
//! a graph into one shader:
//! - Fragments are dissected into typed input and output ports
//! - Ports are linked into an acyclic graph with a single sink node
//! - Each fragment is emitted in its own namespace, followed by a generated
//!   entry point calling them in dependency order
//! - Unlinked ports become the parameters of the compiled shader
//!
//! Compiled graphs are nodes themselves and can be nested.
//!
//! ## Architecture
//!
//! - [`ShaderNode`]: an equation (fragment) or a compiled graph
//! - [`Graph`]: arena of nodes and their links
//! - [`codegen::compile`]: ordering, parameter collection and source generation
//! - [`description`]: JSON load and save
//! - [`ShaderContext`]: options, identity cache and fragment resolver

pub mod codegen;
pub mod config;
pub mod connection;
pub mod context;
pub mod dependency;
pub mod description;
pub mod error;
pub mod graph;
pub mod identity;
pub mod node;
pub mod params;
pub mod port;
pub mod resolver;
pub mod signature;

pub use codegen::CompiledGraph;
pub use config::CompilerOptions;
pub use connection::Connection;
pub use context::ShaderContext;
pub use description::{load_graph, save_graph, GraphDescription};
pub use error::{ErrorKind, Result, ShaderGraphError};
pub use graph::Graph;
pub use identity::{IdentityCache, SourceId};
pub use node::{NodeId, NodeKind, ShaderNode};
pub use params::ShaderParameter;
pub use port::{InputPort, InputRef, OutputPort, OutputRef, Port, PortDirection, PortType};
pub use resolver::{FragmentLibrary, FragmentResolver};
pub use signature::Signature;
