// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for shader graph construction and compilation.

use crate::port::{InputRef, OutputRef};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ShaderGraphError>;

/// Broad failure category, used by callers that only care about the class of error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input (fragment, graph, link, description) is malformed
    InvalidArgument,
    /// The operation conflicts with the current link state
    InvalidState,
    /// The request is well formed but cannot be handled
    NotSupported,
    /// A fragment could not be resolved
    FileNotFound,
}

/// Error raised while building, linking, compiling or loading shader nodes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderGraphError {
    /// The fragment has no definition of the entry point
    #[error("Entry point function '{0}' not found in shader fragment")]
    EntryPointNotFound(String),

    /// A parameter uses a qualifier other than `in` or `out`
    #[error("Unsupported parameter qualifier '{qualifier}' on parameter '{parameter}'")]
    UnsupportedQualifier {
        /// The offending qualifier
        qualifier: String,
        /// Parameter name
        parameter: String,
    },

    /// A parameter or the function carries a semantic annotation
    #[error("Semantic annotations are not allowed in material shaders: '{0}'")]
    SemanticNotAllowed(String),

    /// The signature could not be parsed
    #[error("Malformed entry point signature: {0}")]
    MalformedSignature(String),

    /// A type name outside the supported port type set
    #[error("Unsupported port type: {0}")]
    UnsupportedType(String),

    /// A node index outside the graph
    #[error("Node not found: {0}")]
    NodeNotFound(usize),

    /// An input port index outside the node
    #[error("Input port not found: {0:?}")]
    InputNotFound(InputRef),

    /// An output port index outside the node
    #[error("Output port not found: {0:?}")]
    OutputNotFound(OutputRef),

    /// Linked ports carry different types
    #[error("Incompatible port types: {from} -> {to}")]
    IncompatiblePorts {
        /// Type of the producing output
        from: String,
        /// Type of the consuming input
        to: String,
    },

    /// An output linked back into an input of the same node
    #[error("Cannot link node {0} to itself")]
    SelfLink(usize),

    /// The input already has a link
    #[error("Input port already linked: {0:?}")]
    AlreadyLinked(InputRef),

    /// A graph description links the same input twice
    #[error("Input port linked more than once: {0:?}")]
    DuplicateInputLink(InputRef),

    /// The dependency graph has a cycle
    #[error("Shader nodes are linked in a circular way")]
    CircularLinks,

    /// No node terminates the graph
    #[error("No sink node, graph is empty or contains a circle")]
    NoSinkNode,

    /// More than one node terminates the graph
    #[error("Multiple sink nodes: {0:?}")]
    MultipleSinkNodes(Vec<usize>),

    /// Two free ports resolve to the same parameter name
    #[error("Duplicate parameter name: {0}")]
    DuplicateParameterName(String),

    /// A graph description is structurally wrong
    #[error("Invalid graph description: {0}")]
    InvalidDescription(String),

    /// A link in a graph description cannot be applied
    #[error("{message} while linking {link}")]
    InvalidLink {
        /// Why the link failed
        message: String,
        /// Human readable rendering of the link descriptor
        link: String,
    },

    /// The description's content type does not match the expected one
    #[error("Graph type is not supported: expected '{expected}', found '{found}'")]
    ContentTypeMismatch {
        /// Expected content type
        expected: String,
        /// Content type found in the header
        found: String,
    },

    /// Nested graphs exceed the configured depth
    #[error("Nested graph '{0}' exceeds the maximum nesting depth")]
    NestingTooDeep(String),

    /// The resolver does not know the fragment
    #[error("Shader fragment not found: {0}")]
    FragmentNotFound(String),
}

impl ShaderGraphError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyLinked(_) => ErrorKind::InvalidState,
            Self::ContentTypeMismatch { .. } => ErrorKind::NotSupported,
            Self::FragmentNotFound(_) => ErrorKind::FileNotFound,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

impl From<serde_json::Error> for ShaderGraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDescription(format!("JSON error at {}:{}: {}", err.line(), err.column(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    #[test]
    fn test_error_kinds() {
        let input = InputRef::new(NodeId(0), 0);
        assert_eq!(ShaderGraphError::AlreadyLinked(input).kind(), ErrorKind::InvalidState);
        assert_eq!(ShaderGraphError::CircularLinks.kind(), ErrorKind::InvalidArgument);
        assert_eq!(ShaderGraphError::SelfLink(0).kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            ShaderGraphError::FragmentNotFound("adder".into()).kind(),
            ErrorKind::FileNotFound
        );
        assert_eq!(
            ShaderGraphError::ContentTypeMismatch {
                expected: "material".into(),
                found: "pipeline".into(),
            }
            .kind(),
            ErrorKind::NotSupported
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let err: ShaderGraphError = serde_json::from_str::<serde_json::Value>("{ nodes: ")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("JSON error at 1:"));
    }
}
