// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler configuration.

use serde::{Deserialize, Serialize};

/// Naming and limits used when dissecting fragments and compiling graphs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Name of the function every fragment exports
    pub entry_point: String,
    /// Prefix of the per-node enclosing scope (`sub0`, `sub1`, ...)
    pub scope_prefix: String,
    /// Prefix of the generated top-level argument names (`param0`, ...)
    pub param_prefix: String,
    /// Content type written to and expected in graph description headers
    pub content_type: String,
    /// Maximum depth of graphs nested through the resolver
    pub max_nesting_depth: usize,
}

impl CompilerOptions {
    /// Parse options from JSON, missing fields take their defaults
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            entry_point: "main".to_string(),
            scope_prefix: "sub".to_string(),
            param_prefix: "param".to_string(),
            content_type: "material".to_string(),
            max_nesting_depth: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CompilerOptions::default();
        assert_eq!(options.entry_point, "main");
        assert_eq!(options.content_type, "material");
    }

    #[test]
    fn test_partial_json() {
        let options = CompilerOptions::from_json(r#"{ "entryPoint": "mtl_main" }"#).unwrap();
        assert_eq!(options.entry_point, "mtl_main");
        assert_eq!(options.scope_prefix, "sub");
        assert_eq!(options.max_nesting_depth, 8);
    }
}
